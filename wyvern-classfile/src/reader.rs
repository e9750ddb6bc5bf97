//! class 文件解析器
//!
//! 把原始字节流解析为 [`ClassFile`]。输入不是合法 class 文件时返回
//! [`ClassFileError`]，由调用方决定隔离策略（单类失败不影响批次）。

use tracing::trace;

use crate::bytes::ByteReader;
use crate::class::{Attribute, ClassFile, FieldInfo, MethodInfo};
use crate::constant_pool::ConstantPool;
use crate::error::ClassFileError;

const MAGIC: u32 = 0xCAFE_BABE;

/// class 文件解析入口
pub struct ClassReader;

impl ClassReader {
    /// 解析完整的 class 文件字节流
    pub fn parse(data: &[u8]) -> Result<ClassFile, ClassFileError> {
        let mut reader = ByteReader::new(data);

        let magic = reader.u32()?;
        if magic != MAGIC {
            return Err(ClassFileError::BadMagic { magic });
        }

        let minor_version = reader.u16()?;
        let major_version = reader.u16()?;
        let constant_pool = ConstantPool::parse(&mut reader)?;

        let access_flags = reader.u16()?;
        let this_class = reader.u16()?;
        let super_class = reader.u16()?;
        let class_name = constant_pool.class_name(this_class)?.to_string();

        let interface_count = reader.u16()?;
        let mut interfaces = Vec::with_capacity(interface_count as usize);
        for _ in 0..interface_count {
            interfaces.push(reader.u16()?);
        }

        let field_count = reader.u16()?;
        let mut fields = Vec::with_capacity(field_count as usize);
        for _ in 0..field_count {
            let (access_flags, name_index, descriptor_index, name, descriptor, attributes) =
                Self::parse_member(&mut reader, &constant_pool)?;
            fields.push(FieldInfo {
                access_flags,
                name_index,
                descriptor_index,
                name,
                descriptor,
                attributes,
            });
        }

        let method_count = reader.u16()?;
        let mut methods = Vec::with_capacity(method_count as usize);
        for _ in 0..method_count {
            let (access_flags, name_index, descriptor_index, name, descriptor, attributes) =
                Self::parse_member(&mut reader, &constant_pool)?;
            methods.push(MethodInfo {
                access_flags,
                name_index,
                descriptor_index,
                name,
                descriptor,
                attributes,
            });
        }

        let attributes = Self::parse_attributes(&mut reader, &constant_pool)?;

        if reader.remaining() != 0 {
            return Err(ClassFileError::Malformed {
                reason: format!("{} trailing bytes after class structure", reader.remaining()),
            });
        }

        trace!(
            class = %class_name,
            methods = methods.len(),
            "parsed class file"
        );

        Ok(ClassFile {
            minor_version,
            major_version,
            constant_pool,
            access_flags,
            this_class,
            super_class,
            class_name,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }

    #[allow(clippy::type_complexity)]
    fn parse_member(
        reader: &mut ByteReader<'_>,
        pool: &ConstantPool,
    ) -> Result<(u16, u16, u16, String, String, Vec<Attribute>), ClassFileError> {
        let access_flags = reader.u16()?;
        let name_index = reader.u16()?;
        let descriptor_index = reader.u16()?;
        let name = pool.utf8(name_index)?.to_string();
        let descriptor = pool.utf8(descriptor_index)?.to_string();
        let attributes = Self::parse_attributes(reader, pool)?;
        Ok((access_flags, name_index, descriptor_index, name, descriptor, attributes))
    }

    fn parse_attributes(
        reader: &mut ByteReader<'_>,
        pool: &ConstantPool,
    ) -> Result<Vec<Attribute>, ClassFileError> {
        let count = reader.u16()?;
        let mut attributes = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let name_index = reader.u16()?;
            let name = pool.utf8(name_index)?.to_string();
            let length = reader.u32()? as usize;
            let info = reader.take(length)?.to_vec();
            attributes.push(Attribute { name_index, name, info });
        }
        Ok(attributes)
    }
}
