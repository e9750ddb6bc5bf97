//! class 文件序列化
//!
//! 把 [`ClassFile`] 还原为字节流。解析后未被修改的结构
//! （属性内容、常量池既有条目）按原样输出。

use crate::bytes::ByteWriter;
use crate::class::{Attribute, ClassFile};

impl ClassFile {
    /// 序列化为完整的 class 文件字节流
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = ByteWriter::with_capacity(1024);

        writer.u32(0xCAFE_BABE);
        writer.u16(self.minor_version);
        writer.u16(self.major_version);
        self.constant_pool.write(&mut writer);

        writer.u16(self.access_flags);
        writer.u16(self.this_class);
        writer.u16(self.super_class);

        writer.u16(self.interfaces.len() as u16);
        for interface in &self.interfaces {
            writer.u16(*interface);
        }

        writer.u16(self.fields.len() as u16);
        for field in &self.fields {
            writer.u16(field.access_flags);
            writer.u16(field.name_index);
            writer.u16(field.descriptor_index);
            write_attributes(&mut writer, &field.attributes);
        }

        writer.u16(self.methods.len() as u16);
        for method in &self.methods {
            writer.u16(method.access_flags);
            writer.u16(method.name_index);
            writer.u16(method.descriptor_index);
            write_attributes(&mut writer, &method.attributes);
        }

        write_attributes(&mut writer, &self.attributes);
        writer.into_bytes()
    }
}

fn write_attributes(writer: &mut ByteWriter, attributes: &[Attribute]) {
    writer.u16(attributes.len() as u16);
    for attribute in attributes {
        writer.u16(attribute.name_index);
        writer.u32(attribute.info.len() as u32);
        writer.bytes(&attribute.info);
    }
}
