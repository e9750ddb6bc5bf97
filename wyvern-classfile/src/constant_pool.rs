//! 常量池模型
//!
//! class 文件的常量池从索引 1 开始，Long/Double 占两个槽位。
//! 织入时只会向池尾追加新条目，已有条目的索引保持不变，
//! 这样未被改写的方法引用的常量完全不受影响。

use std::collections::HashMap;

use crate::bytes::{ByteReader, ByteWriter};
use crate::error::ClassFileError;

/// 常量池条目
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// 占位条目：索引 0 以及 Long/Double 的第二个槽位
    Placeholder,
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class { name_index: u16 },
    String { string_index: u16 },
    FieldRef { class_index: u16, name_and_type_index: u16 },
    MethodRef { class_index: u16, name_and_type_index: u16 },
    InterfaceMethodRef { class_index: u16, name_and_type_index: u16 },
    NameAndType { name_index: u16, descriptor_index: u16 },
    MethodHandle { reference_kind: u8, reference_index: u16 },
    MethodType { descriptor_index: u16 },
    Dynamic { bootstrap_method_index: u16, name_and_type_index: u16 },
    InvokeDynamic { bootstrap_method_index: u16, name_and_type_index: u16 },
    Module { name_index: u16 },
    Package { name_index: u16 },
}

const TAG_UTF8: u8 = 1;
const TAG_INTEGER: u8 = 3;
const TAG_FLOAT: u8 = 4;
const TAG_LONG: u8 = 5;
const TAG_DOUBLE: u8 = 6;
const TAG_CLASS: u8 = 7;
const TAG_STRING: u8 = 8;
const TAG_FIELD_REF: u8 = 9;
const TAG_METHOD_REF: u8 = 10;
const TAG_INTERFACE_METHOD_REF: u8 = 11;
const TAG_NAME_AND_TYPE: u8 = 12;
const TAG_METHOD_HANDLE: u8 = 15;
const TAG_METHOD_TYPE: u8 = 16;
const TAG_DYNAMIC: u8 = 17;
const TAG_INVOKE_DYNAMIC: u8 = 18;
const TAG_MODULE: u8 = 19;
const TAG_PACKAGE: u8 = 20;

/// 常量池
///
/// 内部以槽位数组保存，`entries[0]` 恒为占位条目
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    /// 创建只含占位条目的空常量池
    pub fn new() -> Self {
        Self {
            entries: vec![Constant::Placeholder],
        }
    }

    /// 从字节流解析常量池（含开头的 constant_pool_count）
    pub fn parse(reader: &mut ByteReader<'_>) -> Result<Self, ClassFileError> {
        let count = reader.u16()?;
        let mut entries = Vec::with_capacity(count as usize);
        entries.push(Constant::Placeholder);

        let mut index = 1u16;
        while index < count {
            let offset = reader.position();
            let tag = reader.u8()?;
            let constant = match tag {
                TAG_UTF8 => {
                    let len = reader.u16()? as usize;
                    let bytes = reader.take(len)?;
                    let text = std::str::from_utf8(bytes)
                        .map_err(|_| ClassFileError::InvalidUtf8 { index })?;
                    Constant::Utf8(text.to_string())
                }
                TAG_INTEGER => Constant::Integer(reader.u32()? as i32),
                TAG_FLOAT => Constant::Float(f32::from_bits(reader.u32()?)),
                TAG_LONG => Constant::Long(reader.u64()? as i64),
                TAG_DOUBLE => Constant::Double(f64::from_bits(reader.u64()?)),
                TAG_CLASS => Constant::Class { name_index: reader.u16()? },
                TAG_STRING => Constant::String { string_index: reader.u16()? },
                TAG_FIELD_REF => Constant::FieldRef {
                    class_index: reader.u16()?,
                    name_and_type_index: reader.u16()?,
                },
                TAG_METHOD_REF => Constant::MethodRef {
                    class_index: reader.u16()?,
                    name_and_type_index: reader.u16()?,
                },
                TAG_INTERFACE_METHOD_REF => Constant::InterfaceMethodRef {
                    class_index: reader.u16()?,
                    name_and_type_index: reader.u16()?,
                },
                TAG_NAME_AND_TYPE => Constant::NameAndType {
                    name_index: reader.u16()?,
                    descriptor_index: reader.u16()?,
                },
                TAG_METHOD_HANDLE => Constant::MethodHandle {
                    reference_kind: reader.u8()?,
                    reference_index: reader.u16()?,
                },
                TAG_METHOD_TYPE => Constant::MethodType {
                    descriptor_index: reader.u16()?,
                },
                TAG_DYNAMIC => Constant::Dynamic {
                    bootstrap_method_index: reader.u16()?,
                    name_and_type_index: reader.u16()?,
                },
                TAG_INVOKE_DYNAMIC => Constant::InvokeDynamic {
                    bootstrap_method_index: reader.u16()?,
                    name_and_type_index: reader.u16()?,
                },
                TAG_MODULE => Constant::Module { name_index: reader.u16()? },
                TAG_PACKAGE => Constant::Package { name_index: reader.u16()? },
                other => {
                    return Err(ClassFileError::UnknownConstantTag { tag: other, offset });
                }
            };

            let two_slots = matches!(constant, Constant::Long(_) | Constant::Double(_));
            entries.push(constant);
            index += 1;
            if two_slots {
                entries.push(Constant::Placeholder);
                index += 1;
            }
        }

        Ok(Self { entries })
    }

    /// 序列化常量池（含 constant_pool_count）
    pub fn write(&self, writer: &mut ByteWriter) {
        writer.u16(self.entries.len() as u16);
        for entry in &self.entries[1..] {
            match entry {
                Constant::Placeholder => {} // Long/Double 的第二个槽位不输出
                Constant::Utf8(text) => {
                    writer.u8(TAG_UTF8);
                    writer.u16(text.len() as u16);
                    writer.bytes(text.as_bytes());
                }
                Constant::Integer(v) => {
                    writer.u8(TAG_INTEGER);
                    writer.u32(*v as u32);
                }
                Constant::Float(v) => {
                    writer.u8(TAG_FLOAT);
                    writer.u32(v.to_bits());
                }
                Constant::Long(v) => {
                    writer.u8(TAG_LONG);
                    writer.u64(*v as u64);
                }
                Constant::Double(v) => {
                    writer.u8(TAG_DOUBLE);
                    writer.u64(v.to_bits());
                }
                Constant::Class { name_index } => {
                    writer.u8(TAG_CLASS);
                    writer.u16(*name_index);
                }
                Constant::String { string_index } => {
                    writer.u8(TAG_STRING);
                    writer.u16(*string_index);
                }
                Constant::FieldRef { class_index, name_and_type_index } => {
                    writer.u8(TAG_FIELD_REF);
                    writer.u16(*class_index);
                    writer.u16(*name_and_type_index);
                }
                Constant::MethodRef { class_index, name_and_type_index } => {
                    writer.u8(TAG_METHOD_REF);
                    writer.u16(*class_index);
                    writer.u16(*name_and_type_index);
                }
                Constant::InterfaceMethodRef { class_index, name_and_type_index } => {
                    writer.u8(TAG_INTERFACE_METHOD_REF);
                    writer.u16(*class_index);
                    writer.u16(*name_and_type_index);
                }
                Constant::NameAndType { name_index, descriptor_index } => {
                    writer.u8(TAG_NAME_AND_TYPE);
                    writer.u16(*name_index);
                    writer.u16(*descriptor_index);
                }
                Constant::MethodHandle { reference_kind, reference_index } => {
                    writer.u8(TAG_METHOD_HANDLE);
                    writer.u8(*reference_kind);
                    writer.u16(*reference_index);
                }
                Constant::MethodType { descriptor_index } => {
                    writer.u8(TAG_METHOD_TYPE);
                    writer.u16(*descriptor_index);
                }
                Constant::Dynamic { bootstrap_method_index, name_and_type_index } => {
                    writer.u8(TAG_DYNAMIC);
                    writer.u16(*bootstrap_method_index);
                    writer.u16(*name_and_type_index);
                }
                Constant::InvokeDynamic { bootstrap_method_index, name_and_type_index } => {
                    writer.u8(TAG_INVOKE_DYNAMIC);
                    writer.u16(*bootstrap_method_index);
                    writer.u16(*name_and_type_index);
                }
                Constant::Module { name_index } => {
                    writer.u8(TAG_MODULE);
                    writer.u16(*name_index);
                }
                Constant::Package { name_index } => {
                    writer.u8(TAG_PACKAGE);
                    writer.u16(*name_index);
                }
            }
        }
    }

    /// 槽位数量（含索引 0 的占位条目）
    pub fn slot_count(&self) -> u16 {
        self.entries.len() as u16
    }

    /// 按索引取常量
    pub fn get(&self, index: u16) -> Result<&Constant, ClassFileError> {
        match self.entries.get(index as usize) {
            Some(Constant::Placeholder) | None => Err(ClassFileError::BadConstantIndex {
                index,
                reason: "index out of range or points at a placeholder slot".to_string(),
            }),
            Some(entry) => Ok(entry),
        }
    }

    /// 取 Utf8 常量的内容
    pub fn utf8(&self, index: u16) -> Result<&str, ClassFileError> {
        match self.get(index)? {
            Constant::Utf8(text) => Ok(text),
            _ => Err(ClassFileError::BadConstantIndex {
                index,
                reason: "expected a Utf8 constant".to_string(),
            }),
        }
    }

    /// 取 Class 常量指向的内部类名（如 `com/example/Account`）
    pub fn class_name(&self, index: u16) -> Result<&str, ClassFileError> {
        match self.get(index)? {
            Constant::Class { name_index } => self.utf8(*name_index),
            _ => Err(ClassFileError::BadConstantIndex {
                index,
                reason: "expected a Class constant".to_string(),
            }),
        }
    }

    /// 槽位索引是 u16，池满后追加会回绕产生错误索引，
    /// 因此在这里检查上限并让调用方失败。
    /// Long/Double 占两个槽位，第二个槽位写入占位条目
    fn push(&mut self, constant: Constant) -> Result<u16, ClassFileError> {
        let two_slots = matches!(constant, Constant::Long(_) | Constant::Double(_));
        let slots = if two_slots { 2 } else { 1 };
        if self.entries.len() + slots > u16::MAX as usize {
            return Err(ClassFileError::PoolExhausted {
                size: self.entries.len(),
            });
        }
        let index = self.entries.len() as u16;
        self.entries.push(constant);
        if two_slots {
            self.entries.push(Constant::Placeholder);
        }
        Ok(index)
    }

    /// 追加（或复用）一个 Utf8 常量
    pub fn add_utf8(&mut self, text: &str) -> Result<u16, ClassFileError> {
        for (i, entry) in self.entries.iter().enumerate() {
            if let Constant::Utf8(existing) = entry {
                if existing == text {
                    return Ok(i as u16);
                }
            }
        }
        self.push(Constant::Utf8(text.to_string()))
    }

    /// 追加（或复用）一个 Class 常量，`name` 为内部类名
    pub fn add_class(&mut self, name: &str) -> Result<u16, ClassFileError> {
        let name_index = self.add_utf8(name)?;
        for (i, entry) in self.entries.iter().enumerate() {
            if let Constant::Class { name_index: n } = entry {
                if *n == name_index {
                    return Ok(i as u16);
                }
            }
        }
        self.push(Constant::Class { name_index })
    }

    /// 追加（或复用）一个 NameAndType 常量
    pub fn add_name_and_type(&mut self, name: &str, descriptor: &str) -> Result<u16, ClassFileError> {
        let name_index = self.add_utf8(name)?;
        let descriptor_index = self.add_utf8(descriptor)?;
        for (i, entry) in self.entries.iter().enumerate() {
            if let Constant::NameAndType { name_index: n, descriptor_index: d } = entry {
                if *n == name_index && *d == descriptor_index {
                    return Ok(i as u16);
                }
            }
        }
        self.push(Constant::NameAndType { name_index, descriptor_index })
    }

    /// 追加（或复用）一个 Methodref 常量
    pub fn add_method_ref(
        &mut self,
        class: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<u16, ClassFileError> {
        let class_index = self.add_class(class)?;
        let name_and_type_index = self.add_name_and_type(name, descriptor)?;
        for (i, entry) in self.entries.iter().enumerate() {
            if let Constant::MethodRef { class_index: c, name_and_type_index: n } = entry {
                if *c == class_index && *n == name_and_type_index {
                    return Ok(i as u16);
                }
            }
        }
        self.push(Constant::MethodRef { class_index, name_and_type_index })
    }

    /// 追加（或复用）一个 Integer 常量
    pub fn add_integer(&mut self, value: i32) -> Result<u16, ClassFileError> {
        for (i, entry) in self.entries.iter().enumerate() {
            if let Constant::Integer(v) = entry {
                if *v == value {
                    return Ok(i as u16);
                }
            }
        }
        self.push(Constant::Integer(value))
    }

    /// 收集所有 Utf8 常量的内容到索引映射，便于批量查询
    pub fn utf8_index(&self) -> HashMap<&str, u16> {
        let mut map = HashMap::new();
        for (i, entry) in self.entries.iter().enumerate() {
            if let Constant::Utf8(text) = entry {
                map.entry(text.as_str()).or_insert(i as u16);
            }
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let mut pool = ConstantPool::new();
        let utf8 = pool.add_utf8("hello").unwrap();
        let class = pool.add_class("com/example/Foo").unwrap();
        pool.push(Constant::Long(42)).unwrap();
        let after_long = pool.add_utf8("world").unwrap();

        let mut writer = ByteWriter::new();
        pool.write(&mut writer);
        let bytes = writer.into_bytes();

        let mut reader = ByteReader::new(&bytes);
        let parsed = ConstantPool::parse(&mut reader).unwrap();
        assert_eq!(parsed.utf8(utf8).unwrap(), "hello");
        assert_eq!(parsed.class_name(class).unwrap(), "com/example/Foo");
        assert_eq!(parsed.utf8(after_long).unwrap(), "world");
        assert_eq!(parsed.slot_count(), pool.slot_count());
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut pool = ConstantPool::new();
        let a = pool.add_utf8("same").unwrap();
        let b = pool.add_utf8("same").unwrap();
        assert_eq!(a, b);

        let m1 = pool
            .add_method_ref("java/lang/Integer", "valueOf", "(I)Ljava/lang/Integer;")
            .unwrap();
        let m2 = pool
            .add_method_ref("java/lang/Integer", "valueOf", "(I)Ljava/lang/Integer;")
            .unwrap();
        assert_eq!(m1, m2);
    }

    #[test]
    fn test_placeholder_slot_is_rejected() {
        let mut pool = ConstantPool::new();
        let long_index = pool.push(Constant::Long(1)).unwrap();
        assert!(pool.get(long_index).is_ok());
        assert!(pool.get(long_index + 1).is_err());
        assert!(pool.get(999).is_err());
    }

    #[test]
    fn test_full_pool_rejects_append() {
        let mut pool = ConstantPool::new();
        // 留一个可编址槽位：双槽常量放不下，单槽常量还能进
        for i in 0..(u16::MAX as usize - 2) {
            pool.push(Constant::Integer(i as i32)).unwrap();
        }
        assert!(matches!(
            pool.push(Constant::Long(7)),
            Err(ClassFileError::PoolExhausted { .. })
        ));
        pool.push(Constant::Integer(-2)).unwrap();
        assert_eq!(pool.slot_count(), u16::MAX);

        assert!(matches!(
            pool.add_utf8("overflow"),
            Err(ClassFileError::PoolExhausted { .. })
        ));
        assert!(matches!(
            pool.push(Constant::Integer(-1)),
            Err(ClassFileError::PoolExhausted { .. })
        ));
    }
}
