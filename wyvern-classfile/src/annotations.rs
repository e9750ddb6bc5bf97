//! 注解属性解码
//!
//! 把 `RuntimeVisibleAnnotations` / `RuntimeInvisibleAnnotations` 属性
//! 解码为结构化的注解索引，供匹配器按注解名查询。

use std::collections::BTreeMap;

use crate::bytes::ByteReader;
use crate::constant_pool::ConstantPool;
use crate::descriptor::JavaType;
use crate::error::ClassFileError;

/// 注解属性名
pub const RUNTIME_VISIBLE_ANNOTATIONS: &str = "RuntimeVisibleAnnotations";
pub const RUNTIME_INVISIBLE_ANNOTATIONS: &str = "RuntimeInvisibleAnnotations";
pub const RUNTIME_VISIBLE_PARAMETER_ANNOTATIONS: &str = "RuntimeVisibleParameterAnnotations";
pub const RUNTIME_INVISIBLE_PARAMETER_ANNOTATIONS: &str = "RuntimeInvisibleParameterAnnotations";

/// 注解元素值
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationValue {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    Char(char),
    String(String),
    Enum { type_name: String, const_name: String },
    Class(String),
    Annotation(Annotation),
    Array(Vec<AnnotationValue>),
}

/// 一条注解：类型名（点分形式）加上声明的元素值
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub type_name: String,
    pub values: BTreeMap<String, AnnotationValue>,
}

impl Annotation {
    /// 查询某个元素值
    pub fn value(&self, name: &str) -> Option<&AnnotationValue> {
        self.values.get(name)
    }
}

/// 解码一个注解属性的内容（不含属性头）
pub fn parse_annotations(
    info: &[u8],
    pool: &ConstantPool,
) -> Result<Vec<Annotation>, ClassFileError> {
    let mut reader = ByteReader::new(info);
    let count = reader.u16()?;
    let mut annotations = Vec::with_capacity(count as usize);
    for _ in 0..count {
        annotations.push(parse_annotation(&mut reader, pool)?);
    }
    Ok(annotations)
}

fn parse_annotation(
    reader: &mut ByteReader<'_>,
    pool: &ConstantPool,
) -> Result<Annotation, ClassFileError> {
    let type_index = reader.u16()?;
    let type_descriptor = pool.utf8(type_index)?;
    let type_name = annotation_type_name(type_descriptor)?;

    let pair_count = reader.u16()?;
    let mut values = BTreeMap::new();
    for _ in 0..pair_count {
        let name_index = reader.u16()?;
        let name = pool.utf8(name_index)?.to_string();
        let value = parse_element_value(reader, pool)?;
        values.insert(name, value);
    }

    Ok(Annotation { type_name, values })
}

fn parse_element_value(
    reader: &mut ByteReader<'_>,
    pool: &ConstantPool,
) -> Result<AnnotationValue, ClassFileError> {
    use crate::constant_pool::Constant;

    let tag = reader.u8()?;
    let value = match tag {
        b'B' | b'S' | b'I' => match pool.get(reader.u16()?)? {
            Constant::Integer(v) => AnnotationValue::Int(*v),
            _ => return Err(bad_element("expected an Integer constant")),
        },
        b'C' => match pool.get(reader.u16()?)? {
            Constant::Integer(v) => AnnotationValue::Char(
                char::from_u32(*v as u32).ok_or_else(|| bad_element("invalid char constant"))?,
            ),
            _ => return Err(bad_element("expected an Integer constant")),
        },
        b'Z' => match pool.get(reader.u16()?)? {
            Constant::Integer(v) => AnnotationValue::Boolean(*v != 0),
            _ => return Err(bad_element("expected an Integer constant")),
        },
        b'J' => match pool.get(reader.u16()?)? {
            Constant::Long(v) => AnnotationValue::Long(*v),
            _ => return Err(bad_element("expected a Long constant")),
        },
        b'F' => match pool.get(reader.u16()?)? {
            Constant::Float(v) => AnnotationValue::Float(*v),
            _ => return Err(bad_element("expected a Float constant")),
        },
        b'D' => match pool.get(reader.u16()?)? {
            Constant::Double(v) => AnnotationValue::Double(*v),
            _ => return Err(bad_element("expected a Double constant")),
        },
        b's' => AnnotationValue::String(pool.utf8(reader.u16()?)?.to_string()),
        b'e' => {
            let type_name = annotation_type_name(pool.utf8(reader.u16()?)?)?;
            let const_name = pool.utf8(reader.u16()?)?.to_string();
            AnnotationValue::Enum { type_name, const_name }
        }
        b'c' => AnnotationValue::Class(pool.utf8(reader.u16()?)?.to_string()),
        b'@' => AnnotationValue::Annotation(parse_annotation(reader, pool)?),
        b'[' => {
            let len = reader.u16()?;
            let mut items = Vec::with_capacity(len as usize);
            for _ in 0..len {
                items.push(parse_element_value(reader, pool)?);
            }
            AnnotationValue::Array(items)
        }
        other => {
            return Err(ClassFileError::BadAnnotation {
                reason: format!("unknown element_value tag {:#x}", other),
            })
        }
    };
    Ok(value)
}

fn bad_element(reason: &str) -> ClassFileError {
    ClassFileError::BadAnnotation {
        reason: reason.to_string(),
    }
}

/// 把注解类型描述符（`Lcom/x/Audited;`）转成点分类型名（`com.x.Audited`）
fn annotation_type_name(descriptor: &str) -> Result<String, ClassFileError> {
    match JavaType::parse_field_descriptor(descriptor)? {
        JavaType::Object(name) => Ok(name),
        _ => Err(ClassFileError::BadAnnotation {
            reason: format!("annotation type descriptor '{}' is not a class type", descriptor),
        }),
    }
}
