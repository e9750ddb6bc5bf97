//! 方法描述符模型
//!
//! `MethodDescriptor` 是一个编译后方法的只读视图：所属类型名、方法名、
//! 参数/返回类型、访问标志位和注解索引。每个被发现的方法只构建一次，
//! 之后不再修改；身份是结构化的（类型 + 名称 + 签名），与实例无关。

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::annotations::Annotation;
use crate::error::ClassFileError;
use crate::flags;

/// JVM 类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JavaType {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Void,
    /// 引用类型，点分类名（如 `java.lang.String`）
    Object(String),
    /// 数组类型
    Array(Box<JavaType>),
}

impl JavaType {
    /// 解析单个字段描述符（如 `I`、`Ljava/lang/String;`、`[[D`）
    pub fn parse_field_descriptor(descriptor: &str) -> Result<Self, ClassFileError> {
        let mut chars = descriptor.chars();
        let parsed = Self::parse_next(&mut chars).ok_or_else(|| ClassFileError::BadDescriptor {
            descriptor: descriptor.to_string(),
        })?;
        if chars.next().is_some() {
            return Err(ClassFileError::BadDescriptor {
                descriptor: descriptor.to_string(),
            });
        }
        Ok(parsed)
    }

    fn parse_next(chars: &mut std::str::Chars<'_>) -> Option<Self> {
        match chars.next()? {
            'Z' => Some(JavaType::Boolean),
            'B' => Some(JavaType::Byte),
            'C' => Some(JavaType::Char),
            'S' => Some(JavaType::Short),
            'I' => Some(JavaType::Int),
            'J' => Some(JavaType::Long),
            'F' => Some(JavaType::Float),
            'D' => Some(JavaType::Double),
            'V' => Some(JavaType::Void),
            'L' => {
                let mut name = String::new();
                loop {
                    match chars.next()? {
                        ';' => break,
                        c => name.push(c),
                    }
                }
                Some(JavaType::Object(name.replace('/', ".")))
            }
            '[' => Some(JavaType::Array(Box::new(Self::parse_next(chars)?))),
            _ => None,
        }
    }

    /// 是否为基础类型（不含 void）
    pub fn is_primitive(&self) -> bool {
        !matches!(self, JavaType::Object(_) | JavaType::Array(_) | JavaType::Void)
    }

    /// 该类型在局部变量表中占用的槽位数
    pub fn slot_size(&self) -> u16 {
        match self {
            JavaType::Long | JavaType::Double => 2,
            JavaType::Void => 0,
            _ => 1,
        }
    }

    /// `checkcast`/`anewarray` 使用的内部名：
    /// 引用类型为 `java/lang/String`，数组类型为描述符形式 `[Ljava/lang/String;`
    pub fn internal_name(&self) -> Option<String> {
        match self {
            JavaType::Object(name) => Some(name.replace('.', "/")),
            JavaType::Array(_) => Some(self.to_descriptor()),
            _ => None,
        }
    }

    /// 还原为描述符文本
    pub fn to_descriptor(&self) -> String {
        match self {
            JavaType::Boolean => "Z".to_string(),
            JavaType::Byte => "B".to_string(),
            JavaType::Char => "C".to_string(),
            JavaType::Short => "S".to_string(),
            JavaType::Int => "I".to_string(),
            JavaType::Long => "J".to_string(),
            JavaType::Float => "F".to_string(),
            JavaType::Double => "D".to_string(),
            JavaType::Void => "V".to_string(),
            JavaType::Object(name) => format!("L{};", name.replace('.', "/")),
            JavaType::Array(inner) => format!("[{}", inner.to_descriptor()),
        }
    }
}

/// 解析方法描述符（如 `(ILjava/lang/String;)V`）为参数类型和返回类型
pub fn parse_method_descriptor(
    descriptor: &str,
) -> Result<(Vec<JavaType>, JavaType), ClassFileError> {
    let bad = || ClassFileError::BadDescriptor {
        descriptor: descriptor.to_string(),
    };

    let rest = descriptor.strip_prefix('(').ok_or_else(bad)?;
    let close = rest.find(')').ok_or_else(bad)?;
    let (params_text, return_text) = rest.split_at(close);
    let return_text = &return_text[1..];

    let mut parameters = Vec::new();
    let mut chars = params_text.chars();
    loop {
        let remainder = chars.as_str();
        if remainder.is_empty() {
            break;
        }
        let parsed = JavaType::parse_next(&mut chars).ok_or_else(bad)?;
        if parsed == JavaType::Void {
            return Err(bad());
        }
        parameters.push(parsed);
    }

    let return_type = JavaType::parse_field_descriptor(return_text)?;
    Ok((parameters, return_type))
}

/// 方法描述符：一个已声明方法的不可变视图
///
/// 身份由（类型名，方法名，原始描述符）决定，`Eq`/`Hash` 均按此实现
#[derive(Debug, Clone)]
pub struct MethodDescriptor {
    class_name: String,
    name: String,
    descriptor: String,
    parameters: Vec<JavaType>,
    return_type: JavaType,
    access_flags: u16,
    annotations: BTreeMap<String, Annotation>,
}

impl MethodDescriptor {
    pub fn new(
        class_name: String,
        name: String,
        descriptor: String,
        access_flags: u16,
        annotations: Vec<Annotation>,
    ) -> Result<Self, ClassFileError> {
        let (parameters, return_type) = parse_method_descriptor(&descriptor)?;
        let annotations = annotations
            .into_iter()
            .map(|a| (a.type_name.clone(), a))
            .collect();
        Ok(Self {
            class_name,
            name,
            descriptor,
            parameters,
            return_type,
            access_flags,
            annotations,
        })
    }

    /// 所属类型的点分类名
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 原始方法描述符文本
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    pub fn parameters(&self) -> &[JavaType] {
        &self.parameters
    }

    pub fn return_type(&self) -> &JavaType {
        &self.return_type
    }

    pub fn access_flags(&self) -> u16 {
        self.access_flags
    }

    /// 是否声明了指定注解（点分类名精确匹配）
    pub fn has_annotation(&self, type_name: &str) -> bool {
        self.annotations.contains_key(type_name)
    }

    /// 取指定注解的声明值
    pub fn annotation(&self, type_name: &str) -> Option<&Annotation> {
        self.annotations.get(type_name)
    }

    /// 所有注解的类型名，按名称有序
    pub fn annotation_names(&self) -> impl Iterator<Item = &str> {
        self.annotations.keys().map(|s| s.as_str())
    }

    pub fn is_public(&self) -> bool {
        self.access_flags & flags::ACC_PUBLIC != 0
    }

    pub fn is_static(&self) -> bool {
        self.access_flags & flags::ACC_STATIC != 0
    }

    pub fn is_abstract(&self) -> bool {
        self.access_flags & flags::ACC_ABSTRACT != 0
    }

    pub fn is_native(&self) -> bool {
        self.access_flags & flags::ACC_NATIVE != 0
    }

    pub fn is_synthetic(&self) -> bool {
        self.access_flags & flags::ACC_SYNTHETIC != 0
    }

    pub fn is_bridge(&self) -> bool {
        self.access_flags & flags::ACC_BRIDGE != 0
    }

    /// 是否为构造器或静态初始化块
    pub fn is_initializer(&self) -> bool {
        self.name == "<init>" || self.name == "<clinit>"
    }

    /// 完整签名文本，如 `com.example.Account.withdraw(J)V`
    pub fn signature(&self) -> String {
        format!("{}.{}{}", self.class_name, self.name, self.descriptor)
    }
}

impl PartialEq for MethodDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.class_name == other.class_name
            && self.name == other.name
            && self.descriptor == other.descriptor
    }
}

impl Eq for MethodDescriptor {}

impl Hash for MethodDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.class_name.hash(state);
        self.name.hash(state);
        self.descriptor.hash(state);
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.signature())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_method_descriptor() {
        let (params, ret) = parse_method_descriptor("(ILjava/lang/String;[[D)J").unwrap();
        assert_eq!(
            params,
            vec![
                JavaType::Int,
                JavaType::Object("java.lang.String".to_string()),
                JavaType::Array(Box::new(JavaType::Array(Box::new(JavaType::Double)))),
            ]
        );
        assert_eq!(ret, JavaType::Long);
    }

    #[test]
    fn test_parse_empty_params() {
        let (params, ret) = parse_method_descriptor("()V").unwrap();
        assert!(params.is_empty());
        assert_eq!(ret, JavaType::Void);
    }

    #[test]
    fn test_malformed_descriptors() {
        assert!(parse_method_descriptor("I)V").is_err());
        assert!(parse_method_descriptor("(I").is_err());
        assert!(parse_method_descriptor("(Q)V").is_err());
        assert!(parse_method_descriptor("(V)V").is_err());
        assert!(JavaType::parse_field_descriptor("Ljava/lang/String").is_err());
        assert!(JavaType::parse_field_descriptor("II").is_err());
    }

    #[test]
    fn test_descriptor_round_trip() {
        for text in ["I", "J", "Ljava/lang/String;", "[I", "[[Ljava/util/Map;"] {
            let parsed = JavaType::parse_field_descriptor(text).unwrap();
            assert_eq!(parsed.to_descriptor(), text);
        }
    }

    #[test]
    fn test_structural_identity() {
        let a = MethodDescriptor::new(
            "com.example.Account".to_string(),
            "withdraw".to_string(),
            "(J)V".to_string(),
            flags::ACC_PUBLIC,
            vec![],
        )
        .unwrap();
        let b = MethodDescriptor::new(
            "com.example.Account".to_string(),
            "withdraw".to_string(),
            "(J)V".to_string(),
            flags::ACC_PUBLIC | flags::ACC_FINAL,
            vec![],
        )
        .unwrap();
        // 标志位不同不影响结构化身份
        assert_eq!(a, b);
        assert_eq!(a.signature(), "com.example.Account.withdraw(J)V");
    }

    #[test]
    fn test_internal_name() {
        assert_eq!(
            JavaType::Object("java.lang.String".to_string()).internal_name(),
            Some("java/lang/String".to_string())
        );
        assert_eq!(
            JavaType::Array(Box::new(JavaType::Int)).internal_name(),
            Some("[I".to_string())
        );
        assert_eq!(JavaType::Int.internal_name(), None);
    }
}
