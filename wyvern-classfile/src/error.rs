//! 类文件解析与校验的错误类型

use thiserror::Error;

/// 类文件解析错误
///
/// 输入字节流不是合法的 class 文件时返回，
/// 对单个类是致命的，但不应中断同批次其他类的处理
#[derive(Debug, Error)]
pub enum ClassFileError {
    /// 字节流在预期位置之前结束
    #[error("unexpected end of class file at offset {0}")]
    UnexpectedEof(usize),

    /// 魔数不是 0xCAFEBABE
    #[error("bad magic number {magic:#010x}")]
    BadMagic { magic: u32 },

    /// 常量池 tag 无法识别
    #[error("unknown constant pool tag {tag} at offset {offset}")]
    UnknownConstantTag { tag: u8, offset: usize },

    /// 常量池索引越界或指向错误类型的常量
    #[error("invalid constant pool index {index}: {reason}")]
    BadConstantIndex { index: u16, reason: String },

    /// Utf8 常量不是合法的 UTF-8
    #[error("constant pool entry {index} is not valid UTF-8")]
    InvalidUtf8 { index: u16 },

    /// 方法/字段描述符无法解析
    #[error("malformed descriptor '{descriptor}'")]
    BadDescriptor { descriptor: String },

    /// 注解属性结构损坏
    #[error("malformed annotation attribute: {reason}")]
    BadAnnotation { reason: String },

    /// 其他结构性错误
    #[error("malformed class file: {reason}")]
    Malformed { reason: String },

    /// 常量池槽位已满，无法再追加条目
    #[error("constant pool exhausted ({size} slots)")]
    PoolExhausted { size: usize },
}

/// 生成字节码时的结构性校验错误
#[derive(Debug, Error)]
pub enum VerifyError {
    /// 生成的字节流无法重新解析
    #[error("generated class does not reparse: {0}")]
    Reparse(#[from] ClassFileError),

    /// 同一个类中出现重复的方法签名
    #[error("duplicate method {name}{descriptor} in class {class}")]
    DuplicateMethod {
        class: String,
        name: String,
        descriptor: String,
    },

    /// Code 属性的长度字段与实际内容不一致
    #[error("inconsistent Code attribute in {class}.{method}: {reason}")]
    BadCodeAttribute {
        class: String,
        method: String,
        reason: String,
    },

    /// 方法体超出 JVM 允许的最大长度
    #[error("code of {class}.{method} exceeds 65535 bytes ({len})")]
    CodeTooLong {
        class: String,
        method: String,
        len: usize,
    },

    /// 常量池索引在生成的类中越界
    #[error("constant pool index {index} out of range (pool size {size})")]
    ConstantOutOfRange { index: u16, size: u16 },
}
