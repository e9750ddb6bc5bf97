//! 织入管线的错误类型
//!
//! 单个类的失败被隔离在该类内部：解析或校验失败的类
//! 原样透传，不会中断批次中其他类的处理。

use std::path::PathBuf;

use thiserror::Error;
use wyvern_classfile::{ClassFileError, VerifyError};

/// 织入错误
#[derive(Debug, Error)]
pub enum WeaveError {
    /// 输入不是合法的 class 文件
    #[error("malformed class '{class}': {source}")]
    Malformed {
        class: String,
        #[source]
        source: ClassFileError,
    },

    /// 生成的替换字节码未通过结构校验
    #[error("transformed class '{class}' failed verification: {source}")]
    Verification {
        class: String,
        #[source]
        source: VerifyError,
    },

    /// 变换期无法扩展类结构（如常量池已满）
    #[error("cannot extend class '{class}': {source}")]
    Rewrite {
        class: String,
        #[source]
        source: ClassFileError,
    },

    /// 读写 class 文件时的 I/O 错误
    #[error("i/o error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 清单文本无法解析
    #[error("invalid weave manifest: {reason}")]
    ManifestParse { reason: String },

    /// 清单引用了注册表中不存在的拦截器
    #[error("chain #{chain_id} references unknown interceptor '{name}'")]
    UnboundInterceptor { chain_id: u32, name: String },
}
