//! Wyvern ClassFile - JVM class 文件模型
//!
//! 为织入管线提供：
//! - class 文件的解析与逐字节还原的序列化
//! - 常量池模型（支持向池尾追加条目）
//! - 方法描述符（匹配器消费的只读视图）
//! - 注解属性解码
//! - 直线型字节码生成器与结构性校验

pub mod annotations;
pub mod bytes;
pub mod class;
pub mod constant_pool;
pub mod descriptor;
pub mod emit;
pub mod error;
pub mod flags;
pub mod reader;
pub mod verify;

mod writer;

// 重新导出核心类型
pub use annotations::{Annotation, AnnotationValue};
pub use class::{Attribute, ClassFile, FieldInfo, MethodInfo};
pub use constant_pool::{Constant, ConstantPool};
pub use descriptor::{parse_method_descriptor, JavaType, MethodDescriptor};
pub use emit::CodeBuilder;
pub use error::{ClassFileError, VerifyError};
pub use reader::ClassReader;
pub use verify::{verify_class, verify_structure};
