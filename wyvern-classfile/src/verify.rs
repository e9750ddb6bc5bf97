//! 生成字节码的结构性校验
//!
//! 变换管线在接受生成结果之前调用这里：重新解析整个类，
//! 检查常量池索引、方法签名唯一性和 Code 属性封套的一致性。
//! 校验失败的类不会进入输出批次，原始字节原样透传。

use std::collections::HashSet;

use crate::bytes::ByteReader;
use crate::class::{ClassFile, MethodInfo};
use crate::error::VerifyError;
use crate::reader::ClassReader;

/// JVM 对单个方法体的代码长度上限
const MAX_CODE_LENGTH: usize = 65535;

/// 校验一段 class 文件字节流的结构有效性
pub fn verify_class(data: &[u8]) -> Result<(), VerifyError> {
    let class = ClassReader::parse(data)?;
    verify_structure(&class)
}

/// 校验已解析的类结构
pub fn verify_structure(class: &ClassFile) -> Result<(), VerifyError> {
    let pool_size = class.constant_pool.slot_count();
    let class_name = class.binary_name();

    for index in [class.this_class, class.super_class] {
        check_index(index, pool_size)?;
    }
    for interface in &class.interfaces {
        check_index(*interface, pool_size)?;
    }

    let mut seen = HashSet::new();
    for method in &class.methods {
        check_index(method.name_index, pool_size)?;
        check_index(method.descriptor_index, pool_size)?;

        if !seen.insert((method.name.as_str(), method.descriptor.as_str())) {
            return Err(VerifyError::DuplicateMethod {
                class: class_name.clone(),
                name: method.name.clone(),
                descriptor: method.descriptor.clone(),
            });
        }

        verify_code_envelope(&class_name, method)?;
    }

    Ok(())
}

fn check_index(index: u16, pool_size: u16) -> Result<(), VerifyError> {
    if index == 0 || index >= pool_size {
        return Err(VerifyError::ConstantOutOfRange { index, size: pool_size });
    }
    Ok(())
}

/// 检查 Code 属性的头部与内容长度一致
fn verify_code_envelope(class_name: &str, method: &MethodInfo) -> Result<(), VerifyError> {
    let Some(attribute) = method.attribute("Code") else {
        return Ok(());
    };

    let bad = |reason: &str| VerifyError::BadCodeAttribute {
        class: class_name.to_string(),
        method: method.name.clone(),
        reason: reason.to_string(),
    };

    let mut reader = ByteReader::new(&attribute.info);
    let _max_stack = reader.u16().map_err(|_| bad("truncated header"))?;
    let _max_locals = reader.u16().map_err(|_| bad("truncated header"))?;
    let code_length = reader.u32().map_err(|_| bad("truncated header"))? as usize;

    if code_length == 0 {
        return Err(bad("empty code array"));
    }
    if code_length > MAX_CODE_LENGTH {
        return Err(VerifyError::CodeTooLong {
            class: class_name.to_string(),
            method: method.name.clone(),
            len: code_length,
        });
    }
    if reader.remaining() < code_length {
        return Err(bad("code_length exceeds attribute size"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::CodeBuilder;
    use crate::flags;

    fn sample_class() -> ClassFile {
        let mut class = ClassFile::new("com/example/Demo", "java/lang/Object", 52).unwrap();
        let mut builder = CodeBuilder::new(1);
        builder.return_void();
        class
            .add_method("run", "()V", flags::ACC_PUBLIC, Some(builder.finish()))
            .unwrap();
        class
    }

    #[test]
    fn test_valid_class_passes() {
        let bytes = sample_class().to_bytes();
        verify_class(&bytes).unwrap();
    }

    #[test]
    fn test_duplicate_method_rejected() {
        let mut class = sample_class();
        class.add_method("run", "()V", flags::ACC_PUBLIC, None).unwrap();
        assert!(matches!(
            verify_structure(&class),
            Err(VerifyError::DuplicateMethod { .. })
        ));
    }

    #[test]
    fn test_truncated_code_attribute_rejected() {
        let mut class = sample_class();
        // 把 code_length 改成超过属性实际大小的值
        let attribute = class.methods[0]
            .attributes
            .iter_mut()
            .find(|a| a.name == "Code")
            .unwrap();
        attribute.info[4..8].copy_from_slice(&1000u32.to_be_bytes());
        assert!(matches!(
            verify_structure(&class),
            Err(VerifyError::BadCodeAttribute { .. })
        ));
    }

    #[test]
    fn test_garbage_does_not_reparse() {
        assert!(matches!(
            verify_class(&[0xDE, 0xAD, 0xBE, 0xEF]),
            Err(VerifyError::Reparse(_))
        ));
    }
}
