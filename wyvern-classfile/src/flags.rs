//! JVM 访问标志常量
//!
//! 对应 class 文件中 access_flags 字段的位定义

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_PROTECTED: u16 = 0x0004;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_FINAL: u16 = 0x0010;
pub const ACC_SYNCHRONIZED: u16 = 0x0020;
/// 类级别的 ACC_SUPER，与方法级 ACC_SYNCHRONIZED 同值
pub const ACC_SUPER: u16 = 0x0020;
pub const ACC_BRIDGE: u16 = 0x0040;
pub const ACC_VARARGS: u16 = 0x0080;
pub const ACC_NATIVE: u16 = 0x0100;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;
pub const ACC_STRICT: u16 = 0x0800;
pub const ACC_SYNTHETIC: u16 = 0x1000;
pub const ACC_ANNOTATION: u16 = 0x2000;
pub const ACC_ENUM: u16 = 0x4000;

/// 根据名称查找访问标志位
///
/// 用于从配置中构建修饰符匹配器
pub fn flag_by_name(name: &str) -> Option<u16> {
    match name {
        "public" => Some(ACC_PUBLIC),
        "private" => Some(ACC_PRIVATE),
        "protected" => Some(ACC_PROTECTED),
        "static" => Some(ACC_STATIC),
        "final" => Some(ACC_FINAL),
        "synchronized" => Some(ACC_SYNCHRONIZED),
        "bridge" => Some(ACC_BRIDGE),
        "varargs" => Some(ACC_VARARGS),
        "native" => Some(ACC_NATIVE),
        "abstract" => Some(ACC_ABSTRACT),
        "synthetic" => Some(ACC_SYNTHETIC),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_by_name() {
        assert_eq!(flag_by_name("public"), Some(ACC_PUBLIC));
        assert_eq!(flag_by_name("static"), Some(ACC_STATIC));
        assert_eq!(flag_by_name("synthetic"), Some(ACC_SYNTHETIC));
        assert_eq!(flag_by_name("volatile"), None);
    }
}
