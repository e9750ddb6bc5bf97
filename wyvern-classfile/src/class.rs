//! class 文件对象模型
//!
//! 保留原始属性字节，未被织入触碰的部分在重新序列化时逐字节还原。

use crate::annotations::{
    parse_annotations, Annotation, RUNTIME_INVISIBLE_ANNOTATIONS, RUNTIME_VISIBLE_ANNOTATIONS,
};
use crate::constant_pool::ConstantPool;
use crate::descriptor::MethodDescriptor;
use crate::error::ClassFileError;
use crate::flags;

/// 通用属性：名称加原始内容
///
/// 除了织入时新生成的 `Code` 属性，所有属性内容都原样透传
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name_index: u16,
    pub name: String,
    pub info: Vec<u8>,
}

/// 字段条目
#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub name: String,
    pub descriptor: String,
    pub attributes: Vec<Attribute>,
}

/// 方法条目
#[derive(Debug, Clone)]
pub struct MethodInfo {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub name: String,
    pub descriptor: String,
    pub attributes: Vec<Attribute>,
}

impl MethodInfo {
    /// 查找指定名称的属性
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// 是否携带 Code 属性（abstract/native 方法没有）
    pub fn has_code(&self) -> bool {
        self.attribute("Code").is_some()
    }

    /// 摘除指定名称的属性并返回，用于把注解从原方法移动到包装方法
    pub fn take_attributes(&mut self, names: &[&str]) -> Vec<Attribute> {
        let mut taken = Vec::new();
        self.attributes.retain(|a| {
            if names.contains(&a.name.as_str()) {
                taken.push(a.clone());
                false
            } else {
                true
            }
        });
        taken
    }

    /// 解码该方法声明的全部注解（运行时可见 + 不可见）
    pub fn annotations(&self, pool: &ConstantPool) -> Result<Vec<Annotation>, ClassFileError> {
        let mut all = Vec::new();
        for name in [RUNTIME_VISIBLE_ANNOTATIONS, RUNTIME_INVISIBLE_ANNOTATIONS] {
            if let Some(attribute) = self.attribute(name) {
                all.extend(parse_annotations(&attribute.info, pool)?);
            }
        }
        Ok(all)
    }
}

/// 解析后的 class 文件
#[derive(Debug, Clone)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub constant_pool: ConstantPool,
    pub access_flags: u16,
    pub this_class: u16,
    pub super_class: u16,
    /// 内部类名（斜杠分隔，如 `com/example/Account`）
    pub class_name: String,
    pub interfaces: Vec<u16>,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
    pub attributes: Vec<Attribute>,
}

impl ClassFile {
    /// 以编程方式创建一个空类（供生成器与测试夹具使用）
    pub fn new(
        internal_name: &str,
        super_internal_name: &str,
        major_version: u16,
    ) -> Result<Self, ClassFileError> {
        let mut constant_pool = ConstantPool::new();
        let this_class = constant_pool.add_class(internal_name)?;
        let super_class = constant_pool.add_class(super_internal_name)?;
        Ok(Self {
            minor_version: 0,
            major_version,
            constant_pool,
            access_flags: flags::ACC_PUBLIC | flags::ACC_SUPER,
            this_class,
            super_class,
            class_name: internal_name.to_string(),
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        })
    }

    /// 点分类名（如 `com.example.Account`）
    pub fn binary_name(&self) -> String {
        self.class_name.replace('/', ".")
    }

    /// 是否已有同名方法（任意描述符）
    pub fn has_method_named(&self, name: &str) -> bool {
        self.methods.iter().any(|m| m.name == name)
    }

    /// 追加一个方法
    ///
    /// `code` 为 Code 属性的内容字节（不含属性头），
    /// 传 `None` 表示 abstract/native 方法
    pub fn add_method(
        &mut self,
        name: &str,
        descriptor: &str,
        access_flags: u16,
        code: Option<Vec<u8>>,
    ) -> Result<&mut MethodInfo, ClassFileError> {
        let name_index = self.constant_pool.add_utf8(name)?;
        let descriptor_index = self.constant_pool.add_utf8(descriptor)?;
        let mut attributes = Vec::new();
        if let Some(info) = code {
            let code_name_index = self.constant_pool.add_utf8("Code")?;
            attributes.push(Attribute {
                name_index: code_name_index,
                name: "Code".to_string(),
                info,
            });
        }
        let index = self.methods.len();
        self.methods.push(MethodInfo {
            access_flags,
            name_index,
            descriptor_index,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            attributes,
        });
        Ok(&mut self.methods[index])
    }

    /// 为类中每个直接声明的方法构建描述符
    ///
    /// 不包含继承方法：匹配发生在类/字节层面，先于任何实例存在
    pub fn descriptors(&self) -> Result<Vec<MethodDescriptor>, ClassFileError> {
        let binary_name = self.binary_name();
        self.methods
            .iter()
            .map(|method| {
                let annotations = method.annotations(&self.constant_pool)?;
                MethodDescriptor::new(
                    binary_name.clone(),
                    method.name.clone(),
                    method.descriptor.clone(),
                    method.access_flags,
                    annotations,
                )
            })
            .collect()
    }
}
