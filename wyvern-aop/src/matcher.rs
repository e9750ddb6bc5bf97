//! 方法匹配器
//!
//! 对 [`MethodDescriptor`] 的纯谓词：按名称模式、注解、修饰符
//! 或所属类型匹配，可通过 And/Or/Not 组合成树。
//! 求值是确定性的、无副作用的，规则顺序因此是唯一的行为来源。

use std::sync::Arc;

use regex::Regex;
use wyvern_classfile::MethodDescriptor;

use crate::error::ConfigError;

/// 方法匹配器
#[derive(Clone)]
pub enum MethodMatcher {
    /// 匹配所有方法
    All,

    /// 按方法名匹配，支持 `*` 通配符
    /// 例如：`Name("get*")`
    Name(String),

    /// 按方法名的正则表达式匹配
    NameRegex(Regex),

    /// 按注解类型名匹配（点分形式），支持 `*` 通配符
    /// 例如：`Annotation("com.example.Audited")`
    Annotation(String),

    /// 按所属类型名匹配（点分形式），支持 `*` 通配符
    DeclaringType(String),

    /// 按所属类型名的正则表达式匹配
    TypeRegex(Regex),

    /// 类型与方法名的组合匹配
    /// 例如：execution(* AccountService.withdraw(..))
    Execution {
        type_pattern: String,
        method_pattern: String,
    },

    /// 按修饰符位匹配：`required` 全部置位且 `forbidden` 全部未置位
    Modifiers { required: u16, forbidden: u16 },

    /// 自定义匹配函数
    Custom(Arc<dyn Fn(&MethodDescriptor) -> bool + Send + Sync>),

    /// 与运算（短路：左侧为假即停）
    And(Box<MethodMatcher>, Box<MethodMatcher>),

    /// 或运算（短路：左侧为真即停）
    Or(Box<MethodMatcher>, Box<MethodMatcher>),

    /// 非运算
    Not(Box<MethodMatcher>),
}

impl MethodMatcher {
    /// 检查描述符是否匹配
    ///
    /// 全函数：任何输入都在与描述符大小成正比的时间内返回。
    /// 没有注解的方法被 `Annotation` 匹配器求值时结果为不匹配，
    /// 而不是错误。
    pub fn matches(&self, descriptor: &MethodDescriptor) -> bool {
        match self {
            MethodMatcher::All => true,

            MethodMatcher::Name(pattern) => pattern_matches(pattern, descriptor.name()),

            MethodMatcher::NameRegex(regex) => regex.is_match(descriptor.name()),

            MethodMatcher::Annotation(pattern) => descriptor
                .annotation_names()
                .any(|name| pattern_matches(pattern, name)),

            MethodMatcher::DeclaringType(pattern) => {
                pattern_matches(pattern, descriptor.class_name())
            }

            MethodMatcher::TypeRegex(regex) => regex.is_match(descriptor.class_name()),

            MethodMatcher::Execution { type_pattern, method_pattern } => {
                pattern_matches(type_pattern, descriptor.class_name())
                    && pattern_matches(method_pattern, descriptor.name())
            }

            MethodMatcher::Modifiers { required, forbidden } => {
                let access = descriptor.access_flags();
                access & required == *required && access & forbidden == 0
            }

            MethodMatcher::Custom(func) => func(descriptor),

            MethodMatcher::And(left, right) => {
                left.matches(descriptor) && right.matches(descriptor)
            }

            MethodMatcher::Or(left, right) => {
                left.matches(descriptor) || right.matches(descriptor)
            }

            MethodMatcher::Not(inner) => !inner.matches(descriptor),
        }
    }

    /// 从正则文本构建方法名匹配器
    pub fn name_regex(pattern: &str) -> Result<Self, ConfigError> {
        Ok(MethodMatcher::NameRegex(compile_regex(pattern)?))
    }

    /// 从正则文本构建类型名匹配器
    pub fn type_regex(pattern: &str) -> Result<Self, ConfigError> {
        Ok(MethodMatcher::TypeRegex(compile_regex(pattern)?))
    }

    /// 与运算
    pub fn and(self, other: MethodMatcher) -> Self {
        MethodMatcher::And(Box::new(self), Box::new(other))
    }

    /// 或运算
    pub fn or(self, other: MethodMatcher) -> Self {
        MethodMatcher::Or(Box::new(self), Box::new(other))
    }

    /// 非运算
    pub fn not(self) -> Self {
        MethodMatcher::Not(Box::new(self))
    }
}

fn compile_regex(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|e| ConfigError::InvalidMatcher {
        reason: format!("bad regex '{}': {}", pattern, e),
    })
}

/// 简单的模式匹配（支持 `*` 通配符）
///
/// 支持的模式：
/// - `*` - 匹配任意字符串
/// - `get*` - 以 get 开头
/// - `*Service` - 以 Service 结尾
/// - `com.example.*` - 指定前缀
fn pattern_matches(pattern: &str, target: &str) -> bool {
    if pattern == "*" {
        return true;
    }

    if !pattern.contains('*') {
        return pattern == target;
    }

    // 通配符之外的片段按字面量处理
    let regex_pattern: String = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    let regex_pattern = format!("^{}$", regex_pattern);

    match Regex::new(&regex_pattern) {
        Ok(regex) => regex.is_match(target),
        Err(_) => false,
    }
}

impl std::fmt::Debug for MethodMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MethodMatcher::All => write!(f, "All"),
            MethodMatcher::Name(p) => write!(f, "Name({})", p),
            MethodMatcher::NameRegex(r) => write!(f, "NameRegex({})", r.as_str()),
            MethodMatcher::Annotation(p) => write!(f, "Annotation({})", p),
            MethodMatcher::DeclaringType(p) => write!(f, "DeclaringType({})", p),
            MethodMatcher::TypeRegex(r) => write!(f, "TypeRegex({})", r.as_str()),
            MethodMatcher::Execution { type_pattern, method_pattern } => {
                write!(f, "Execution({}.{})", type_pattern, method_pattern)
            }
            MethodMatcher::Modifiers { required, forbidden } => {
                write!(f, "Modifiers(required={:#06x}, forbidden={:#06x})", required, forbidden)
            }
            MethodMatcher::Custom(_) => write!(f, "Custom(...)"),
            MethodMatcher::And(l, r) => write!(f, "And({:?}, {:?})", l, r),
            MethodMatcher::Or(l, r) => write!(f, "Or({:?}, {:?})", l, r),
            MethodMatcher::Not(inner) => write!(f, "Not({:?})", inner),
        }
    }
}
