//! 规则配置与链执行的错误类型

use thiserror::Error;

/// 规则集构建期的配置错误
///
/// 在冻结规则集时（任何扫描开始之前）快速失败：
/// 一条无法解析的规则意味着整个规则集不可信
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 规则引用了未注册的拦截器名称
    #[error("rule #{rule}: unknown interceptor '{name}'")]
    UnknownInterceptor { rule: usize, name: String },

    /// 规则没有引用任何拦截器
    #[error("rule #{rule}: empty interceptor list")]
    EmptyRule { rule: usize },

    /// 匹配器描述无效（如非法正则）
    #[error("invalid matcher spec: {reason}")]
    InvalidMatcher { reason: String },

    /// 规则配置文本无法解析
    #[error("invalid rule configuration: {reason}")]
    Parse { reason: String },
}

/// 链运行时的使用错误
///
/// 只覆盖调用协议被破坏的情形；拦截器和目标方法抛出的
/// 业务错误原样透传，不会被包装成这里的类型
#[derive(Debug, Error)]
pub enum ChainUsageError {
    /// 同一深度的延续被第二次调用
    ///
    /// 本实现选择拒绝重放而不是重新执行下游链，
    /// 终端方法体因此保证至多执行一次
    #[error("continuation for {signature} already consumed at depth {depth}")]
    ContinuationReplayed { signature: String, depth: usize },

    /// 单次使用的 Invocation 被再次执行
    #[error("invocation for {signature} has already been executed")]
    AlreadyExecuted { signature: String },
}
