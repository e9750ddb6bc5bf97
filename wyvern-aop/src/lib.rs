//! Wyvern AOP - 方法拦截核心
//!
//! 提供字节码织入所需的拦截模型，支持：
//! - 可组合的方法匹配器（名称/注解/修饰符/类型 + And/Or/Not）
//! - 有序拦截规则集（builder/frozen 两段式，冻结时校验引用）
//! - 显式传递的拦截器注册表（没有全局状态）
//! - 同步的拦截器链运行时：单次使用的 Invocation、
//!   带重放保护的延续、终端方法体至多执行一次
//!
//! 链在调用方线程上执行，不做线程切换，也不引入新的并发契约；
//! 同一方法的并发调用各自持有独立的 Invocation，链层面无需加锁。

pub mod chain;
pub mod error;
pub mod interceptor;
pub mod invocation;
pub mod matcher;
pub mod registry;
pub mod rules;

// 重新导出核心类型
pub use chain::InterceptorChain;
pub use error::{ChainUsageError, ConfigError};
pub use interceptor::{
    interceptor_fn, ArgValue, ChainResult, FnInterceptor, MethodInterceptor, ReturnValue,
    TargetRef,
};
pub use invocation::{InvocationState, MethodInvocation, MethodSignature, TerminalFn};
pub use matcher::MethodMatcher;
pub use registry::InterceptorRegistry;
pub use rules::{InterceptionRule, RuleSet, RuleSetBuilder};

/// 预导入模块
pub mod prelude {
    pub use crate::chain::InterceptorChain;
    pub use crate::error::{ChainUsageError, ConfigError};
    pub use crate::interceptor::{
        interceptor_fn, ChainResult, MethodInterceptor, ReturnValue, TargetRef,
    };
    pub use crate::invocation::{InvocationState, MethodInvocation, MethodSignature};
    pub use crate::matcher::MethodMatcher;
    pub use crate::registry::InterceptorRegistry;
    pub use crate::rules::{InterceptionRule, RuleSet, RuleSetBuilder};
}
