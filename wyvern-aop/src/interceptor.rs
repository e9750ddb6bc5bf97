//! 拦截器定义
//!
//! 拦截器是围绕匹配方法调用的能力：可以检查/修改参数、
//! 短路返回，或通过延续把控制交给链上的下一环。
//! 拦截器由外部容器持有，在任何解析发生之前按名称注册。

use std::any::Any;
use std::sync::Arc;

use crate::invocation::MethodInvocation;

/// 链上传递的返回值：`None` 对应 void 方法
pub type ReturnValue = Option<Box<dyn Any + Send>>;

/// 链上的单个参数值，拦截器可以替换
pub type ArgValue = Box<dyn Any + Send>;

/// 目标实例的共享引用（静态方法没有目标）
pub type TargetRef = Arc<dyn Any + Send + Sync>;

/// 链执行结果
///
/// 错误使用 `anyhow::Error` 承载：拦截器或终端方法抛出的
/// 原始错误类型通过 `downcast` 原样可见，链本身从不改写错误类型
pub type ChainResult = anyhow::Result<ReturnValue>;

/// 方法拦截器
///
/// 实现约定：
/// - 调用 `invocation.proceed()` 零次即短路，一次即委托下游；
///   第二次调用同一延续会得到使用错误（见 [`crate::ChainUsageError`]）
/// - 抛出的错误同步传播给整条链的调用方，类型不变
/// - 拦截器自身的共享状态由实现者负责同步，链不提供锁
pub trait MethodInterceptor: Send + Sync {
    /// 在连接点执行拦截逻辑
    fn invoke(&self, invocation: &mut MethodInvocation) -> ChainResult;
}

/// 用闭包实现的拦截器，便于内联定义简单切面
pub struct FnInterceptor<F>(F);

impl<F> FnInterceptor<F>
where
    F: Fn(&mut MethodInvocation) -> ChainResult + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self(func)
    }
}

impl<F> MethodInterceptor for FnInterceptor<F>
where
    F: Fn(&mut MethodInvocation) -> ChainResult + Send + Sync,
{
    fn invoke(&self, invocation: &mut MethodInvocation) -> ChainResult {
        (self.0)(invocation)
    }
}

/// 把闭包包装成 `Arc<dyn MethodInterceptor>`
pub fn interceptor_fn<F>(func: F) -> Arc<dyn MethodInterceptor>
where
    F: Fn(&mut MethodInvocation) -> ChainResult + Send + Sync + 'static,
{
    Arc::new(FnInterceptor::new(func))
}
