//! 拦截器链
//!
//! 一个被织入方法对应一条链：规则解析结果在变换期确定，
//! 运行期只是按固定顺序执行。链本身不可变、可跨线程共享；
//! 每次调用都创建独立的 [`MethodInvocation`]。

use std::sync::Arc;

use crate::interceptor::{ArgValue, ChainResult, MethodInterceptor, TargetRef};
use crate::invocation::{MethodInvocation, MethodSignature, TerminalFn};

/// 一条已解析的拦截器链
#[derive(Clone)]
pub struct InterceptorChain {
    signature: MethodSignature,
    interceptors: Vec<(Arc<str>, Arc<dyn MethodInterceptor>)>,
}

impl InterceptorChain {
    pub fn new(
        signature: MethodSignature,
        interceptors: Vec<(Arc<str>, Arc<dyn MethodInterceptor>)>,
    ) -> Self {
        Self { signature, interceptors }
    }

    pub fn signature(&self) -> &MethodSignature {
        &self.signature
    }

    /// 链上拦截器的名称，按执行顺序
    pub fn interceptor_names(&self) -> impl Iterator<Item = &str> {
        self.interceptors.iter().map(|(name, _)| name.as_ref())
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// 为一次具体调用构建 Invocation
    ///
    /// `terminal` 是真实方法体；嵌套调用各自构建独立实例
    pub fn invocation(
        &self,
        target: Option<TargetRef>,
        args: Vec<ArgValue>,
        terminal: TerminalFn,
    ) -> MethodInvocation {
        MethodInvocation::new(
            self.signature.clone(),
            target,
            args,
            self.interceptors
                .iter()
                .map(|(_, interceptor)| Arc::clone(interceptor))
                .collect(),
            terminal,
        )
    }

    /// 构建并立即执行一次调用
    pub fn invoke(
        &self,
        target: Option<TargetRef>,
        args: Vec<ArgValue>,
        terminal: TerminalFn,
    ) -> ChainResult {
        let mut invocation = self.invocation(target, args, terminal);
        invocation.execute()
    }
}

impl std::fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("signature", &self.signature.to_string())
            .field("interceptors", &self.interceptor_names().collect::<Vec<_>>())
            .finish()
    }
}
