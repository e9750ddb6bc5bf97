//! 调用记录（Invocation）
//!
//! 一次被拦截调用的单次使用运行时记录：持有目标引用、
//! 可被拦截器修改的参数数组、剩余待执行的拦截器序列，
//! 以及指向真实方法体的终端 thunk。生命周期限于栈上，
//! 调用完成后即销毁，从不持久化或复用。

use std::fmt;
use std::sync::Arc;

use crate::error::ChainUsageError;
use crate::interceptor::{ArgValue, ChainResult, MethodInterceptor, TargetRef};

/// 调用状态机
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    /// 尚未开始执行
    Pending,
    /// 链正在执行
    Running,
    /// 最外层正常返回
    Completed,
    /// 某一环抛出且未被捕获，终态
    Failed,
}

/// 被拦截方法的签名标识
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
    /// 点分类名
    pub class_name: String,
    pub method_name: String,
    /// 原始方法描述符
    pub descriptor: String,
}

impl MethodSignature {
    pub fn new(
        class_name: impl Into<String>,
        method_name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: method_name.into(),
            descriptor: descriptor.into(),
        }
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.class_name, self.method_name, self.descriptor)
    }
}

/// 终端 thunk：真实方法体
///
/// `FnOnce` 保证真实方法体至多执行一次
pub type TerminalFn = Box<dyn FnOnce(Option<&TargetRef>, &mut Vec<ArgValue>) -> ChainResult + Send>;

/// 一次被拦截调用的运行时记录
///
/// 每次调用独立构建，链不跨调用共享或池化；
/// 嵌套的被拦截调用使用各自独立的实例
pub struct MethodInvocation {
    signature: MethodSignature,
    target: Option<TargetRef>,
    args: Vec<ArgValue>,
    interceptors: Vec<Arc<dyn MethodInterceptor>>,
    terminal: Option<TerminalFn>,
    /// 每个深度的延续是否已被消费（NOT_CALLED / CALLED_ONCE）
    proceeded: Vec<bool>,
    depth: usize,
    state: InvocationState,
}

impl MethodInvocation {
    pub(crate) fn new(
        signature: MethodSignature,
        target: Option<TargetRef>,
        args: Vec<ArgValue>,
        interceptors: Vec<Arc<dyn MethodInterceptor>>,
        terminal: TerminalFn,
    ) -> Self {
        let guard_slots = interceptors.len() + 1;
        Self {
            signature,
            target,
            args,
            interceptors,
            terminal: Some(terminal),
            proceeded: vec![false; guard_slots],
            depth: 0,
            state: InvocationState::Pending,
        }
    }

    /// 驱动整条链执行
    ///
    /// 单次使用：第二次调用返回 [`ChainUsageError::AlreadyExecuted`]
    pub fn execute(&mut self) -> ChainResult {
        if self.state != InvocationState::Pending {
            return Err(ChainUsageError::AlreadyExecuted {
                signature: self.signature.to_string(),
            }
            .into());
        }
        self.state = InvocationState::Running;
        let result = self.proceed();
        self.state = if result.is_ok() {
            InvocationState::Completed
        } else {
            InvocationState::Failed
        };
        result
    }

    /// 延续：执行链上的下一环（或终端方法体）
    ///
    /// 带单次使用保护：同一深度的第二次调用被拒绝为使用错误，
    /// 终端方法体因此至多执行一次，无论多少拦截器调用延续
    pub fn proceed(&mut self) -> ChainResult {
        let here = self.depth;
        if self.proceeded[here] {
            return Err(ChainUsageError::ContinuationReplayed {
                signature: self.signature.to_string(),
                depth: here,
            }
            .into());
        }
        self.proceeded[here] = true;

        if here < self.interceptors.len() {
            let interceptor = Arc::clone(&self.interceptors[here]);
            self.depth = here + 1;
            let result = interceptor.invoke(self);
            self.depth = here;
            result
        } else {
            let terminal = self.terminal.take().ok_or_else(|| {
                ChainUsageError::ContinuationReplayed {
                    signature: self.signature.to_string(),
                    depth: here,
                }
            })?;
            terminal(self.target.as_ref(), &mut self.args)
        }
    }

    /// 方法签名
    pub fn signature(&self) -> &MethodSignature {
        &self.signature
    }

    /// 当前状态
    pub fn state(&self) -> InvocationState {
        self.state
    }

    /// 目标实例（静态方法为 `None`）
    pub fn target(&self) -> Option<&TargetRef> {
        self.target.as_ref()
    }

    /// 参数数组
    pub fn args(&self) -> &[ArgValue] {
        &self.args
    }

    /// 可变参数数组，拦截器可以原地修改
    pub fn args_mut(&mut self) -> &mut Vec<ArgValue> {
        &mut self.args
    }

    /// 按类型取第 `index` 个参数
    pub fn arg<T: 'static>(&self, index: usize) -> Option<&T> {
        self.args.get(index)?.downcast_ref::<T>()
    }

    /// 替换第 `index` 个参数；索引越界时不做任何修改并返回 `false`
    pub fn set_arg(&mut self, index: usize, value: ArgValue) -> bool {
        match self.args.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// 链上剩余的拦截器数量（不含终端）
    pub fn remaining(&self) -> usize {
        self.interceptors.len().saturating_sub(self.depth)
    }
}

impl fmt::Debug for MethodInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodInvocation")
            .field("signature", &self.signature.to_string())
            .field("state", &self.state)
            .field("depth", &self.depth)
            .field("interceptors", &self.interceptors.len())
            .field("args", &self.args.len())
            .finish()
    }
}
