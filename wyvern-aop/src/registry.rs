//! 拦截器注册表
//!
//! 显式传递的 `名称 -> 拦截器` 查找表：启动时构建一次，
//! 随后只读地穿过规则集冻结与链构建。没有全局静态注册表，
//! 拦截器在任何解析发生之前注册完毕，链可能执行期间不允许移除。

use std::collections::HashMap;
use std::sync::Arc;

use crate::interceptor::MethodInterceptor;

/// 拦截器注册表
#[derive(Default)]
pub struct InterceptorRegistry {
    interceptors: HashMap<Arc<str>, Arc<dyn MethodInterceptor>>,
}

impl InterceptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按名称注册拦截器
    ///
    /// 重复注册同名拦截器会替换旧条目；注册发生在任何解析之前，
    /// 不会有已构建的链引用被替换的条目
    pub fn register(
        &mut self,
        name: impl Into<Arc<str>>,
        interceptor: Arc<dyn MethodInterceptor>,
    ) -> &mut Self {
        let name = name.into();
        if self.interceptors.contains_key(&name) {
            tracing::warn!(interceptor = %name, "replacing previously registered interceptor");
        } else {
            tracing::debug!(interceptor = %name, "registering interceptor");
        }
        self.interceptors.insert(name, interceptor);
        self
    }

    /// 按名称查找
    pub fn get(&self, name: &str) -> Option<&Arc<dyn MethodInterceptor>> {
        self.interceptors.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.interceptors.contains_key(name)
    }

    /// 已注册的名称（无序）
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.interceptors.keys().map(|name| name.as_ref())
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }
}

impl std::fmt::Debug for InterceptorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorRegistry")
            .field("names", &self.names().collect::<Vec<_>>())
            .finish()
    }
}
