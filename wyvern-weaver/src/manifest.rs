//! 织入清单
//!
//! 清单把变换期分配的链编号和各拦截点的拦截器序列固化下来，
//! 与织入产物一起交付。运行时启动时据此一次性预构建全部链，
//! 之后派发只做查表，调用路径上没有规则求值。

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use wyvern_aop::{InterceptorChain, InterceptorRegistry, MethodSignature};

use crate::error::WeaveError;
use crate::weave::ChainBinding;

/// 织入清单：链编号到绑定的有序映射
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeaveManifest {
    bindings: BTreeMap<u32, ChainBinding>,
}

impl WeaveManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一个绑定；同编号的旧绑定被替换
    pub fn insert(&mut self, binding: ChainBinding) {
        self.bindings.insert(binding.chain_id, binding);
    }

    pub fn extend(&mut self, bindings: impl IntoIterator<Item = ChainBinding>) {
        for binding in bindings {
            self.insert(binding);
        }
    }

    pub fn get(&self, chain_id: u32) -> Option<&ChainBinding> {
        self.bindings.get(&chain_id)
    }

    /// 按链编号升序遍历
    pub fn iter(&self) -> impl Iterator<Item = &ChainBinding> {
        self.bindings.values()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn to_json(&self) -> String {
        // BTreeMap 序列化总是成功
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    pub fn from_json(text: &str) -> Result<Self, WeaveError> {
        serde_json::from_str(text).map_err(|e| WeaveError::ManifestParse {
            reason: e.to_string(),
        })
    }

    /// 按清单预构建全部链
    ///
    /// 引用了未注册拦截器的绑定让整个构建失败：
    /// 带着缺链的表启动只会把错误推迟到第一次派发
    pub fn chain_table(
        &self,
        registry: &InterceptorRegistry,
    ) -> Result<HashMap<u32, InterceptorChain>, WeaveError> {
        let mut table = HashMap::with_capacity(self.bindings.len());
        for binding in self.bindings.values() {
            let mut interceptors = Vec::with_capacity(binding.interceptors.len());
            for name in &binding.interceptors {
                let interceptor =
                    registry
                        .get(name)
                        .ok_or_else(|| WeaveError::UnboundInterceptor {
                            chain_id: binding.chain_id,
                            name: name.clone(),
                        })?;
                interceptors.push((Arc::<str>::from(name.as_str()), Arc::clone(interceptor)));
            }
            let signature = MethodSignature::new(
                &binding.class_name,
                &binding.method_name,
                &binding.descriptor,
            );
            table.insert(binding.chain_id, InterceptorChain::new(signature, interceptors));
        }
        debug!(chains = table.len(), "chain table built");
        Ok(table)
    }
}
