//! 拦截规则集
//!
//! 有序的（匹配器 -> 拦截器引用）规则序列。解析一个方法描述符
//! 会得到所有命中规则的拦截器引用按规则声明顺序的拼接，
//! 重复引用不去重（被两条规则引用的拦截器会执行两次）。
//!
//! 采用 builder/frozen 两段式：[`RuleSetBuilder`] 可变地累积规则，
//! [`RuleSetBuilder::freeze`] 校验全部拦截器名称并产出不可变的
//! [`RuleSet`]，之后可被多个发现工作线程无锁共享。

use std::sync::Arc;

use tracing::debug;
use wyvern_classfile::MethodDescriptor;

use crate::chain::InterceptorChain;
use crate::error::ConfigError;
use crate::interceptor::MethodInterceptor;
use crate::invocation::MethodSignature;
use crate::matcher::MethodMatcher;
use crate::registry::InterceptorRegistry;

/// 一条拦截规则：匹配器加上按声明顺序排列的拦截器名称
#[derive(Debug, Clone)]
pub struct InterceptionRule {
    pub matcher: MethodMatcher,
    pub interceptors: Vec<Arc<str>>,
    /// 是否也选取 synthetic/bridge 方法；默认不选取
    pub match_synthetic: bool,
}

impl InterceptionRule {
    pub fn new(
        matcher: MethodMatcher,
        interceptors: impl IntoIterator<Item = impl Into<Arc<str>>>,
    ) -> Self {
        Self {
            matcher,
            interceptors: interceptors.into_iter().map(Into::into).collect(),
            match_synthetic: false,
        }
    }

    pub fn with_synthetic(mut self) -> Self {
        self.match_synthetic = true;
        self
    }
}

/// 冻结后的规则：拦截器引用已解析为实例
struct CompiledRule {
    matcher: MethodMatcher,
    interceptors: Vec<(Arc<str>, Arc<dyn MethodInterceptor>)>,
    match_synthetic: bool,
}

/// 规则集构建器
#[derive(Default)]
pub struct RuleSetBuilder {
    rules: Vec<InterceptionRule>,
}

impl RuleSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条规则（链式调用）
    pub fn rule(
        mut self,
        matcher: MethodMatcher,
        interceptors: impl IntoIterator<Item = impl Into<Arc<str>>>,
    ) -> Self {
        self.rules.push(InterceptionRule::new(matcher, interceptors));
        self
    }

    /// 追加一条已构建的规则
    pub fn add(&mut self, rule: InterceptionRule) -> &mut Self {
        self.rules.push(rule);
        self
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 校验并冻结规则集
    ///
    /// 引用未注册拦截器的规则在这里失败——在任何扫描开始之前，
    /// 而不是调用时才暴露
    pub fn freeze(self, registry: &InterceptorRegistry) -> Result<RuleSet, ConfigError> {
        let mut compiled = Vec::with_capacity(self.rules.len());
        for (index, rule) in self.rules.into_iter().enumerate() {
            if rule.interceptors.is_empty() {
                return Err(ConfigError::EmptyRule { rule: index });
            }
            let mut interceptors = Vec::with_capacity(rule.interceptors.len());
            for name in rule.interceptors {
                let interceptor = registry.get(&name).ok_or_else(|| {
                    ConfigError::UnknownInterceptor {
                        rule: index,
                        name: name.to_string(),
                    }
                })?;
                interceptors.push((name, Arc::clone(interceptor)));
            }
            compiled.push(CompiledRule {
                matcher: rule.matcher,
                interceptors,
                match_synthetic: rule.match_synthetic,
            });
        }

        debug!(rules = compiled.len(), "rule set frozen");
        Ok(RuleSet {
            rules: Arc::new(compiled),
        })
    }
}

/// 冻结的规则集
///
/// 只读且可廉价克隆，发现工作线程之间直接共享；
/// 冻结之后不存在任何修改入口
#[derive(Clone)]
pub struct RuleSet {
    rules: Arc<Vec<CompiledRule>>,
}

impl RuleSet {
    /// 解析一个方法描述符，返回按规则声明顺序拼接的拦截器名称
    ///
    /// 可能为空；重复引用保留。synthetic/bridge 方法只被显式
    /// 选择加入的规则命中
    pub fn resolve(&self, descriptor: &MethodDescriptor) -> Vec<Arc<str>> {
        self.matching_rules(descriptor)
            .flat_map(|rule| rule.interceptors.iter().map(|(name, _)| Arc::clone(name)))
            .collect()
    }

    /// 解析并物化为可执行的链；没有规则命中时返回 `None`
    pub fn resolve_chain(&self, descriptor: &MethodDescriptor) -> Option<InterceptorChain> {
        let interceptors: Vec<_> = self
            .matching_rules(descriptor)
            .flat_map(|rule| {
                rule.interceptors
                    .iter()
                    .map(|(name, interceptor)| (Arc::clone(name), Arc::clone(interceptor)))
            })
            .collect();

        if interceptors.is_empty() {
            return None;
        }

        let signature = MethodSignature::new(
            descriptor.class_name(),
            descriptor.name(),
            descriptor.descriptor(),
        );
        Some(InterceptorChain::new(signature, interceptors))
    }

    fn matching_rules<'a>(
        &'a self,
        descriptor: &'a MethodDescriptor,
    ) -> impl Iterator<Item = &'a CompiledRule> {
        let hidden = descriptor.is_synthetic() || descriptor.is_bridge();
        self.rules.iter().filter(move |rule| {
            if hidden && !rule.match_synthetic {
                return false;
            }
            rule.matcher.matches(descriptor)
        })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl std::fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut list = f.debug_list();
        for rule in self.rules.iter() {
            list.entry(&format_args!(
                "{:?} -> {:?}",
                rule.matcher,
                rule.interceptors.iter().map(|(n, _)| n.as_ref()).collect::<Vec<_>>()
            ));
        }
        list.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptor::interceptor_fn;
    use wyvern_classfile::flags;

    fn registry() -> InterceptorRegistry {
        let mut registry = InterceptorRegistry::new();
        registry.register("log", interceptor_fn(|inv| inv.proceed()));
        registry.register("audit", interceptor_fn(|inv| inv.proceed()));
        registry.register("metrics", interceptor_fn(|inv| inv.proceed()));
        registry
    }

    fn descriptor(name: &str, annotations: &[&str], access: u16) -> MethodDescriptor {
        let annotations = annotations
            .iter()
            .map(|type_name| wyvern_classfile::Annotation {
                type_name: type_name.to_string(),
                values: Default::default(),
            })
            .collect();
        MethodDescriptor::new(
            "com.example.AccountService".to_string(),
            name.to_string(),
            "()V".to_string(),
            access,
            annotations,
        )
        .unwrap()
    }

    fn names(resolved: &[Arc<str>]) -> Vec<&str> {
        resolved.iter().map(|n| n.as_ref()).collect()
    }

    #[test]
    fn test_resolve_order_and_duplicates() {
        // [(matchAll, ["log"]), (annotated(X), ["audit"])]
        let rules = RuleSetBuilder::new()
            .rule(MethodMatcher::All, ["log"])
            .rule(MethodMatcher::Annotation("com.example.X".to_string()), ["audit"])
            .rule(MethodMatcher::Name("with*".to_string()), ["log"])
            .freeze(&registry())
            .unwrap();

        let annotated = descriptor("withdraw", &["com.example.X"], flags::ACC_PUBLIC);
        // 规则声明顺序拼接，log 出现两次（不去重）
        assert_eq!(names(&rules.resolve(&annotated)), vec!["log", "audit", "log"]);

        let plain = descriptor("deposit", &[], flags::ACC_PUBLIC);
        assert_eq!(names(&rules.resolve(&plain)), vec!["log"]);
    }

    #[test]
    fn test_unknown_interceptor_fails_at_freeze() {
        let result = RuleSetBuilder::new()
            .rule(MethodMatcher::All, ["log", "nonexistent"])
            .freeze(&registry());
        match result {
            Err(ConfigError::UnknownInterceptor { rule, name }) => {
                assert_eq!(rule, 0);
                assert_eq!(name, "nonexistent");
            }
            other => panic!("expected UnknownInterceptor, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_empty_rule_fails_at_freeze() {
        let result = RuleSetBuilder::new()
            .rule(MethodMatcher::All, Vec::<&str>::new())
            .freeze(&registry());
        assert!(matches!(result, Err(ConfigError::EmptyRule { rule: 0 })));
    }

    #[test]
    fn test_synthetic_methods_skipped_by_default() {
        let rules = RuleSetBuilder::new()
            .rule(MethodMatcher::All, ["log"])
            .freeze(&registry())
            .unwrap();

        let synthetic = descriptor("access$000", &[], flags::ACC_SYNTHETIC);
        let bridge = descriptor("compareTo", &[], flags::ACC_PUBLIC | flags::ACC_BRIDGE);
        assert!(rules.resolve(&synthetic).is_empty());
        assert!(rules.resolve(&bridge).is_empty());

        let mut builder = RuleSetBuilder::new();
        builder.add(InterceptionRule::new(MethodMatcher::All, ["log"]).with_synthetic());
        let opted_in = builder.freeze(&registry()).unwrap();
        assert_eq!(names(&opted_in.resolve(&synthetic)), vec!["log"]);
    }

    #[test]
    fn test_resolve_chain_materializes_in_order() {
        let rules = RuleSetBuilder::new()
            .rule(MethodMatcher::All, ["log", "metrics"])
            .rule(MethodMatcher::Name("with*".to_string()), ["audit"])
            .freeze(&registry())
            .unwrap();

        let d = descriptor("withdraw", &[], flags::ACC_PUBLIC);
        let chain = rules.resolve_chain(&d).unwrap();
        assert_eq!(
            chain.interceptor_names().collect::<Vec<_>>(),
            vec!["log", "metrics", "audit"]
        );
        assert_eq!(chain.signature().method_name, "withdraw");

        let nothing = descriptor("toString", &[], flags::ACC_PUBLIC);
        let none = RuleSetBuilder::new()
            .rule(MethodMatcher::Name("equals".to_string()), ["log"])
            .freeze(&registry())
            .unwrap()
            .resolve_chain(&nothing);
        assert!(none.is_none());
    }

    #[test]
    fn test_frozen_rule_set_is_shareable() {
        let rules = RuleSetBuilder::new()
            .rule(MethodMatcher::All, ["log"])
            .freeze(&registry())
            .unwrap();

        let d = descriptor("withdraw", &[], flags::ACC_PUBLIC);
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let rules = rules.clone();
                let d = d.clone();
                std::thread::spawn(move || rules.resolve(&d).len())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 1);
        }
    }
}
