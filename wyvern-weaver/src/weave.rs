//! 单个类的织入变换
//!
//! 对每个被规则命中的方法：原方法体改名为合成实现方法，
//! 原签名位置生成调用运行时派发的包装方法，注解随包装方法
//! 迁移。未命中任何规则的类原字节透传；解析或校验失败的类
//! 同样透传原字节，失败被隔离在该类内部。

use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use wyvern_aop::RuleSet;
use wyvern_classfile::annotations::{
    RUNTIME_INVISIBLE_ANNOTATIONS, RUNTIME_INVISIBLE_PARAMETER_ANNOTATIONS,
    RUNTIME_VISIBLE_ANNOTATIONS, RUNTIME_VISIBLE_PARAMETER_ANNOTATIONS,
};
use wyvern_classfile::{flags, verify_class, ClassFile, ClassReader};

use crate::codegen::{generate_wrapper_code, DEFAULT_DISPATCH_CLASS};
use crate::error::WeaveError;

/// 合成实现方法的名称中缀，完整形式如 `withdraw$aop$0`
pub const IMPL_INFIX: &str = "$aop$";

/// 注解迁移涉及的属性
const ANNOTATION_ATTRIBUTES: [&str; 4] = [
    RUNTIME_VISIBLE_ANNOTATIONS,
    RUNTIME_INVISIBLE_ANNOTATIONS,
    RUNTIME_VISIBLE_PARAMETER_ANNOTATIONS,
    RUNTIME_INVISIBLE_PARAMETER_ANNOTATIONS,
];

/// 织入选项
#[derive(Debug, Clone)]
pub struct WeaveOptions {
    /// 派发桥接方法的宿主类（内部名）
    pub dispatch_class: String,
}

impl Default for WeaveOptions {
    fn default() -> Self {
        Self {
            dispatch_class: DEFAULT_DISPATCH_CLASS.to_string(),
        }
    }
}

/// 待织入的类：名称加原始字节
#[derive(Debug, Clone)]
pub struct ClassInput {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl ClassInput {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// 链编号与拦截点的绑定
///
/// 包装方法里烘焙的是编号而不是规则：运行时启动时按清单
/// 预构建链表，调用期查表派发，不做任何规则求值
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainBinding {
    pub chain_id: u32,
    /// 点分类名
    pub class_name: String,
    pub method_name: String,
    pub descriptor: String,
    /// 改名后的合成实现方法名
    pub impl_name: String,
    /// 按执行顺序排列的拦截器名称
    pub interceptors: Vec<String>,
}

/// 单个类的织入结果
#[derive(Debug)]
pub enum WeaveOutcome {
    /// 没有方法被命中，字节未变
    Unchanged,
    /// 织入成功
    Transformed { methods: usize },
    /// 解析或校验失败，原字节透传
    Failed(WeaveError),
}

/// 织入后的类
#[derive(Debug)]
pub struct WovenClass {
    pub name: String,
    /// 变换后的字节；Unchanged/Failed 时为原始字节
    pub bytes: Vec<u8>,
    pub outcome: WeaveOutcome,
    pub bindings: Vec<ChainBinding>,
}

/// 织入器
///
/// 持有冻结的规则集，可被多个工作线程共享；
/// 链编号在实例内单调分配
pub struct Weaver {
    rules: RuleSet,
    options: WeaveOptions,
    next_chain_id: AtomicU32,
}

impl Weaver {
    pub fn new(rules: RuleSet) -> Self {
        Self::with_options(rules, WeaveOptions::default())
    }

    pub fn with_options(rules: RuleSet, options: WeaveOptions) -> Self {
        Self {
            rules,
            options,
            next_chain_id: AtomicU32::new(0),
        }
    }

    /// 织入单个类
    ///
    /// 任何失败都不会向外传播：失败的类以原字节返回，
    /// 结果记录在 [`WeaveOutcome::Failed`] 中
    pub fn weave(&self, input: &ClassInput) -> WovenClass {
        let mut class = match ClassReader::parse(&input.bytes) {
            Ok(class) => class,
            Err(source) => {
                warn!(class = %input.name, error = %source, "malformed class, passing through");
                return WovenClass {
                    name: input.name.clone(),
                    bytes: input.bytes.clone(),
                    outcome: WeaveOutcome::Failed(WeaveError::Malformed {
                        class: input.name.clone(),
                        source,
                    }),
                    bindings: Vec::new(),
                };
            }
        };

        let bindings = match self.transform(&mut class) {
            Ok(bindings) => bindings,
            Err(error) => {
                warn!(class = %input.name, error = %error, "transform failed, passing through");
                return WovenClass {
                    name: input.name.clone(),
                    bytes: input.bytes.clone(),
                    outcome: WeaveOutcome::Failed(error),
                    bindings: Vec::new(),
                };
            }
        };

        if bindings.is_empty() {
            // 未命中的类逐字节保持原样
            return WovenClass {
                name: input.name.clone(),
                bytes: input.bytes.clone(),
                outcome: WeaveOutcome::Unchanged,
                bindings,
            };
        }

        let bytes = class.to_bytes();
        if let Err(source) = verify_class(&bytes) {
            warn!(class = %input.name, error = %source, "woven class failed verification, passing through");
            return WovenClass {
                name: input.name.clone(),
                bytes: input.bytes.clone(),
                outcome: WeaveOutcome::Failed(WeaveError::Verification {
                    class: input.name.clone(),
                    source,
                }),
                bindings: Vec::new(),
            };
        }

        info!(class = %input.name, methods = bindings.len(), "class woven");
        WovenClass {
            name: input.name.clone(),
            bytes,
            outcome: WeaveOutcome::Transformed {
                methods: bindings.len(),
            },
            bindings,
        }
    }

    fn transform(&self, class: &mut ClassFile) -> Result<Vec<ChainBinding>, WeaveError> {
        let descriptors = class.descriptors().map_err(|source| WeaveError::Malformed {
            class: class.binary_name(),
            source,
        })?;

        let mut bindings = Vec::new();
        let method_count = class.methods.len();
        for index in 0..method_count {
            let descriptor = &descriptors[index];
            // 构造器、静态初始化块和无方法体的方法不参与织入
            if descriptor.is_initializer()
                || descriptor.is_abstract()
                || descriptor.is_native()
                || !class.methods[index].has_code()
            {
                continue;
            }

            let interceptors = self.rules.resolve(descriptor);
            if interceptors.is_empty() {
                continue;
            }

            let chain_id = self.next_chain_id.fetch_add(1, Ordering::Relaxed);
            let impl_name = fresh_impl_name(class, descriptor.name());
            let rewrite_failed = |source| WeaveError::Rewrite {
                class: descriptor.class_name().to_string(),
                source,
            };
            let impl_name_index = class
                .constant_pool
                .add_utf8(&impl_name)
                .map_err(rewrite_failed)?;
            let code = generate_wrapper_code(
                &mut class.constant_pool,
                &self.options.dispatch_class,
                descriptor.parameters(),
                descriptor.return_type(),
                descriptor.is_static(),
                chain_id as i32,
            )
            .map_err(rewrite_failed)?;

            // 原方法改名为合成实现，注解摘下留给包装方法
            let original_access = class.methods[index].access_flags;
            let method = &mut class.methods[index];
            method.name = impl_name.clone();
            method.name_index = impl_name_index;
            method.access_flags |= flags::ACC_SYNTHETIC;
            let moved_annotations = method.take_attributes(&ANNOTATION_ATTRIBUTES);

            // 包装方法占据原签名；synchronized 不随包装方法保留，
            // 锁语义由改名后的实现方法承担
            let wrapper_access = original_access & !flags::ACC_SYNCHRONIZED;
            let wrapper = class
                .add_method(
                    descriptor.name(),
                    descriptor.descriptor(),
                    wrapper_access,
                    Some(code),
                )
                .map_err(|source| WeaveError::Rewrite {
                    class: descriptor.class_name().to_string(),
                    source,
                })?;
            wrapper.attributes.extend(moved_annotations);

            debug!(
                method = %descriptor.signature(),
                chain_id,
                impl_name = %impl_name,
                "method woven"
            );

            bindings.push(ChainBinding {
                chain_id,
                class_name: descriptor.class_name().to_string(),
                method_name: descriptor.name().to_string(),
                descriptor: descriptor.descriptor().to_string(),
                impl_name,
                interceptors: interceptors.iter().map(|name| name.to_string()).collect(),
            });
        }

        Ok(bindings)
    }
}

/// 选一个类中不存在的合成方法名
fn fresh_impl_name(class: &ClassFile, base: &str) -> String {
    let mut counter = 0u32;
    loop {
        let candidate = format!("{}{}{}", base, IMPL_INFIX, counter);
        if !class.has_method_named(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wyvern_aop::{interceptor_fn, InterceptorRegistry, MethodMatcher, RuleSetBuilder};
    use wyvern_classfile::CodeBuilder;

    fn rules(matcher: MethodMatcher) -> RuleSet {
        let mut registry = InterceptorRegistry::new();
        registry.register("audit", interceptor_fn(|inv| inv.proceed()));
        RuleSetBuilder::new()
            .rule(matcher, ["audit"])
            .freeze(&registry)
            .unwrap()
    }

    fn sample_class() -> Vec<u8> {
        let mut class = ClassFile::new("com/example/Account", "java/lang/Object", 52).unwrap();
        let mut body = CodeBuilder::new(3);
        body.return_void();
        class
            .add_method("withdraw", "(J)V", flags::ACC_PUBLIC, Some(body.finish()))
            .unwrap();
        let mut body = CodeBuilder::new(1);
        body.return_void();
        class
            .add_method("toString$helper", "()V", flags::ACC_PRIVATE, Some(body.finish()))
            .unwrap();
        class.to_bytes()
    }

    #[test]
    fn test_unmatched_class_is_byte_identical() {
        let weaver = Weaver::new(rules(MethodMatcher::Name("deposit".to_string())));
        let bytes = sample_class();
        let woven = weaver.weave(&ClassInput::new("com.example.Account", bytes.clone()));
        assert!(matches!(woven.outcome, WeaveOutcome::Unchanged));
        assert_eq!(woven.bytes, bytes);
        assert!(woven.bindings.is_empty());
    }

    #[test]
    fn test_matched_method_is_rewritten() {
        let weaver = Weaver::new(rules(MethodMatcher::Name("withdraw".to_string())));
        let woven = weaver.weave(&ClassInput::new("com.example.Account", sample_class()));
        assert!(matches!(woven.outcome, WeaveOutcome::Transformed { methods: 1 }));
        assert_eq!(woven.bindings.len(), 1);

        let reparsed = ClassReader::parse(&woven.bytes).unwrap();
        // 原方法改名为合成实现，包装方法占据原签名
        let implementation = reparsed
            .methods
            .iter()
            .find(|m| m.name == "withdraw$aop$0")
            .unwrap();
        assert_ne!(implementation.access_flags & flags::ACC_SYNTHETIC, 0);
        let wrapper = reparsed.methods.iter().find(|m| m.name == "withdraw").unwrap();
        assert_eq!(wrapper.descriptor, "(J)V");
        assert!(wrapper.has_code());

        let binding = &woven.bindings[0];
        assert_eq!(binding.class_name, "com.example.Account");
        assert_eq!(binding.method_name, "withdraw");
        assert_eq!(binding.impl_name, "withdraw$aop$0");
        assert_eq!(binding.interceptors, vec!["audit"]);
    }

    #[test]
    fn test_woven_class_verifies() {
        let weaver = Weaver::new(rules(MethodMatcher::All));
        let woven = weaver.weave(&ClassInput::new("com.example.Account", sample_class()));
        assert!(matches!(woven.outcome, WeaveOutcome::Transformed { .. }));
        verify_class(&woven.bytes).unwrap();
    }

    #[test]
    fn test_malformed_class_passes_through() {
        let weaver = Weaver::new(rules(MethodMatcher::All));
        let garbage = vec![0xde, 0xad, 0xbe, 0xef, 0x00];
        let woven = weaver.weave(&ClassInput::new("com.example.Broken", garbage.clone()));
        assert!(matches!(woven.outcome, WeaveOutcome::Failed(WeaveError::Malformed { .. })));
        assert_eq!(woven.bytes, garbage);
    }

    #[test]
    fn test_chain_ids_are_unique_across_classes() {
        let weaver = Weaver::new(rules(MethodMatcher::All));
        let first = weaver.weave(&ClassInput::new("com.example.Account", sample_class()));
        let second = weaver.weave(&ClassInput::new("com.example.Account", sample_class()));
        let mut ids: Vec<u32> = first
            .bindings
            .iter()
            .chain(second.bindings.iter())
            .map(|b| b.chain_id)
            .collect();
        let total = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), total);
    }

    #[test]
    fn test_reweaving_same_input_resolves_identically() {
        let weaver = Weaver::new(rules(MethodMatcher::All));
        let first = weaver.weave(&ClassInput::new("com.example.Account", sample_class()));
        let second = weaver.weave(&ClassInput::new("com.example.Account", sample_class()));
        assert!(matches!(second.outcome, WeaveOutcome::Transformed { .. }));

        // 除链号外，两次织入解析出的绑定应当完全一致
        assert_eq!(first.bindings.len(), second.bindings.len());
        for (a, b) in first.bindings.iter().zip(second.bindings.iter()) {
            assert_eq!(a.class_name, b.class_name);
            assert_eq!(a.method_name, b.method_name);
            assert_eq!(a.descriptor, b.descriptor);
            assert_eq!(a.impl_name, b.impl_name);
            assert_eq!(a.interceptors, b.interceptors);
        }
    }

    #[test]
    fn test_synchronized_stays_on_implementation() {
        let mut class = ClassFile::new("com/example/Locked", "java/lang/Object", 52).unwrap();
        let mut body = CodeBuilder::new(1);
        body.return_void();
        class
            .add_method(
                "update",
                "()V",
                flags::ACC_PUBLIC | flags::ACC_SYNCHRONIZED,
                Some(body.finish()),
            )
            .unwrap();

        let weaver = Weaver::new(rules(MethodMatcher::All));
        let woven = weaver.weave(&ClassInput::new("com.example.Locked", class.to_bytes()));
        let reparsed = ClassReader::parse(&woven.bytes).unwrap();
        let wrapper = reparsed.methods.iter().find(|m| m.name == "update").unwrap();
        assert_eq!(wrapper.access_flags & flags::ACC_SYNCHRONIZED, 0);
        let implementation = reparsed
            .methods
            .iter()
            .find(|m| m.name == "update$aop$0")
            .unwrap();
        assert_ne!(implementation.access_flags & flags::ACC_SYNCHRONIZED, 0);
    }

    #[test]
    fn test_initializers_are_skipped() {
        let mut class = ClassFile::new("com/example/Ctor", "java/lang/Object", 52).unwrap();
        let mut body = CodeBuilder::new(1);
        body.return_void();
        class
            .add_method("<init>", "()V", flags::ACC_PUBLIC, Some(body.finish()))
            .unwrap();

        let weaver = Weaver::new(rules(MethodMatcher::All));
        let woven = weaver.weave(&ClassInput::new("com.example.Ctor", class.to_bytes()));
        assert!(matches!(woven.outcome, WeaveOutcome::Unchanged));
    }
}
