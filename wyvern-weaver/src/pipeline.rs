//! 批量织入管线
//!
//! 变换是 CPU 密集的纯计算，批次内各类之间没有依赖，
//! 用 rayon 并行处理。单个类的失败不影响批次中的其他类，
//! 失败计入报告并以原字节透传。

use rayon::prelude::*;
use tracing::info;
use wyvern_aop::RuleSet;

use crate::manifest::WeaveManifest;
use crate::weave::{ClassInput, WeaveOptions, WeaveOutcome, Weaver, WovenClass};

/// 一个批次的处理统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WeaveReport {
    pub total: usize,
    pub transformed: usize,
    pub unchanged: usize,
    pub failed: usize,
    /// 被织入的方法总数
    pub methods: usize,
}

/// 批量织入的产物
#[derive(Debug)]
pub struct WeaveBatch {
    /// 与输入同序
    pub classes: Vec<WovenClass>,
    pub manifest: WeaveManifest,
    pub report: WeaveReport,
}

/// 批量织入管线
pub struct WeavePipeline {
    weaver: Weaver,
}

impl WeavePipeline {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            weaver: Weaver::new(rules),
        }
    }

    pub fn with_options(rules: RuleSet, options: WeaveOptions) -> Self {
        Self {
            weaver: Weaver::with_options(rules, options),
        }
    }

    /// 并行织入一个批次
    pub fn weave_all(&self, inputs: &[ClassInput]) -> WeaveBatch {
        let classes: Vec<WovenClass> = inputs
            .par_iter()
            .map(|input| self.weaver.weave(input))
            .collect();

        let mut manifest = WeaveManifest::new();
        let mut report = WeaveReport {
            total: classes.len(),
            ..WeaveReport::default()
        };
        for woven in &classes {
            match &woven.outcome {
                WeaveOutcome::Unchanged => report.unchanged += 1,
                WeaveOutcome::Transformed { methods } => {
                    report.transformed += 1;
                    report.methods += methods;
                }
                WeaveOutcome::Failed(_) => report.failed += 1,
            }
            manifest.extend(woven.bindings.iter().cloned());
        }

        info!(
            total = report.total,
            transformed = report.transformed,
            unchanged = report.unchanged,
            failed = report.failed,
            methods = report.methods,
            "weave batch complete"
        );
        WeaveBatch {
            classes,
            manifest,
            report,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wyvern_aop::{interceptor_fn, InterceptorRegistry, MethodMatcher, RuleSetBuilder};
    use wyvern_classfile::{flags, ClassFile, CodeBuilder};

    fn rules() -> RuleSet {
        let mut registry = InterceptorRegistry::new();
        registry.register("audit", interceptor_fn(|inv| inv.proceed()));
        RuleSetBuilder::new()
            .rule(MethodMatcher::Name("with*".to_string()), ["audit"])
            .freeze(&registry)
            .unwrap()
    }

    fn class_with(name: &str, method: &str) -> ClassInput {
        let mut class = ClassFile::new(name, "java/lang/Object", 52).unwrap();
        let mut body = CodeBuilder::new(1);
        body.return_void();
        class
            .add_method(method, "()V", flags::ACC_PUBLIC, Some(body.finish()))
            .unwrap();
        ClassInput::new(name.replace('/', "."), class.to_bytes())
    }

    #[test]
    fn test_batch_counts_and_manifest() {
        let inputs = vec![
            class_with("com/example/A", "withdraw"),
            class_with("com/example/B", "deposit"),
            class_with("com/example/C", "withhold"),
            ClassInput::new("com.example.Broken", vec![0x00, 0x01]),
        ];

        let batch = WeavePipeline::new(rules()).weave_all(&inputs);
        assert_eq!(batch.report.total, 4);
        assert_eq!(batch.report.transformed, 2);
        assert_eq!(batch.report.unchanged, 1);
        assert_eq!(batch.report.failed, 1);
        assert_eq!(batch.report.methods, 2);
        assert_eq!(batch.manifest.len(), 2);

        // 输出顺序与输入一致
        let names: Vec<&str> = batch.classes.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["com.example.A", "com.example.B", "com.example.C", "com.example.Broken"]
        );
    }

    #[test]
    fn test_failed_class_keeps_original_bytes() {
        let garbage = vec![0xca, 0xfe, 0xba, 0xbd];
        let inputs = vec![ClassInput::new("com.example.Bad", garbage.clone())];
        let batch = WeavePipeline::new(rules()).weave_all(&inputs);
        assert_eq!(batch.classes[0].bytes, garbage);
        assert!(matches!(batch.classes[0].outcome, WeaveOutcome::Failed(_)));
    }
}
