//! 端到端：JSON 规则配置 -> 批量织入 -> 清单 -> 链执行

use std::sync::{Arc, Mutex};

use wyvern_aop::{interceptor_fn, ArgValue, InterceptorRegistry};
use wyvern_classfile::annotations::RUNTIME_VISIBLE_ANNOTATIONS;
use wyvern_classfile::bytes::ByteWriter;
use wyvern_classfile::{flags, ClassFile, ClassReader, CodeBuilder};
use wyvern_weaver::{ClassInput, WeaveConfig, WeavePipeline};

/// 构造带 `@com.example.Audited` 注解方法的测试类
fn annotated_class() -> Vec<u8> {
    let mut class =
        ClassFile::new("com/example/AccountService", "java/lang/Object", 52).unwrap();

    let mut body = CodeBuilder::new(4);
    body.aconst_null();
    body.areturn();
    class
        .add_method(
            "withdraw",
            "(JLjava/lang/String;)Ljava/lang/String;",
            flags::ACC_PUBLIC,
            Some(body.finish()),
        )
        .unwrap();

    let type_index = class.constant_pool.add_utf8("Lcom/example/Audited;").unwrap();
    let attr_name_index = class
        .constant_pool
        .add_utf8(RUNTIME_VISIBLE_ANNOTATIONS)
        .unwrap();
    let mut w = ByteWriter::new();
    w.u16(1); // num_annotations
    w.u16(type_index);
    w.u16(0); // num_element_value_pairs
    let info = w.into_bytes();
    class
        .methods
        .last_mut()
        .unwrap()
        .attributes
        .push(wyvern_classfile::Attribute {
            name_index: attr_name_index,
            name: RUNTIME_VISIBLE_ANNOTATIONS.to_string(),
            info,
        });

    let mut body = CodeBuilder::new(1);
    body.return_void();
    class
        .add_method("report", "()V", flags::ACC_PUBLIC, Some(body.finish()))
        .unwrap();

    class.to_bytes()
}

fn registry(order: Arc<Mutex<Vec<&'static str>>>) -> InterceptorRegistry {
    let mut registry = InterceptorRegistry::new();
    let audit_order = Arc::clone(&order);
    registry.register(
        "audit",
        interceptor_fn(move |inv| {
            audit_order.lock().unwrap().push("audit");
            inv.proceed()
        }),
    );
    let log_order = Arc::clone(&order);
    registry.register(
        "log",
        interceptor_fn(move |inv| {
            log_order.lock().unwrap().push("log");
            inv.proceed()
        }),
    );
    registry
}

const CONFIG: &str = r#"{
    "rules": [
        {
            "matcher": { "kind": "annotation", "name": "com.example.Audited" },
            "interceptors": ["audit", "log"]
        },
        {
            "matcher": { "kind": "name", "pattern": "report" },
            "interceptors": ["log"]
        }
    ]
}"#;

#[test]
fn test_config_to_woven_class_to_chain() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let registry = registry(Arc::clone(&order));
    let rules = WeaveConfig::from_json(CONFIG).unwrap().build(&registry).unwrap();

    let inputs = vec![ClassInput::new("com.example.AccountService", annotated_class())];
    let batch = WeavePipeline::new(rules).weave_all(&inputs);

    assert_eq!(batch.report.transformed, 1);
    assert_eq!(batch.report.methods, 2);
    assert_eq!(batch.manifest.len(), 2);

    // 注解随包装方法迁移，合成实现不再携带
    let woven = ClassReader::parse(&batch.classes[0].bytes).unwrap();
    let wrapper = woven.methods.iter().find(|m| m.name == "withdraw").unwrap();
    assert!(wrapper.attribute(RUNTIME_VISIBLE_ANNOTATIONS).is_some());
    assert!(wrapper.has_code());
    let implementation = woven
        .methods
        .iter()
        .find(|m| m.name == "withdraw$aop$0")
        .unwrap();
    assert!(implementation.attribute(RUNTIME_VISIBLE_ANNOTATIONS).is_none());
    assert_ne!(implementation.access_flags & flags::ACC_SYNTHETIC, 0);

    // 清单经 JSON 往返后仍可重建链表
    let manifest =
        wyvern_weaver::WeaveManifest::from_json(&batch.manifest.to_json()).unwrap();
    let table = manifest.chain_table(&registry).unwrap();

    let binding = manifest
        .iter()
        .find(|b| b.method_name == "withdraw")
        .unwrap();
    assert_eq!(binding.interceptors, vec!["audit", "log"]);
    assert_eq!(binding.impl_name, "withdraw$aop$0");

    // 按清单派发一次调用：拦截器按声明顺序执行，终端结果原样返回
    let chain = &table[&binding.chain_id];
    let args: Vec<ArgValue> = vec![Box::new(250i64), Box::new("acct-7".to_string())];
    let result = chain
        .invoke(
            None,
            args,
            Box::new(|_, args| {
                let amount = args[0].downcast_ref::<i64>().copied().unwrap_or_default();
                Ok(Some(Box::new(format!("withdrew {}", amount))))
            }),
        )
        .unwrap();
    let text = result.unwrap().downcast::<String>().unwrap();
    assert_eq!(*text, "withdrew 250");
    assert_eq!(*order.lock().unwrap(), vec!["audit", "log"]);
}

#[test]
fn test_report_method_gets_single_interceptor_chain() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let registry = registry(Arc::clone(&order));
    let rules = WeaveConfig::from_json(CONFIG).unwrap().build(&registry).unwrap();

    let inputs = vec![ClassInput::new("com.example.AccountService", annotated_class())];
    let batch = WeavePipeline::new(rules).weave_all(&inputs);

    let binding = batch
        .manifest
        .iter()
        .find(|b| b.method_name == "report")
        .unwrap();
    assert_eq!(binding.interceptors, vec!["log"]);
    assert_eq!(binding.descriptor, "()V");
}
