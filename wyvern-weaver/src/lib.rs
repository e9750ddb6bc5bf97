//! Wyvern Weaver - 字节码发现与改写管线
//!
//! 把冻结的规则集应用到一批编译后的类上：
//! - 解析每个类，为其直接声明的方法构建描述符并解析规则
//! - 命中的方法改名为合成实现，原签名位置生成派发包装方法
//! - 产出字节、链编号清单和批次报告；失败的类原字节透传
//!
//! 变换在 rayon 线程池中并行进行；重定义接收端是唯一的异步边界。

pub mod codegen;
pub mod config;
pub mod error;
pub mod logging;
pub mod manifest;
pub mod output;
pub mod pipeline;
pub mod weave;

// 重新导出核心类型
pub use config::{MatcherSpec, RuleSpec, WeaveConfig};
pub use error::WeaveError;
pub use logging::{init_logging, LogFormat, LogLevel, LoggingConfig};
pub use manifest::WeaveManifest;
pub use output::{apply_transformed, discover_class_files, AotWriter, RedefinitionSink};
pub use pipeline::{WeaveBatch, WeavePipeline, WeaveReport};
pub use weave::{ChainBinding, ClassInput, WeaveOptions, WeaveOutcome, Weaver, WovenClass};
