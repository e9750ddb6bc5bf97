//! 织入产物的出口
//!
//! 两种交付方式：
//! - AOT：把织入后的字节和清单写回磁盘（构建期织入）
//! - 重定义：把变换后的类逐个推给异步的重定义接收端
//!   （附加到运行中的进程时由宿主提供实现）
//!
//! 发现与变换本身是同步的；异步边界只存在于接收端。

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::WeaveError;
use crate::pipeline::WeaveBatch;
use crate::weave::{ClassInput, WeaveOutcome};

/// 类重定义接收端
///
/// 每次 `apply` 对应一个完整的类文件；实现负责自己的
/// 原子性与重试，织入侧不做部分提交
#[async_trait]
pub trait RedefinitionSink: Send + Sync {
    async fn apply(&self, class_name: &str, bytes: &[u8]) -> anyhow::Result<()>;
}

/// 把批次中被改写的类推给接收端，返回推送数量
///
/// 未变化和失败的类不推送；接收端的错误中止推送并原样传播
pub async fn apply_transformed(
    batch: &WeaveBatch,
    sink: &dyn RedefinitionSink,
) -> anyhow::Result<usize> {
    let mut applied = 0;
    for woven in &batch.classes {
        if let WeaveOutcome::Transformed { .. } = woven.outcome {
            sink.apply(&woven.name, &woven.bytes).await?;
            applied += 1;
        }
    }
    debug!(applied, "transformed classes applied to sink");
    Ok(applied)
}

/// 清单在输出目录中的文件名
pub const MANIFEST_FILE: &str = "weave-manifest.json";

/// AOT 输出：把织入产物写回目录树
pub struct AotWriter {
    out_dir: PathBuf,
}

impl AotWriter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    /// 写出整个批次：全部类文件（含透传的）加清单
    pub fn write_batch(&self, batch: &WeaveBatch) -> Result<(), WeaveError> {
        for woven in &batch.classes {
            let relative = format!("{}.class", woven.name.replace('.', "/"));
            let path = self.out_dir.join(relative);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|source| WeaveError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            fs::write(&path, &woven.bytes).map_err(|source| WeaveError::Io {
                path: path.clone(),
                source,
            })?;
        }

        let manifest_path = self.out_dir.join(MANIFEST_FILE);
        fs::write(&manifest_path, batch.manifest.to_json()).map_err(|source| WeaveError::Io {
            path: manifest_path,
            source,
        })?;

        info!(
            classes = batch.classes.len(),
            out_dir = %self.out_dir.display(),
            "weave batch written"
        );
        Ok(())
    }
}

/// 递归发现目录下的全部 class 文件
///
/// 类名由相对路径推导（`com/example/Account.class` ->
/// `com.example.Account`），返回顺序按路径稳定排序
pub fn discover_class_files(root: &Path) -> Result<Vec<ClassInput>, WeaveError> {
    let mut inputs = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|source| WeaveError::Io {
            path: root.to_path_buf(),
            source: source.into(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("class") {
            continue;
        }

        let relative = path.strip_prefix(root).unwrap_or(path);
        let name = relative
            .with_extension("")
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(".");
        let bytes = fs::read(path).map_err(|source| WeaveError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        inputs.push(ClassInput::new(name, bytes));
    }
    debug!(count = inputs.len(), root = %root.display(), "class files discovered");
    Ok(inputs)
}
