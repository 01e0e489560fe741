//! 持久化钩子
//!
//! 钩子收到的是已编码（可能已压缩/加密）的记录。
//!
use super::record::EventRecord;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// 每次成功追加后调用
pub trait EventPersister: Send + Sync {
    fn persist(&self, record: &EventRecord) -> anyhow::Result<()>;
}

/// 以 JSON Lines 追加写入 `<dir>/events.jsonl`
#[derive(Debug, Clone)]
pub struct JsonlPersister {
    path: PathBuf,
}

impl JsonlPersister {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join("events.jsonl"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventPersister for JsonlPersister {
    fn persist(&self, record: &EventRecord) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let line = serde_json::to_string(record)?;
        writeln!(file, "{line}")?;
        file.sync_all()?;
        Ok(())
    }
}
