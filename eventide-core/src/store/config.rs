use bon::Builder;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 事件存储配置
///
/// ```rust
/// use eventide_core::store::StoreConfig;
///
/// let config = StoreConfig::builder()
///     .max_events(500)
///     .enable_compression(true)
///     .build();
/// assert_eq!(config.snapshot_interval, 1_000);
/// ```
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// 内存日志容量，超出后按 FIFO 淘汰最旧记录
    #[builder(default = 10_000)]
    pub max_events: usize,
    #[builder(default = true)]
    pub enable_snapshots: bool,
    /// 每追加多少条记录自动快照一次
    #[builder(default = 1_000)]
    pub snapshot_interval: u64,
    #[builder(default)]
    pub enable_compression: bool,
    /// 仅在同时配置了 `encryption_key`（或自定义 cipher）时生效
    #[builder(default)]
    pub enable_encryption: bool,
    #[builder(into)]
    pub encryption_key: Option<String>,
    #[builder(default)]
    pub persist_to_disk: bool,
    #[builder(default = PathBuf::from("./data/events"), into)]
    pub storage_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_events: 10_000,
            enable_snapshots: true,
            snapshot_interval: 1_000,
            enable_compression: false,
            enable_encryption: false,
            encryption_key: None,
            persist_to_disk: false,
            storage_dir: PathBuf::from("./data/events"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_and_serde_share_defaults() {
        let built = StoreConfig::builder().build();
        let parsed: StoreConfig = serde_json::from_str(r#"{"max_events": 3}"#).unwrap();

        assert_eq!(built.max_events, 10_000);
        assert_eq!(parsed.max_events, 3);
        assert_eq!(parsed.storage_dir, built.storage_dir);
        assert!(parsed.enable_snapshots && built.enable_snapshots);
        assert!(parsed.encryption_key.is_none());
    }
}
