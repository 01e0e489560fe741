use bon::Builder;
use serde::{Deserialize, Serialize};

/// 分发器配置（仅构造期生效）
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// 单事件监听器数量的软上限：超出仅告警，不拒绝注册
    #[builder(default = 100)]
    pub max_listeners: usize,
    /// 是否维护 `EventStats`
    #[builder(default = true)]
    pub enable_stats: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_listeners: 100,
            enable_stats: true,
        }
    }
}
