use bon::Builder;
use serde::{Deserialize, Serialize};

/// 中间件管线配置
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// 是否记录每个中间件的调用次数与耗时
    #[builder(default = true)]
    pub enable_stats: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { enable_stats: true }
    }
}
