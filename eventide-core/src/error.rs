//! 事件子系统统一错误定义
//!
//! 分为两组：
//! - `EventError`：分发（emit / emit_async / wait_for）与类型化门面的错误；
//! - `StoreError`：事件存储（编码、持久化、导入导出）的错误。
//!
//! 注册/移除类接口均为全函数，不产生错误。
//!
use std::time::Duration;

use thiserror::Error;

/// 分发错误
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum EventError {
    /// 监听器执行失败且未被 `"error"` 通道接管
    #[error("listener failed: event={event}, listener={listener}, reason={source}")]
    Listener {
        event: String,
        listener: u64,
        #[source]
        source: anyhow::Error,
    },

    /// 发出 `"error"` 事件但没有任何 `"error"` 监听器
    #[error("unhandled error event: {message}")]
    Unhandled { message: String },

    /// `wait_for` 超时
    #[error("timed out waiting for event `{event}` after {timeout:?}")]
    Timeout { event: String, timeout: Duration },

    /// 等待中的一次性监听器在触发前被移除
    #[error("listener for event `{event}` was removed before it fired")]
    Cancelled { event: String },

    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },

    /// 类型化门面无法将参数还原为事件类型
    #[error("decode failed: event={event}, reason={reason}")]
    Decode { event: String, reason: String },
}

/// 分发 Result 类型别名
pub type EventResult<T> = Result<T, EventError>;

/// 事件存储错误
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// 压缩/加密编码失败（写入路径）
    #[error("transform failed: stage={stage}, reason={reason}")]
    Transform { stage: &'static str, reason: String },

    /// 持久化钩子失败；记录已追加到内存日志
    #[error("persist failed: id={id}, reason={source}")]
    Persist {
        id: String,
        #[source]
        source: anyhow::Error,
    },

    /// 整体导入数据无法解析（单行失败不会产生该错误）
    #[error("import failed: format={format}, reason={reason}")]
    Import { format: &'static str, reason: String },
}

/// 存储 Result 类型别名
pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub fn transform(stage: &'static str, reason: impl Into<String>) -> Self {
        StoreError::Transform {
            stage,
            reason: reason.into(),
        }
    }
}
