use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 单个事件名的分发统计
///
/// 不变式：`emit_count > 0` 时 `average_execution_time == total_execution_time / emit_count`；
/// `emit_count` 只计已结束的分发。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventStats {
    pub emit_count: u64,
    pub last_emitted_at: Option<DateTime<Utc>>,
    pub total_execution_time: Duration,
    pub average_execution_time: Duration,
    pub listener_count: usize,
}

impl EventStats {
    /// 分发开始：仅记录时间，计数在分发结束时与耗时一并累加
    pub(crate) fn record_emit(&mut self, at: DateTime<Utc>) {
        self.last_emitted_at = Some(at);
    }

    pub(crate) fn record_elapsed(&mut self, elapsed: Duration) {
        self.emit_count += 1;
        self.total_execution_time += elapsed;
        let divisor = u32::try_from(self.emit_count).unwrap_or(u32::MAX);
        self.average_execution_time = self.total_execution_time / divisor;
    }

    /// 清零计数与耗时，保留监听器数量
    pub(crate) fn reset(&mut self) {
        *self = EventStats {
            listener_count: self.listener_count,
            ..Default::default()
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_tracks_total_over_count() {
        let mut stats = EventStats::default();
        for ms in [4, 8, 12] {
            stats.record_emit(Utc::now());
            stats.record_elapsed(Duration::from_millis(ms));
        }
        assert_eq!(stats.emit_count, 3);
        assert_eq!(stats.total_execution_time, Duration::from_millis(24));
        assert_eq!(stats.average_execution_time, Duration::from_millis(8));
    }

    #[test]
    fn in_flight_dispatch_keeps_average_consistent() {
        let mut stats = EventStats::default();
        stats.record_emit(Utc::now());
        stats.record_elapsed(Duration::from_millis(10));

        // 第二次分发已开始但尚未结束
        stats.record_emit(Utc::now());
        assert_eq!(stats.emit_count, 1);
        assert_eq!(
            stats.average_execution_time,
            stats.total_execution_time / stats.emit_count as u32
        );
    }

    #[test]
    fn reset_keeps_listener_count() {
        let mut stats = EventStats {
            listener_count: 2,
            ..Default::default()
        };
        stats.record_emit(Utc::now());
        stats.record_elapsed(Duration::from_millis(1));
        stats.reset();
        assert_eq!(stats.emit_count, 0);
        assert_eq!(stats.listener_count, 2);
        assert!(stats.last_emitted_at.is_none());
    }
}
