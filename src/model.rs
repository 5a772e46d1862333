/// Снимок счетчиков пула
#[derive(Debug, Clone)]
pub struct PoolMetrics {
    pub workers: usize,
    pub live_workers: usize,
    pub queued_tasks: usize,
    pub active_tasks: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    pub rejected_tasks: usize,
}

impl PoolMetrics {
    pub fn utilization(&self) -> f64 {
        if self.live_workers == 0 {
            return 0.0;
        }
        self.active_tasks as f64 / self.live_workers as f64
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.completed_tasks + self.failed_tasks;
        if total == 0 {
            return 1.0;
        }
        self.completed_tasks as f64 / total as f64
    }
}


/// Что делать воркеру, если задача запаниковала
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanicPolicy {
    /// Поймать панику, залогировать и продолжить цикл
    #[default]
    Contain,
    /// Дать панике завершить поток воркера
    Propagate,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(active: usize, live: usize, completed: usize, failed: usize) -> PoolMetrics {
        PoolMetrics {
            workers: live,
            live_workers: live,
            queued_tasks: 0,
            active_tasks: active,
            completed_tasks: completed,
            failed_tasks: failed,
            rejected_tasks: 0,
        }
    }

    #[test]
    fn utilization_without_workers_is_zero() {
        assert_eq!(snapshot(0, 0, 0, 0).utilization(), 0.0);
        assert_eq!(snapshot(2, 4, 0, 0).utilization(), 0.5);
    }

    #[test]
    fn success_rate_counts_failures() {
        assert_eq!(snapshot(0, 1, 0, 0).success_rate(), 1.0);
        assert_eq!(snapshot(0, 1, 3, 1).success_rate(), 0.75);
    }
}
