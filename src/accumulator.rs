//! Накопитель времени для вызывающего кода. Пул о нем ничего не знает:
//! задачи захватывают `&Accumulator` или `Arc<Accumulator>` сами.

use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};


#[derive(Debug, Default)]
pub struct Accumulator {
    count: AtomicU64,
    total: AtomicU64,
}

impl Accumulator {
    pub const fn new() -> Self {
        Self {
            count: AtomicU64::new(0),
            total: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn start(&self) -> Instant {
        Instant::now()
    }

    /// Добавляет один замер: время, прошедшее с `start`
    #[inline]
    pub fn stop(&self, start: Instant) {
        self.record(start.elapsed());
    }

    pub fn record(&self, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.total.fetch_add(nanos, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Сумма замеров в наносекундах
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> Option<Duration> {
        let count = self.count();
        if count == 0 {
            return None;
        }
        Some(Duration::from_nanos(self.total() / count))
    }
}

impl fmt::Display for Accumulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.count();
        if count == 0 {
            return write!(f, "N/A");
        }
        write!(f, "{} ({})", self.total() / count, count)
    }
}
