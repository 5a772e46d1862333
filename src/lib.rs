//! Пул потоков фиксированного размера с общей FIFO очередью
//!
//! # Features
//! - N долгоживущих воркеров, один мьютекс + condvar на очередь
//! - Двухфазное завершение: `stop()` (не блокирует), затем `join()`
//! - Задачи, поставленные до `stop()`, всегда выполняются (drain)
//! - Паники задач перехватываются или пробрасываются по `PanicPolicy`
//! - Результаты задач через `JoinHandle` (blocking или `.await`)
//! - Метрики пула

pub mod accumulator;
pub mod errors;
pub mod handle;
pub mod model;
pub mod pool;
pub mod result;

pub use accumulator::Accumulator;
pub use errors::{PoolError, SpawnError};
pub use handle::{join_handles, JoinHandle, Task};
pub use model::{PanicPolicy, PoolMetrics};
pub use pool::{Config, ThreadPool};
pub use result::SpawnResult;
