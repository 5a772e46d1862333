use super::{
    errors::{PoolError, SpawnError},
    handle::{JoinHandle, Task},
    model::{PanicPolicy, PoolMetrics},
    result::SpawnResult,
};
use std::{
    any::Any,
    cell::Cell,
    collections::VecDeque,
    io,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Condvar, Mutex, MutexGuard, PoisonError,
    },
    thread,
};
use crossbeam::utils::CachePadded;
use tokio::sync::oneshot;
use tracing::{debug, error, trace, warn};


/// Конфигурация пула потоков
#[derive(Debug, Clone)]
pub struct Config {
    pub num_threads: usize,
    pub thread_name_prefix: String,
    pub stack_size: Option<usize>,
    pub panic_policy: PanicPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_threads: num_cpus::get(),
            thread_name_prefix: "fifo-pool".to_string(),
            stack_size: None,
            panic_policy: PanicPolicy::default(),
        }
    }
}

impl Config {
    pub fn cpu_bound() -> Self {
        Self {
            num_threads: num_cpus::get(),
            ..Default::default()
        }
    }

    pub fn io_bound() -> Self {
        Self {
            num_threads: num_cpus::get() * 2, // потоки часто спят на I/O
            ..Default::default()
        }
    }

    pub fn with_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    pub fn with_panic_policy(mut self, policy: PanicPolicy) -> Self {
        self.panic_policy = policy;
        self
    }
}


/// Очередь и флаг остановки, защищенные одним мьютексом
struct State {
    queue: VecDeque<Task>,
    stopped: bool,
}

/// Состояние, разделяемое владельцем пула и воркерами
struct Shared {
    state: Mutex<State>,
    available: Condvar,
    panic_policy: PanicPolicy,
    live_workers: CachePadded<AtomicUsize>,
    active_tasks: CachePadded<AtomicUsize>,
    completed_tasks: CachePadded<AtomicUsize>,
    failed_tasks: CachePadded<AtomicUsize>,
    rejected_tasks: CachePadded<AtomicUsize>,
}

impl Shared {
    fn new(panic_policy: PanicPolicy) -> Self {
        Self {
            state: Mutex::new(State {
                queue: VecDeque::new(),
                stopped: false,
            }),
            available: Condvar::new(),
            panic_policy,
            live_workers: CachePadded::new(AtomicUsize::new(0)),
            active_tasks: CachePadded::new(AtomicUsize::new(0)),
            completed_tasks: CachePadded::new(AtomicUsize::new(0)),
            failed_tasks: CachePadded::new(AtomicUsize::new(0)),
            rejected_tasks: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    // Задачи никогда не выполняются под замком, поэтому отравление
    // мьютекса не оставляет состояние в разобранном виде.
    #[inline]
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push_task(&self, task: Task) -> Result<(), PoolError> {
        let mut state = self.lock();
        if state.stopped {
            drop(state);
            self.rejected_tasks.fetch_add(1, Ordering::Relaxed);
            return Err(PoolError::Stopped);
        }
        state.queue.push_back(task);
        self.available.notify_one();
        Ok(())
    }

    fn stop(&self) {
        let mut state = self.lock();
        if state.stopped {
            return;
        }
        state.stopped = true;
        self.available.notify_all();
        debug!(queued = state.queue.len(), "pool stopped, draining queue");
    }

    /// Ждет задачу; `None` только когда пул остановлен и очередь пуста
    fn next_task(&self) -> Option<Task> {
        let mut state = self.lock();
        loop {
            if let Some(task) = state.queue.pop_front() {
                self.active_tasks.fetch_add(1, Ordering::Relaxed);
                return Some(task);
            }
            if state.stopped {
                return None;
            }
            state = self
                .available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn execute(&self, worker: usize, task: Task) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(task));
        self.active_tasks.fetch_sub(1, Ordering::Relaxed);

        let cause = match outcome {
            Ok(()) => {
                self.completed_tasks.fetch_add(1, Ordering::Relaxed);
                return;
            }
            Err(cause) => cause,
        };

        self.failed_tasks.fetch_add(1, Ordering::Relaxed);
        match self.panic_policy {
            PanicPolicy::Contain => {
                error!(worker, panic = %panic_message(cause.as_ref()), "task panicked, worker continues");
            }
            PanicPolicy::Propagate => {
                error!(worker, panic = %panic_message(cause.as_ref()), "task panicked, worker terminates");
                panic::resume_unwind(cause);
            }
        }
    }
}


/// Уменьшает `live_workers`, даже если поток воркера разматывается паникой
struct LiveGuard<'a>(&'a Shared);

impl Drop for LiveGuard<'_> {
    fn drop(&mut self) {
        self.0.live_workers.fetch_sub(1, Ordering::Release);
    }
}

thread_local! {
    // Адрес `Shared` пула, которому принадлежит текущий поток; 0 вне воркеров
    static OWNING_POOL: Cell<usize> = const { Cell::new(0) };
}

fn worker_loop(shared: &Shared, worker: usize) {
    let _live = LiveGuard(shared);
    OWNING_POOL.with(|pool| pool.set(shared as *const Shared as usize));
    trace!(worker, "worker started");

    while let Some(task) = shared.next_task() {
        shared.execute(worker, task);
    }

    trace!(worker, "worker exiting");
}

pub(crate) fn panic_message(cause: &(dyn Any + Send)) -> String {
    if let Some(s) = cause.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = cause.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}


/// Пул потоков фиксированного размера с общей FIFO очередью.
///
/// Жизненный цикл: `new` сразу запускает все воркеры, `stop` перестает
/// принимать задачи (уже поставленные в очередь выполняются), `join`
/// ждет завершения воркеров. `Drop` делает `stop` + `join`.
pub struct ThreadPool {
    shared: Arc<Shared>,
    workers: Mutex<Vec<thread::JoinHandle<()>>>,
    num_threads: usize,
}

impl ThreadPool {
    pub fn new(num_threads: usize) -> Result<Self, PoolError> {
        Self::with_config(Config::default().with_threads(num_threads))
    }

    pub fn with_config(config: Config) -> Result<Self, PoolError> {
        let pool = Self {
            shared: Arc::new(Shared::new(config.panic_policy)),
            workers: Mutex::new(Vec::with_capacity(config.num_threads)),
            num_threads: config.num_threads,
        };

        // Запускаем воркеры
        for index in 0..config.num_threads {
            // при ошибке Drop остановит и дождется уже запущенных
            let handle = pool.spawn_worker(&config, index)?;
            pool.lock_workers().push(handle);
        }

        debug!(workers = config.num_threads, "pool started");
        Ok(pool)
    }

    fn spawn_worker(&self, config: &Config, index: usize) -> io::Result<thread::JoinHandle<()>> {
        let mut builder = thread::Builder::new()
            .name(format!("{}-{}", config.thread_name_prefix, index));
        if let Some(bytes) = config.stack_size {
            builder = builder.stack_size(bytes);
        }

        let shared = Arc::clone(&self.shared);
        shared.live_workers.fetch_add(1, Ordering::Relaxed);
        builder
            .spawn(move || worker_loop(&shared, index))
            .inspect_err(|_| {
                self.shared.live_workers.fetch_sub(1, Ordering::Release);
            })
    }

    #[inline]
    fn lock_workers(&self) -> MutexGuard<'_, Vec<thread::JoinHandle<()>>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ставит задачу в очередь. `false` если пул уже остановлен;
    /// в этом случае задача уничтожается без выполнения.
    pub fn submit<F>(&self, f: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.try_submit(f).is_ok()
    }

    pub fn try_submit<F>(&self, f: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared.push_task(Box::new(f))
    }

    /// Как `submit`, но результат (или паника) задачи приходит через handle
    pub fn spawn_with_handle<T, F>(&self, f: F) -> Result<JoinHandle<T>, PoolError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = oneshot::channel::<SpawnResult<T>>();

        self.try_submit(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(f))
                .map_err(|cause| SpawnError::Panic(panic_message(cause.as_ref())));
            let _ = tx.send(result);
        })?;

        Ok(JoinHandle::new(rx))
    }

    /// Перестает принимать задачи и будит всех воркеров. Не блокирует.
    pub fn stop(&self) {
        self.shared.stop();
    }

    /// Блокирует до завершения всех воркеров.
    /// Без предварительного `stop` вернется только если воркеров нет.
    /// Из задачи этого же пула ничего не ждет: воркер не может дождаться
    /// сам себя, его handle остается для `join` владельца.
    pub fn join(&self) {
        if self.is_own_worker() {
            error!("join() called from a worker of the same pool, ignoring");
            return;
        }

        let mut workers = self.lock_workers();

        if !workers.is_empty() && !self.is_stopped() {
            warn!("join() called on a running pool, blocking until stop()");
        }

        for handle in workers.drain(..) {
            let name = handle.thread().name().map(str::to_owned);
            if let Err(cause) = handle.join() {
                error!(
                    worker = name.as_deref().unwrap_or("<unnamed>"),
                    panic = %panic_message(cause.as_ref()),
                    "worker thread terminated by panic"
                );
            }
        }

        // после join пул больше не принимает задачи
        self.shared.lock().stopped = true;
        debug!("pool joined");
    }

    fn is_own_worker(&self) -> bool {
        let shared = Arc::as_ptr(&self.shared) as usize;
        OWNING_POOL.with(|pool| pool.get() == shared)
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.lock().stopped
    }

    /// Число воркеров, заданное при создании
    #[inline]
    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    pub fn metrics(&self) -> PoolMetrics {
        let queued_tasks = self.shared.lock().queue.len();
        PoolMetrics {
            workers: self.num_threads,
            live_workers: self.shared.live_workers.load(Ordering::Acquire),
            queued_tasks,
            active_tasks: self.shared.active_tasks.load(Ordering::Relaxed),
            completed_tasks: self.shared.completed_tasks.load(Ordering::Relaxed),
            failed_tasks: self.shared.failed_tasks.load(Ordering::Relaxed),
            rejected_tasks: self.shared.rejected_tasks.load(Ordering::Relaxed),
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.stop();
        self.join();
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_message_reads_str_and_string_payloads() {
        let cause = panic::catch_unwind(|| panic!("boom")).unwrap_err();
        assert_eq!(panic_message(cause.as_ref()), "boom");

        let cause = panic::catch_unwind(|| panic!("code {}", 7)).unwrap_err();
        assert_eq!(panic_message(cause.as_ref()), "code 7");

        let cause = panic::catch_unwind(|| panic::panic_any(42_u8)).unwrap_err();
        assert_eq!(panic_message(cause.as_ref()), "non-string panic payload");
    }

    #[test]
    fn config_presets_scale_with_cpus() {
        let cpus = num_cpus::get();
        assert_eq!(Config::cpu_bound().num_threads, cpus);
        assert_eq!(Config::io_bound().num_threads, cpus * 2);

        let config = Config::default()
            .with_threads(3)
            .with_thread_name_prefix("bench")
            .with_panic_policy(PanicPolicy::Propagate);
        assert_eq!(config.num_threads, 3);
        assert_eq!(config.thread_name_prefix, "bench");
        assert_eq!(config.panic_policy, PanicPolicy::Propagate);
    }

    #[test]
    fn workers_carry_configured_names() {
        let pool = ThreadPool::with_config(Config::default().with_threads(1).with_thread_name_prefix("named"))
            .unwrap();
        let handle = pool
            .spawn_with_handle(|| thread::current().name().map(str::to_owned))
            .unwrap();
        assert_eq!(handle.join().unwrap().as_deref(), Some("named-0"));
    }
}
