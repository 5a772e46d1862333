use clap::Parser;
use fifo_pool::{Accumulator, Config, ThreadPool};
use std::{
    collections::{HashMap, HashSet},
    hint::black_box,
    sync::{
        atomic::{AtomicI64, AtomicUsize, Ordering},
        Arc, OnceLock,
    },
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};
use tracing::info;
use tracing_subscriber::EnvFilter;


/// Сравнение трех способов диспетчеризации (map, array, match) под фоновой нагрузкой пула
#[derive(Parser, Debug)]
#[command(name = "fifo_pool", version, about)]
struct Cli {
    /// Число воркеров пула
    #[arg(long, env = "POOL_WORKERS", default_value_t = 5)]
    workers: usize,

    /// Сколько задач отправить
    #[arg(long, env = "POOL_TASKS", default_value_t = 99_999)]
    tasks: usize,

    /// Размер входа для диспетчеризации (не больше 8)
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(i32).range(1..=8))]
    input_size: i32,
}

type Dispatch = fn(i32) -> i32;

fn f0(i: i32) -> i32 { i + 12 }
fn f1(i: i32) -> i32 { i * 2 }
fn f2(i: i32) -> i32 { i / 2 }
fn f3(i: i32) -> i32 { i * 5 }
fn f4(i: i32) -> i32 { i / 5 }
fn f5(i: i32) -> i32 { i - 40 }
fn f6(i: i32) -> i32 { i % 12 }
fn f7(i: i32) -> i32 { i * 12 }

const TABLE: [Dispatch; 8] = [f0, f1, f2, f3, f4, f5, f6, f7];

fn bench_map(input: i32, acc: &Accumulator, sink: &AtomicI64) {
    static FIELDS: OnceLock<HashMap<i32, Dispatch>> = OnceLock::new();
    let fields = FIELDS.get_or_init(|| (0..).zip(TABLE).collect());

    let start = acc.start();
    if let Some(f) = fields.get(&black_box(input)) {
        sink.fetch_add(i64::from(f(input)), Ordering::Relaxed);
    }
    acc.stop(start);
}

fn bench_array(input: i32, acc: &Accumulator, sink: &AtomicI64) {
    let start = acc.start();
    let f = TABLE[black_box(input) as usize];
    sink.fetch_add(i64::from(f(input)), Ordering::Relaxed);
    acc.stop(start);
}

fn bench_switch(input: i32, acc: &Accumulator, sink: &AtomicI64) {
    let start = acc.start();
    let out = match black_box(input) {
        0 => f0(input),
        1 => f1(input),
        2 => f2(input),
        3 => f3(input),
        4 => f4(input),
        5 => f5(input),
        6 => f6(input),
        _ => f7(input),
    };
    sink.fetch_add(i64::from(out), Ordering::Relaxed);
    acc.stop(start);
}

/// xorshift64, значения в 0..=1000 (остаток от деления, с небольшим смещением)
struct Rng(u64);

impl Rng {
    fn seeded(salt: u64) -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        Self((nanos ^ salt.wrapping_mul(0x9E37_79B9_7F4A_7C15)) | 1)
    }

    fn sample(&mut self) -> i32 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        (self.0 % 1001) as i32
    }
}

#[derive(Default)]
struct Bench {
    seq: AtomicUsize,
    // сюда пишут бенчмарки, чтобы вызовы не выкинул оптимизатор
    sink: AtomicI64,
    background: AtomicUsize,
    map: Accumulator,
    array: Accumulator,
    switch: Accumulator,
}

impl Bench {
    fn run_one(&self, input_size: i32) {
        let l = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        let mut rng = Rng::seeded(l as u64);

        if l % 100 == 0 {
            let input = rng.sample() % input_size;
            if l % 300 == 0 {
                bench_map(input, &self.map, &self.sink);
            } else if (l + 100) % 300 == 0 {
                bench_array(input, &self.array, &self.sink);
            } else {
                bench_switch(input, &self.switch, &self.sink);
            }
            return;
        }

        // Фоновая нагрузка
        let mut set = HashSet::new();
        loop {
            let m = rng.sample();
            if m < 5 {
                break;
            }
            set.insert(m);
        }
        if set.is_empty() {
            return;
        }

        let total: usize = set.iter().map(|&m| m as usize).sum();
        self.background.fetch_add(total / set.len(), Ordering::Relaxed);

        // Имитация ожидания I/O
        if rng.sample() % 100 > 30 {
            std::thread::sleep(Duration::from_micros(1));
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let bench = Arc::new(Bench::default());
    let now = Instant::now();

    {
        let pool = ThreadPool::with_config(Config::default().with_threads(cli.workers))?;

        for _ in 0..cli.tasks {
            let bench = Arc::clone(&bench);
            let input_size = cli.input_size;
            pool.submit(move || bench.run_one(input_size));
        }

        pool.stop();
        // Drop ждет, пока очередь опустеет
    }

    info!(
        tasks = cli.tasks,
        workers = cli.workers,
        elapsed = ?now.elapsed(),
        "benchmark finished"
    );

    println!("map: {}", bench.map);
    println!("array: {}", bench.array);
    println!("switch: {}", bench.switch);
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_results_land_in_bench_sink() {
        let bench = Bench::default();
        for _ in 0..300 {
            bench.run_one(1);
        }

        // l = 100 -> switch, 200 -> array, 300 -> map; вход всегда 0, f0(0) = 12
        assert_eq!(bench.switch.count(), 1);
        assert_eq!(bench.array.count(), 1);
        assert_eq!(bench.map.count(), 1);
        assert_eq!(bench.sink.load(Ordering::Relaxed), 36);
    }

    #[test]
    fn default_task_count_matches_source_loop() {
        let cli = Cli::parse_from(["fifo_pool"]);
        assert_eq!(cli.tasks, 99_999);
        assert_eq!(cli.workers, 5);
        assert_eq!(cli.input_size, 3);
    }

    #[test]
    fn rng_samples_stay_in_range() {
        let mut rng = Rng::seeded(7);
        assert!((0..10_000).map(|_| rng.sample()).all(|m| (0..=1000).contains(&m)));
    }
}
