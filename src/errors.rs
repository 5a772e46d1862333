use std::io;
use thiserror::Error;

/// Ошибки, которые пул возвращает вызывающему коду
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("pool is stopped, task rejected")]
    Stopped,
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] io::Error),
}

/// Ошибки задачи, доставляемые через `JoinHandle`
#[derive(Debug, PartialEq, Eq, Clone, Error)]
pub enum SpawnError {
    #[error("task panicked: {0}")]
    Panic(String),
    #[error("task was dropped before it produced a result")]
    ChannelClosed,
}
