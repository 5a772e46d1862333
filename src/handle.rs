use super::{
    errors::SpawnError,
    result::SpawnResult,
};
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll}
};
use tokio::sync::oneshot;


/// Единица работы: вызывается один раз, без аргументов и без результата
pub type Task = Box<dyn FnOnce() + Send + 'static>;


/// Handle на результат задачи, отправленной через `spawn_with_handle`
pub struct JoinHandle<T> {
    receiver: oneshot::Receiver<SpawnResult<T>>,
}

impl<T> JoinHandle<T> {

    pub(crate) fn new(receiver: oneshot::Receiver<SpawnResult<T>>) -> Self {
        Self { receiver }
    }

    /// Блокирует текущий поток до получения результата.
    /// Нельзя вызывать изнутри async runtime.
    pub fn join(self) -> SpawnResult<T> {
        self.receiver
            .blocking_recv()
            .unwrap_or(Err(SpawnError::ChannelClosed))
    }

    /// Результат, если задача уже завершилась
    pub fn try_join(&mut self) -> Option<SpawnResult<T>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(SpawnError::ChannelClosed)),
        }
    }
}

impl<T> Future for JoinHandle<T> {
    type Output = SpawnResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Ready(res) => Poll::Ready(res.unwrap_or(Err(SpawnError::ChannelClosed))),
            Poll::Pending => Poll::Pending,
        }
    }
}


/// Ожидание набора handles, результаты в порядке handles
pub async fn join_handles<T>(handles: Vec<JoinHandle<T>>) -> Vec<SpawnResult<T>> {
    if handles.is_empty() {
        return Vec::new();
    }
    futures::future::join_all(handles).await
}
