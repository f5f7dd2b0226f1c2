//! Simple stateless pub-sub event handler
//!
//! This module provides a simple hook system that allow components of the system subscribe to engine events and react
//! to them. The event handler is stateless, i.e. the handlers have no access to the internal state of the system. All
//! that is received is the event itself.
//!
//! Handlers are async and run on spawned tasks. At most `concurrency` of them run at once; further events wait in the
//! channel, and once the channel is full, publishers wait too.
use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::sync::{mpsc, Semaphore};

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Handler tasks allowed to run at the same time, per event type, unless configured otherwise.
pub const DEFAULT_CONCURRENCY: usize = 8;

pub struct EventHandler<E: Send + Sync + 'static> {
    listener: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
    concurrency: usize,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size.max(1));
        Self { listener: receiver, sender, handler, concurrency: DEFAULT_CONCURRENCY }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.sender.clone())
    }

    pub async fn start_handler(mut self) {
        debug!("📬️ Starting event handler ({} concurrent jobs)", self.concurrency);
        // drop the internal sender so that when the last subscriber is dropped, we can automatically shut down the
        // handler
        drop(self.sender);
        let permits = Arc::new(Semaphore::new(self.concurrency));
        while let Some(ev) = self.listener.recv().await {
            let permit = match Arc::clone(&permits).acquire_owned().await {
                Ok(p) => p,
                Err(e) => {
                    error!("📬️ Event handler semaphore closed: {e}. Dropping event.");
                    continue;
                },
            };
            trace!("📬️ Handling event");
            let handler = Arc::clone(&self.handler);
            tokio::spawn(async move {
                (handler)(ev).await;
                drop(permit);
                trace!("📬️ Event handled");
            });
        }
        // Every running job holds a permit, so holding all of them means the last job has finished.
        let all = u32::try_from(self.concurrency).unwrap_or(u32::MAX);
        match permits.acquire_many(all).await {
            Ok(_) => debug!("📬️ Event handler shutting down gracefully"),
            Err(e) => warn!("📬️ Event handler shutdown could not wait for running jobs: {e}"),
        }
        debug!("📬️ Event handler has shut down");
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub fn new(sender: mpsc::Sender<E>) -> Self {
        Self { sender }
    }

    pub async fn publish_event(&self, event: E) {
        if let Err(e) = self.sender.send(event).await {
            error!("📬️ Failed to send event: {e}");
        }
    }
}
