//! Per-user event dispatch.
//!
//! Each active user gets one worker task fed by an unbounded queue, so a
//! user's events are handled strictly in arrival order while different
//! users proceed concurrently. Workers retire after an idle period.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::SendError};

use crate::channels::{EventStream, InboundEvent, UserId};

use super::engine::RegistrationEngine;

type WorkerMap = Arc<Mutex<HashMap<UserId, UnboundedSender<InboundEvent>>>>;

/// Routes events to per-user workers.
pub struct Dispatcher {
    engine: Arc<RegistrationEngine>,
    workers: WorkerMap,
    idle_timeout: Duration,
}

impl Dispatcher {
    pub fn new(engine: Arc<RegistrationEngine>, idle_timeout: Duration) -> Self {
        Self {
            engine,
            workers: Arc::new(Mutex::new(HashMap::new())),
            idle_timeout,
        }
    }

    /// Queue an event for its user's worker, starting one if needed.
    pub fn dispatch(&self, event: InboundEvent) {
        let user_id = event.user_id;
        let mut workers = lock(&self.workers);

        let event = match workers.get(&user_id) {
            Some(tx) => match tx.send(event) {
                Ok(()) => return,
                // Worker is gone (it panicked); start a fresh one.
                Err(SendError(event)) => {
                    tracing::warn!(user_id, "Worker queue closed, restarting worker");
                    event
                }
            },
            None => event,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        if tx.send(event).is_err() {
            return;
        }
        workers.insert(user_id, tx);
        drop(workers);

        tracing::debug!(user_id, "Starting worker");
        tokio::spawn(run_worker(
            user_id,
            rx,
            self.engine.clone(),
            self.workers.clone(),
            self.idle_timeout,
        ));
    }

    /// Number of live workers.
    pub fn active_workers(&self) -> usize {
        lock(&self.workers).len()
    }

    /// Feed events from `events` until Ctrl+C or the stream ends.
    pub async fn run(&self, mut events: EventStream) {
        tracing::info!("Dispatcher ready and listening");

        loop {
            let event = tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl+C received, shutting down...");
                    break;
                }
                event = events.next() => {
                    match event {
                        Some(e) => e,
                        None => {
                            tracing::info!("Event stream ended, shutting down...");
                            break;
                        }
                    }
                }
            };
            self.dispatch(event);
        }
    }
}

async fn run_worker(
    user_id: UserId,
    mut rx: UnboundedReceiver<InboundEvent>,
    engine: Arc<RegistrationEngine>,
    workers: WorkerMap,
    idle_timeout: Duration,
) {
    loop {
        let event = match tokio::time::timeout(idle_timeout, rx.recv()).await {
            Ok(Some(event)) => event,
            Ok(None) => break,
            Err(_) => {
                // Retire only with the map locked and the queue empty, so a
                // concurrent dispatch either lands here or starts a new worker.
                let mut map = lock(&workers);
                match rx.try_recv() {
                    Ok(event) => event,
                    Err(_) => {
                        map.remove(&user_id);
                        tracing::debug!(user_id, "Worker idle, retiring");
                        break;
                    }
                }
            }
        };

        let state = engine.handle_event(event).await;
        tracing::debug!(user_id, state = ?state, "Event handled");
    }
}

fn lock(
    workers: &WorkerMap,
) -> MutexGuard<'_, HashMap<UserId, UnboundedSender<InboundEvent>>> {
    workers.lock().unwrap_or_else(PoisonError::into_inner)
}
