use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex, PoisonError, RwLock,
        atomic::{AtomicU64, Ordering},
    },
};

use crate::message::Message;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("queue {0} is closed")]
    Closed(String),
    #[error("queue {0} is full")]
    Full(String),
    #[error("queue {0} is not open on the device")]
    NotOpen(String),
}

pub type CallbackId = u64;

/// Invoked with the stream name and the delivered message, on the thread
/// that pushed the message.
pub type QueueCallback = Arc<dyn Fn(&str, &Arc<Message>) + Send + Sync>;

struct CallbackState {
    callbacks: Vec<(CallbackId, QueueCallback)>,
    closed: bool,
}

/// Device → host queue.
///
/// While at least one callback is registered, pushed messages are handed to
/// the callbacks and not buffered. Otherwise they wait in a bounded buffer:
/// a non-blocking queue drops the oldest message on overflow, a blocking one
/// rejects the push.
pub struct DataOutputQueue {
    name: String,
    max_size: usize,
    blocking: bool,
    next_id: AtomicU64,
    state: RwLock<CallbackState>,
    buffer: Mutex<VecDeque<Arc<Message>>>,
}

impl DataOutputQueue {
    pub fn new(name: impl Into<String>, max_size: usize, blocking: bool) -> Self {
        Self {
            name: name.into(),
            max_size: max_size.max(1),
            blocking,
            next_id: AtomicU64::new(1),
            state: RwLock::new(CallbackState {
                callbacks: Vec::new(),
                closed: false,
            }),
            buffer: Mutex::new(VecDeque::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn is_blocking(&self) -> bool {
        self.blocking
    }

    pub fn is_closed(&self) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .closed
    }

    pub fn add_callback<F>(&self, callback: F) -> Result<CallbackId, QueueError>
    where
        F: Fn(&str, &Arc<Message>) + Send + Sync + 'static,
    {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.closed {
            return Err(QueueError::Closed(self.name.clone()));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        state.callbacks.push((id, Arc::new(callback)));
        Ok(id)
    }

    pub fn remove_callback(&self, id: CallbackId) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let before = state.callbacks.len();
        state.callbacks.retain(|(cb_id, _)| *cb_id != id);
        before != state.callbacks.len()
    }

    /// Device side: deliver one message.
    pub fn push(&self, msg: Message) -> Result<(), QueueError> {
        let msg = Arc::new(msg);
        {
            // the read guard is held across the callbacks so close() waits
            // for in-flight deliveries
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            if state.closed {
                return Err(QueueError::Closed(self.name.clone()));
            }
            if !state.callbacks.is_empty() {
                for (_, callback) in state.callbacks.iter() {
                    callback(&self.name, &msg);
                }
                return Ok(());
            }
        }

        let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        if buffer.len() >= self.max_size {
            if self.blocking {
                return Err(QueueError::Full(self.name.clone()));
            }
            buffer.pop_front();
            log::trace!("queue {}: dropped oldest message", self.name);
        }
        buffer.push_back(msg);
        Ok(())
    }

    pub fn try_get(&self) -> Option<Arc<Message>> {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    pub fn len(&self) -> usize {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Blocks until running callbacks have returned. Afterwards no callback
    /// runs again. Closing twice is a no-op. Must not be called from inside
    /// one of this queue's own callbacks.
    pub fn close(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.closed {
            return;
        }
        state.closed = true;
        state.callbacks.clear();
        drop(state);
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        log::debug!("queue {} closed", self.name);
    }
}

pub type InputConsumer = Arc<dyn Fn(&Message) + Send + Sync>;

/// Host → device queue. The device binds a consumer when the stream is
/// opened; until then sends are buffered up to `max_size`.
pub struct DataInputQueue {
    name: String,
    max_size: usize,
    consumer: RwLock<Option<InputConsumer>>,
    closed: RwLock<bool>,
    pending: Mutex<VecDeque<Message>>,
}

impl DataInputQueue {
    pub fn new(name: impl Into<String>, max_size: usize) -> Self {
        Self {
            name: name.into(),
            max_size: max_size.max(1),
            consumer: RwLock::new(None),
            closed: RwLock::new(false),
            pending: Mutex::new(VecDeque::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Device side: attach the consumer and flush anything sent before.
    pub fn bind(&self, consumer: InputConsumer) {
        let pending: Vec<Message> = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for msg in pending.iter() {
            consumer(msg);
        }
        *self.consumer.write().unwrap_or_else(PoisonError::into_inner) = Some(consumer);
    }

    pub fn send(&self, msg: impl Into<Message>) -> Result<(), QueueError> {
        let msg = msg.into();
        let closed = self.closed.read().unwrap_or_else(PoisonError::into_inner);
        if *closed {
            return Err(QueueError::Closed(self.name.clone()));
        }
        let consumer = self
            .consumer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match consumer {
            Some(consumer) => consumer(&msg),
            None => {
                let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
                if pending.len() >= self.max_size {
                    return Err(QueueError::Full(self.name.clone()));
                }
                pending.push_back(msg);
            }
        }
        Ok(())
    }

    pub fn close(&self) {
        let mut closed = self.closed.write().unwrap_or_else(PoisonError::into_inner);
        if *closed {
            return;
        }
        *closed = true;
        self.consumer
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        log::debug!("queue {} closed", self.name);
    }
}

#[cfg(test)]
#[path = "queue_test.rs"]
mod queue_test;
