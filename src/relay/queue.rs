//! Per-listener frame queue with drop-oldest admission
//!
//! Each consumer owns one `FrameQueue`. The broadcaster pushes into it
//! without ever blocking; when the queue is full the oldest undelivered
//! frames are discarded so the listener always stays close to the live
//! point.

use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Notify;
use uuid::Uuid;

/// Identity of a registered listener queue
pub type ListenerId = Uuid;

struct QueueState {
    frames: VecDeque<Bytes>,
    closed: bool,
}

/// Bounded FIFO of whole frames
pub struct FrameQueue {
    id: ListenerId,
    capacity: usize,
    state: Mutex<QueueState>,
    notify: Notify,
    /// Frames evicted to make room for newer ones
    dropped: AtomicU64,
}

impl FrameQueue {
    /// Create a new queue holding at most `capacity` frames (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            id: Uuid::new_v4(),
            capacity,
            state: Mutex::new(QueueState {
                frames: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            notify: Notify::new(),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Admit `frame`, evicting from the front until it fits.
    ///
    /// Never blocks and never fails. Frames pushed after `close` are
    /// discarded silently.
    pub fn push(&self, frame: Bytes) {
        {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            while state.frames.len() >= self.capacity {
                state.frames.pop_front();
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            state.frames.push_back(frame);
        }
        self.notify.notify_one();
    }

    /// Wait for the next frame.
    ///
    /// Returns `None` once the queue is closed. Frames still buffered at
    /// close time are abandoned; a closed listener is going away.
    pub async fn pop(&self) -> Option<Bytes> {
        loop {
            let notified = self.notify.notified();
            {
                let mut state = self.state.lock();
                if state.closed {
                    return None;
                }
                if let Some(frame) = state.frames.pop_front() {
                    return Some(frame);
                }
            }
            notified.await;
        }
    }

    /// Pop without waiting
    pub fn try_pop(&self) -> Option<Bytes> {
        let mut state = self.state.lock();
        if state.closed {
            return None;
        }
        state.frames.pop_front()
    }

    /// Close the queue and wake any pending `pop`. Idempotent.
    pub fn close(&self) {
        {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.frames.clear();
        }
        self.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Get current queue length
    pub fn len(&self) -> usize {
        self.state.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of frames discarded by the drop-oldest policy
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for FrameQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameQueue")
            .field("id", &self.id)
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .field("dropped", &self.dropped())
            .finish()
    }
}
