//! Event queues between detector workers and the alert coordinator
//!
//! ## Responsibilities
//!
//! - One bounded multi-producer/single-consumer queue per detection kind
//! - Non-blocking pops for the coordinator
//! - Drop-oldest overflow so producers never block on a full queue
//! - Selective backlog purge for burst coalescing

use crate::detector::{DetectionEvent, DetectionKind};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Bounded FIFO of detection events for one kind
pub struct EventQueue {
    kind: DetectionKind,
    capacity: usize,
    inner: Mutex<VecDeque<DetectionEvent>>,
    dropped: AtomicU64,
}

impl EventQueue {
    pub fn new(kind: DetectionKind, capacity: usize) -> Self {
        Self {
            kind,
            capacity: capacity.max(1),
            inner: Mutex::new(VecDeque::new()),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn kind(&self) -> DetectionKind {
        self.kind
    }

    /// Enqueue an event. When the queue is full the oldest entry is
    /// discarded so the producer never blocks.
    pub async fn push(&self, event: DetectionEvent) {
        let mut inner = self.inner.lock().await;
        if inner.len() >= self.capacity {
            inner.pop_front();
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::warn!(
                kind = %self.kind,
                capacity = self.capacity,
                dropped_total = dropped,
                "Event queue full, oldest event dropped"
            );
        }
        inner.push_back(event);
    }

    /// Non-blocking dequeue
    pub async fn try_pop(&self) -> Option<DetectionEvent> {
        self.inner.lock().await.pop_front()
    }

    /// Discard every queued event for the given camera, returning how many
    /// were removed
    pub async fn purge_camera(&self, camera_id: usize) -> usize {
        let mut inner = self.inner.lock().await;
        let before = inner.len();
        inner.retain(|event| event.camera_id != camera_id);
        before - inner.len()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    /// Events discarded by the overflow policy since startup
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// The three kind-specific queues shared by the whole pipeline
pub struct TypeQueues {
    face: Arc<EventQueue>,
    motion: Arc<EventQueue>,
    object: Arc<EventQueue>,
}

impl TypeQueues {
    pub fn new(capacity: usize) -> Self {
        Self {
            face: Arc::new(EventQueue::new(DetectionKind::Face, capacity)),
            motion: Arc::new(EventQueue::new(DetectionKind::Motion, capacity)),
            object: Arc::new(EventQueue::new(DetectionKind::Object, capacity)),
        }
    }

    pub fn for_kind(&self, kind: DetectionKind) -> &Arc<EventQueue> {
        match kind {
            DetectionKind::Face => &self.face,
            DetectionKind::Motion => &self.motion,
            DetectionKind::Object => &self.object,
        }
    }

    /// Queues in the coordinator's fixed service order: face, motion,
    /// object. The order bounds how far a burst on one channel can starve
    /// the others.
    pub fn in_service_order(&self) -> [&Arc<EventQueue>; 3] {
        [&self.face, &self.motion, &self.object]
    }
}
