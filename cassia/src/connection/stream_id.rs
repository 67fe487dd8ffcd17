//! The free-list of 16-bit stream ids that correlate requests with responses
//! on a single multiplexed connection. `-1` is reserved for server-pushed
//! `EVENT` frames and is never handed out.
use std::collections::VecDeque;

use tokio::sync::{Notify, Mutex};

pub(super) struct StreamIdPool {
    free: Mutex<VecDeque<i16>>,
    notify: Notify,
}

impl StreamIdPool {
    pub(super) fn new(max_streams: u16) -> Self {
        // `max_streams` can be as large as 32768, which overflows i16 before
        // the range is even built; do the count in a wider type and narrow
        // each value afterward instead of `0..max_streams as i16`.
        let free = (0..max_streams as i32).map(|id| id as i16).collect();
        Self { free: Mutex::new(free), notify: Notify::new() }
    }

    /// Waits for a free id, blocking the caller until one is released.
    pub(super) async fn acquire(&self) -> i16 {
        loop {
            {
                let mut free = self.free.lock().await;
                if let Some(id) = free.pop_front() {
                    return id;
                }
            }
            self.notify.notified().await;
        }
    }

    /// Returns a free id without waiting, for callers that prefer to fail
    /// fast over queuing.
    pub(super) async fn try_acquire(&self) -> Option<i16> {
        self.free.lock().await.pop_front()
    }

    pub(super) async fn release(&self, id: i16) {
        self.free.lock().await.push_back(id);
        self.notify.notify_one();
    }
}

#[cfg(all(test, feature = "tokio"))]
mod test {
    use super::*;

    #[tokio::test]
    async fn exhausts_and_recovers() {
        let pool = StreamIdPool::new(2);
        let a = pool.acquire().await;
        let b = pool.acquire().await;
        assert_ne!(a, b);
        assert!(pool.try_acquire().await.is_none());
        pool.release(a).await;
        assert_eq!(pool.try_acquire().await, Some(a));
    }

    #[tokio::test]
    async fn max_ceiling_does_not_overflow_i16() {
        let pool = StreamIdPool::new(crate::options::MAX_STREAMS_CEILING);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..crate::options::MAX_STREAMS_CEILING {
            let id = pool.try_acquire().await.expect("pool should yield 32768 distinct ids");
            assert!(id >= 0, "stream id must not be negative");
            assert!(seen.insert(id), "stream id {id} handed out twice");
        }
        assert!(pool.try_acquire().await.is_none());
    }
}
