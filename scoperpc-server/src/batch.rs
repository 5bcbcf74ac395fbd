//! Ordered fan-in for batch payloads
//!
//! A batch dispatches every element eagerly, in input order, but elements
//! may complete in any order: synchronously while the batch loop is still
//! running, or later from other tasks. The aggregator owns one slot per
//! element and a countdown; the outer continuation runs exactly once, when
//! the countdown reaches zero, with the replies in input order.
//!
//! If one element never completes, the whole batch stays pending.
//!
//! # Examples
//!
//! ```rust
//! use scoperpc_server::BatchAggregator;
//! use scoperpc_core::{Reply, Response};
//! use serde_json::json;
//! use std::sync::{Arc, Mutex};
//!
//! let out = Arc::new(Mutex::new(None));
//! let sink = Arc::clone(&out);
//! let aggregator = BatchAggregator::new(2, Box::new(move |reply: Reply| {
//!     *sink.lock().unwrap() = Some(reply);
//! }));
//!
//! let first = aggregator.slot(0);
//! let second = aggregator.slot(1);
//! second(Reply::Single(Response::success(json!("b"), None)));
//! first(Reply::Single(Response::success(json!("a"), None)));
//!
//! let reply = out.lock().unwrap().take().unwrap();
//! assert_eq!(reply.to_value()[0]["result"], "a");
//! ```

use crate::completion::Continuation;
use scoperpc_core::Reply;
use std::sync::{Arc, Mutex, PoisonError};

/// Per-batch aggregation buffer
pub struct BatchAggregator {
    state: Mutex<BatchState>,
}

struct BatchState {
    slots: Vec<Option<Reply>>,
    remaining: usize,
    continuation: Option<Continuation>,
}

impl BatchAggregator {
    /// Create an aggregator for `size` elements
    ///
    /// A zero-sized batch has nothing to wait for: the continuation runs
    /// immediately with an empty batch reply.
    pub fn new(size: usize, continuation: Continuation) -> Arc<Self> {
        let continuation = if size == 0 {
            continuation(Reply::Batch(Vec::new()));
            None
        } else {
            Some(continuation)
        };

        Arc::new(Self {
            state: Mutex::new(BatchState {
                slots: (0..size).map(|_| None).collect(),
                remaining: size,
                continuation,
            }),
        })
    }

    /// Continuation that fills slot `index`
    pub fn slot(self: &Arc<Self>, index: usize) -> Continuation {
        let aggregator = Arc::clone(self);
        Box::new(move |reply: Reply| aggregator.fill(index, reply))
    }

    /// Number of slots still waiting for a reply
    pub fn remaining(&self) -> usize {
        self.lock().remaining
    }

    fn fill(&self, index: usize, reply: Reply) {
        let finished = {
            let mut state = self.lock();
            match state.slots.get_mut(index) {
                Some(slot) if slot.is_none() => *slot = Some(reply),
                Some(_) => {
                    tracing::warn!(index, "Batch slot filled twice; keeping the first reply");
                    return;
                }
                None => {
                    tracing::warn!(index, "Reply for a slot outside the batch");
                    return;
                }
            }

            state.remaining -= 1;
            if state.remaining == 0 {
                let replies: Vec<Reply> = state.slots.drain(..).flatten().collect();
                state.continuation.take().map(|continuation| (continuation, replies))
            } else {
                None
            }
        };

        // Called outside the lock: the continuation may be another batch's slot
        if let Some((continuation, replies)) = finished {
            tracing::debug!(size = replies.len(), "Batch completed");
            continuation(Reply::Batch(replies));
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BatchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scoperpc_core::Response;
    use serde_json::json;

    fn collector() -> (Continuation, Arc<Mutex<Vec<Reply>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (Box::new(move |reply: Reply| sink.lock().unwrap().push(reply)), seen)
    }

    fn reply(n: i64) -> Reply {
        Reply::Single(Response::success(json!(n), Some(json!(n))))
    }

    #[test]
    fn test_out_of_order_completion_keeps_input_order() {
        let (continuation, seen) = collector();
        let aggregator = BatchAggregator::new(3, continuation);
        let mut slots: Vec<_> = (0..3).map(|i| Some(aggregator.slot(i))).collect();

        for index in [2, 0, 1] {
            let slot = slots[index].take().unwrap();
            slot(reply(index as i64));
        }

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].to_value(), json!([
            {"id": 0, "result": 0, "error": null},
            {"id": 1, "result": 1, "error": null},
            {"id": 2, "result": 2, "error": null}
        ]));
    }

    #[test]
    fn test_waits_for_every_slot() {
        let (continuation, seen) = collector();
        let aggregator = BatchAggregator::new(2, continuation);

        aggregator.slot(0)(reply(0));
        assert_eq!(aggregator.remaining(), 1);
        assert!(seen.lock().unwrap().is_empty());

        aggregator.slot(1)(reply(1));
        assert_eq!(aggregator.remaining(), 0);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_empty_batch_completes_immediately() {
        let (continuation, seen) = collector();
        let aggregator = BatchAggregator::new(0, continuation);

        assert_eq!(aggregator.remaining(), 0);
        assert_eq!(seen.lock().unwrap().as_slice(), &[Reply::Batch(vec![])]);
    }

    #[test]
    fn test_duplicate_fill_ignored() {
        let (continuation, seen) = collector();
        let aggregator = BatchAggregator::new(2, continuation);

        aggregator.slot(0)(reply(0));
        aggregator.slot(0)(reply(99));
        assert_eq!(aggregator.remaining(), 1);

        aggregator.slot(1)(reply(1));
        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].to_value()[0]["result"], json!(0));
    }

    #[test]
    fn test_concurrent_fill_from_threads() {
        let (continuation, seen) = collector();
        let aggregator = BatchAggregator::new(16, continuation);

        let handles: Vec<_> = (0..16)
            .rev()
            .map(|i| {
                let slot = aggregator.slot(i);
                std::thread::spawn(move || slot(reply(i as i64)))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let items = seen[0].as_batch().unwrap();
        for (i, item) in items.iter().enumerate() {
            assert_eq!(item.as_single().unwrap().id, Some(json!(i)));
        }
    }
}
