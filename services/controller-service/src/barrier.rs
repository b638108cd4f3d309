use std::time::Duration;

use crate::clients::{ClientError, TaskQueue};

/// Result of waiting for a queue to drain.
#[derive(Debug, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Pending count reached zero.
    Drained { polls: u32 },
    /// The queue still had work after the last allowed poll.
    TimedOut { polls: u32, pending: usize },
}

/// Polls the queue's pending count at a fixed interval until it reaches zero
/// or `max_attempts` polls have been spent. A pending count of zero cannot
/// distinguish "all tasks completed" from "all tasks evicted"; callers only
/// learn that the queue is empty.
pub async fn wait_for_drain(
    queue: &dyn TaskQueue,
    queue_name: &str,
    poll_interval: Duration,
    max_attempts: u32,
) -> Result<DrainOutcome, ClientError> {
    let mut pending = 0;
    for attempt in 1..=max_attempts {
        tokio::time::sleep(poll_interval).await;
        pending = queue.pending_count(queue_name).await?;
        if pending == 0 {
            return Ok(DrainOutcome::Drained { polls: attempt });
        }
        tracing::info!(
            queue = queue_name,
            pending,
            attempt,
            "queue not drained yet"
        );
    }
    Ok(DrainOutcome::TimedOut {
        polls: max_attempts,
        pending,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WorkItem;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedQueue {
        counts: Mutex<Vec<usize>>,
    }

    impl ScriptedQueue {
        fn new(counts: &[usize]) -> Self {
            let mut counts: Vec<usize> = counts.to_vec();
            counts.reverse();
            Self {
                counts: Mutex::new(counts),
            }
        }
    }

    #[async_trait]
    impl TaskQueue for ScriptedQueue {
        async fn submit(&self, _queue: &str, _item: &WorkItem) -> Result<(), ClientError> {
            Ok(())
        }

        async fn pending_count(&self, _queue: &str) -> Result<usize, ClientError> {
            let mut counts = self.counts.lock().unwrap();
            counts.pop().ok_or_else(|| ClientError::Api("script exhausted".to_string()))
        }
    }

    struct BrokenQueue;

    #[async_trait]
    impl TaskQueue for BrokenQueue {
        async fn submit(&self, _queue: &str, _item: &WorkItem) -> Result<(), ClientError> {
            Ok(())
        }

        async fn pending_count(&self, _queue: &str) -> Result<usize, ClientError> {
            Err(ClientError::Api("list failed".to_string()))
        }
    }

    const TICK: Duration = Duration::from_millis(1);

    #[tokio::test]
    async fn returns_drained_on_first_zero() {
        let queue = ScriptedQueue::new(&[3, 1, 0, 5]);
        let outcome = wait_for_drain(&queue, "ads-queue", TICK, 10).await.unwrap();
        assert_eq!(outcome, DrainOutcome::Drained { polls: 3 });
        // The fourth scripted count was never requested.
        assert_eq!(queue.counts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn does_not_return_while_pending() {
        let queue = ScriptedQueue::new(&[2, 2, 2, 0]);
        let outcome = wait_for_drain(&queue, "ads-queue", TICK, 10).await.unwrap();
        assert_eq!(outcome, DrainOutcome::Drained { polls: 4 });
    }

    #[tokio::test]
    async fn times_out_when_queue_never_empties() {
        let queue = ScriptedQueue::new(&[4, 4, 4]);
        let outcome = wait_for_drain(&queue, "ads-queue", TICK, 3).await.unwrap();
        assert_eq!(
            outcome,
            DrainOutcome::TimedOut {
                polls: 3,
                pending: 4
            }
        );
    }

    #[tokio::test]
    async fn pending_count_error_is_fatal() {
        let result = wait_for_drain(&BrokenQueue, "ads-queue", TICK, 3).await;
        assert!(matches!(result, Err(ClientError::Api(_))));
    }
}
