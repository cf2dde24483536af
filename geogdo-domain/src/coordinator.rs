//! Per-door operation serialization.
//!
//! Each door accepts one operation at a time. A trigger that arrives while
//! an operation (or its cooldown) is in flight is dropped, not queued;
//! telemetry keeps flowing and a later boundary crossing will trigger
//! again. This is what stops a vehicle hovering on a fence boundary from
//! cycling the door.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use geogdo_types::Action;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::fleet::Door;

/// Releases the door's operation lock when the operation task finishes,
/// whatever path it takes out.
struct OpGuard {
    door: Arc<Door>,
}

impl Drop for OpGuard {
    fn drop(&mut self) {
        self.door.op_lock.store(false, Ordering::Release);
    }
}

/// Request `action` on `door`. Returns the operation task when the door was
/// free, or `None` when the trigger was dropped because an operation or its
/// cooldown is still in progress.
pub fn trigger(door: &Arc<Door>, action: Action) -> Option<JoinHandle<()>> {
    if door
        .op_lock
        .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
        .is_err()
    {
        debug!(door = %door.id, %action, "operation in progress, dropping trigger");
        return None;
    }

    let door = door.clone();
    Some(tokio::spawn(async move {
        let guard = OpGuard { door: door.clone() };
        run_operation(&door, action).await;
        if !door.cooldown.is_zero() {
            debug!(door = %door.id, cooldown = ?door.cooldown, "entering cooldown");
            tokio::time::sleep(door.cooldown).await;
        }
        drop(guard);
    }))
}

async fn run_operation(door: &Arc<Door>, action: Action) {
    let attempts = door.max_retries.max(1);
    for attempt in 1..=attempts {
        info!(
            door = %door.id,
            %action,
            attempt,
            opener = door.opener.name(),
            "operating door"
        );
        match door.opener.set_state(action).await {
            Ok(()) => {
                info!(door = %door.id, %action, "door operation finished");
                return;
            }
            Err(err) if attempt < attempts => {
                warn!(door = %door.id, %action, attempt, error = %err, "door operation failed, retrying");
            }
            Err(err) => {
                error!(door = %door.id, %action, attempts, error = %err, "door operation failed, giving up");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use geogdo_opener_api::{Opener, OpenerError};
    use geogdo_types::{CircularGeofence, GeofenceSpec};
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    fn fence() -> GeofenceSpec {
        GeofenceSpec::Circular(CircularGeofence::default())
    }

    /// Counts calls into a shared counter; fails the first `fail_first`.
    struct FlakyOpener {
        calls: Arc<AtomicU32>,
        fail_first: u32,
        delay: Duration,
    }

    impl FlakyOpener {
        fn new(fail_first: u32, delay: Duration) -> (Self, Arc<AtomicU32>) {
            let calls = Arc::new(AtomicU32::new(0));
            (
                Self {
                    calls: calls.clone(),
                    fail_first,
                    delay,
                },
                calls,
            )
        }
    }

    #[async_trait]
    impl Opener for FlakyOpener {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn set_state(&self, action: Action) -> Result<(), OpenerError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(self.delay).await;
            if call <= self.fail_first {
                Err(OpenerError::Send {
                    action,
                    source: anyhow::anyhow!("simulated failure {call}"),
                })
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn concurrent_triggers_collapse_to_one_operation() {
        let (opener, calls) = FlakyOpener::new(0, Duration::from_millis(50));
        let door = Door::new("main", fence(), Box::new(opener), Duration::ZERO, 3);

        let first = trigger(&door, Action::Close);
        let second = trigger(&door, Action::Close);
        let third = trigger(&door, Action::Open);

        assert!(first.is_some());
        assert!(second.is_none());
        assert!(third.is_none());
        first.unwrap().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn lock_is_released_after_the_operation() {
        let (opener, _) = FlakyOpener::new(0, Duration::ZERO);
        let door = Door::new("main", fence(), Box::new(opener), Duration::ZERO, 3);

        trigger(&door, Action::Close).unwrap().await.unwrap();
        // free again
        assert!(trigger(&door, Action::Open).is_some());
    }

    #[tokio::test]
    async fn cooldown_keeps_the_door_locked() {
        let (opener, _) = FlakyOpener::new(0, Duration::ZERO);
        let door = Door::new(
            "main",
            fence(),
            Box::new(opener),
            Duration::from_millis(200),
            3,
        );

        let op = trigger(&door, Action::Close).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        // operation itself is done, cooldown still holds the lock
        assert!(trigger(&door, Action::Open).is_none());
        op.await.unwrap();
        assert!(trigger(&door, Action::Open).is_some());
    }

    #[tokio::test]
    async fn failed_operation_retries_until_it_succeeds() {
        let (opener, calls) = FlakyOpener::new(1, Duration::ZERO);
        let door = Door::new("main", fence(), Box::new(opener), Duration::ZERO, 3);

        trigger(&door, Action::Close).unwrap().await.unwrap();
        // one failure plus the successful retry
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn exhausted_retries_still_release_the_lock() {
        let (opener, calls) = FlakyOpener::new(10, Duration::ZERO);
        let door = Door::new("side", fence(), Box::new(opener), Duration::ZERO, 1);

        trigger(&door, Action::Close).unwrap().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(trigger(&door, Action::Open).is_some());
    }
}
