use tokio::sync::watch;

/// Broadcast event that fires at most once.
///
/// Any number of tasks can [`wait`](OneShotEvent::wait) on it; once fired it
/// stays fired and every present and future waiter returns immediately.
#[derive(Debug)]
pub struct OneShotEvent {
    tx: watch::Sender<bool>,
}

impl OneShotEvent {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Fire the event. Returns `true` only for the call that performed the
    /// transition.
    pub fn fire(&self) -> bool {
        self.tx.send_if_modified(|fired| {
            if *fired {
                false
            } else {
                *fired = true;
                true
            }
        })
    }

    pub fn is_fired(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until the event fires.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|fired| *fired).await;
    }
}

impl Default for OneShotEvent {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_fire_transitions_once() {
        let event = OneShotEvent::new();
        assert!(!event.is_fired());
        assert!(event.fire());
        assert!(event.is_fired());
        assert!(!event.fire());
        assert!(event.is_fired());
    }

    #[tokio::test]
    async fn test_wait_returns_immediately_when_fired() {
        let event = OneShotEvent::new();
        event.fire();
        tokio::time::timeout(Duration::from_millis(50), event.wait())
            .await
            .expect("fired event must not block");
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_blocks_until_fired() {
        let event = OneShotEvent::new();
        let result = tokio::time::timeout(Duration::from_secs(1), event.wait()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_all_waiters_are_released() {
        let event = Arc::new(OneShotEvent::new());

        let waiters: Vec<_> = (0..10)
            .map(|_| {
                let event = event.clone();
                tokio::spawn(async move { event.wait().await })
            })
            .collect();

        tokio::task::yield_now().await;
        assert!(event.fire());

        for waiter in waiters {
            tokio::time::timeout(Duration::from_secs(1), waiter)
                .await
                .expect("waiter released")
                .expect("waiter task");
        }
    }

    #[tokio::test]
    async fn test_concurrent_fire_has_single_winner() {
        let event = Arc::new(OneShotEvent::new());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let event = event.clone();
                tokio::spawn(async move { event.fire() })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
