//! Trailing-edge debounce keyed on tokio time.
//!
//! A burst of pushes collapses into one pending value: each push replaces
//! the previous value and moves the deadline, so only the latest value is
//! delivered, once, after the window has been quiet.

use std::time::Duration;

use tokio::time::{Instant, sleep_until};

#[derive(Debug)]
pub struct Debounce<T> {
    window: Duration,
    pending: Option<(Instant, T)>,
}

impl<T> Debounce<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    pub fn push(&mut self, value: T, now: Instant) {
        self.pending = Some((now + self.window, value));
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(at, _)| *at)
    }

    /// Take the pending value if its deadline has passed.
    pub fn take_due(&mut self, now: Instant) -> Option<T> {
        match self.pending.take() {
            Some((at, value)) if at <= now => Some(value),
            other => {
                self.pending = other;
                None
            }
        }
    }
}

/// Sleep until `deadline`, or forever when there is none.
pub async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(200);

    #[test]
    fn latest_value_wins() {
        let t0 = Instant::now();
        let mut d = Debounce::new(WINDOW);
        d.push(false, t0);
        d.push(true, t0 + Duration::from_millis(50));
        d.push(false, t0 + Duration::from_millis(90));

        assert_eq!(d.deadline(), Some(t0 + Duration::from_millis(290)));
        assert_eq!(d.take_due(t0 + Duration::from_millis(289)), None);
        assert!(d.deadline().is_some());
        assert_eq!(d.take_due(t0 + Duration::from_millis(290)), Some(false));
        assert_eq!(d.deadline(), None);
        assert_eq!(d.take_due(t0 + Duration::from_secs(10)), None);
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_until_deadline_waits_for_deadline() {
        let start = Instant::now();
        sleep_until_deadline(Some(start + WINDOW)).await;
        assert!(Instant::now() >= start + WINDOW);
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_without_deadline_never_fires() {
        let fired = tokio::time::timeout(Duration::from_secs(60), sleep_until_deadline(None)).await;
        assert!(fired.is_err());
    }
}
