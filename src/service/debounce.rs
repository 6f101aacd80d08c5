use std::future::pending;
use std::time::Duration;

use tokio::time::{Instant, sleep_until};

/// How long search input must sit unchanged before a request goes out.
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(500);

/// Holds the most recent search input until it has rested for the debounce
/// window. Every push replaces the held value and restarts the timer from
/// zero, so only the final state of a burst of keystrokes is ever reported.
pub struct SearchDebouncer {
    delay: Duration,
    pending: Option<(String, Instant)>,
}

impl SearchDebouncer {
    pub fn new(delay: Duration) -> Self {
        SearchDebouncer {
            delay,
            pending: None,
        }
    }

    /// Record a new value and restart the timer.
    pub fn push(&mut self, value: &str) {
        self.pending = Some((value.to_string(), Instant::now() + self.delay));
    }

    /// Resolve with the held value once its timer runs out.
    ///
    /// Pends forever while nothing is queued, so it can sit in a `select!`
    /// arm without spinning. Cancel-safe: the value is only taken out after
    /// the sleep completes, so a wait abandoned by `select!` loses nothing.
    pub async fn settled(&mut self) -> String {
        let deadline = match &self.pending {
            Some((_, deadline)) => *deadline,
            None => pending().await,
        };
        sleep_until(deadline).await;
        match self.pending.take() {
            Some((value, _)) => value,
            None => pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{advance, timeout};

    #[tokio::test(start_paused = true)]
    async fn settles_after_the_full_window() {
        let mut debouncer = SearchDebouncer::new(SEARCH_DEBOUNCE);
        let started = Instant::now();
        debouncer.push("gro");
        let value = debouncer.settled().await;
        assert_eq!(value, "gro");
        assert_eq!(started.elapsed(), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn keystroke_restarts_the_window() {
        let mut debouncer = SearchDebouncer::new(SEARCH_DEBOUNCE);
        let started = Instant::now();
        debouncer.push("g");
        advance(Duration::from_millis(300)).await;
        debouncer.push("gr");
        let value = debouncer.settled().await;
        assert_eq!(value, "gr");
        // 300ms in plus a fresh 500ms window, not 500ms total
        assert_eq!(started.elapsed(), Duration::from_millis(800));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_debouncer_never_resolves() {
        let mut debouncer = SearchDebouncer::new(SEARCH_DEBOUNCE);
        let waited = timeout(Duration::from_secs(60), debouncer.settled()).await;
        assert!(waited.is_err(), "nothing queued, must stay pending");
    }

    #[tokio::test(start_paused = true)]
    async fn value_survives_a_dropped_wait() {
        let mut debouncer = SearchDebouncer::new(SEARCH_DEBOUNCE);
        debouncer.push("keep");
        drop(debouncer.settled());
        let value = debouncer.settled().await;
        assert_eq!(value, "keep");
    }
}
