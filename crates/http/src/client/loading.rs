//! Global loading indicator signalling

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// An application-wide "busy" indicator
///
/// `show` and `hide` are called in pairs, once around every request that
/// does not opt out.
pub trait LoadingIndicator: Send + Sync {
    fn show(&self);
    fn hide(&self);
}

/// Indicator that ignores every signal
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopIndicator;

impl LoadingIndicator for NoopIndicator {
    fn show(&self) {}
    fn hide(&self) {}
}

/// Indicator that counts requests in flight
#[derive(Debug, Default)]
pub struct CountingIndicator {
    in_flight: AtomicUsize,
    shown: AtomicUsize,
    hidden: AtomicUsize,
}

impl CountingIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether at least one request is in flight
    pub fn is_loading(&self) -> bool {
        self.in_flight() > 0
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Total `show` calls so far
    pub fn show_count(&self) -> usize {
        self.shown.load(Ordering::SeqCst)
    }

    /// Total `hide` calls so far
    pub fn hide_count(&self) -> usize {
        self.hidden.load(Ordering::SeqCst)
    }
}

impl LoadingIndicator for CountingIndicator {
    fn show(&self) {
        self.shown.fetch_add(1, Ordering::SeqCst);
        self.in_flight.fetch_add(1, Ordering::SeqCst);
    }

    fn hide(&self) {
        self.hidden.fetch_add(1, Ordering::SeqCst);
        let _ = self
            .in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }
}

/// Shows the indicator on creation and hides it on drop
///
/// Dropping covers every exit: success, error, and cancellation of the
/// request future.
pub(crate) struct LoadingGuard {
    indicator: Option<Arc<dyn LoadingIndicator>>,
}

impl LoadingGuard {
    pub(crate) fn start(indicator: &Arc<dyn LoadingIndicator>, suppressed: bool) -> Self {
        if suppressed {
            return Self { indicator: None };
        }
        indicator.show();
        Self {
            indicator: Some(Arc::clone(indicator)),
        }
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        if let Some(indicator) = self.indicator.take() {
            indicator.hide();
        }
    }
}
