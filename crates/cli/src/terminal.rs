//! Terminal stand-ins for the login view and the loading indicator

use fitmarket_http::{LoadingIndicator, Navigator};
use std::io::{IsTerminal, Write};
use std::sync::atomic::{AtomicUsize, Ordering};

/// There is no login view in a terminal; tell the user how to get back in
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn is_on_login_view(&self) -> bool {
        false
    }

    fn redirect_to_login(&self) {
        eprintln!("Session expired. Run `fitmarket login <username>` to sign in again.");
    }
}

/// Writes a status line to stderr while any request is in flight
///
/// Stays silent when stderr is not a terminal.
#[derive(Debug)]
pub struct TerminalIndicator {
    in_flight: AtomicUsize,
    enabled: bool,
}

impl TerminalIndicator {
    pub fn new() -> Self {
        Self {
            in_flight: AtomicUsize::new(0),
            enabled: std::io::stderr().is_terminal(),
        }
    }
}

impl Default for TerminalIndicator {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadingIndicator for TerminalIndicator {
    fn show(&self) {
        if self.in_flight.fetch_add(1, Ordering::SeqCst) == 0 && self.enabled {
            let mut stderr = std::io::stderr().lock();
            let _ = write!(stderr, "Loading...");
            let _ = stderr.flush();
        }
    }

    fn hide(&self) {
        let previous = self
            .in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if previous == Ok(1) && self.enabled {
            // Erase the status line
            let mut stderr = std::io::stderr().lock();
            let _ = write!(stderr, "\r\x1b[2K");
            let _ = stderr.flush();
        }
    }
}
