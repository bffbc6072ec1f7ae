//! Shared CLI helpers

use owo_colors::OwoColorize;
use std::sync::atomic::{AtomicBool, Ordering};

/// Print an informational line to stderr
pub fn print_info(msg: &str) {
    eprintln!("{} {}", "info:".cyan(), msg);
}

/// Print a success line to stderr
pub fn print_success(msg: &str) {
    eprintln!("{} {}", "ok:".green(), msg);
}

/// One-shot startup notices
///
/// Held by the caller and passed to long-running components; each notice is
/// emitted at most once per process.
#[derive(Debug, Default)]
pub struct Notices {
    licensing_shown: AtomicBool,
}

impl Notices {
    /// Emit the licensing notice, once
    pub fn licensing(&self) {
        if !self.licensing_shown.swap(true, Ordering::Relaxed) {
            eprintln!(
                "{}",
                "genie is licensed under BUSL-1.1; production use by for-profit \
                 organizations requires a commercial license."
                    .dimmed()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn licensing_notice_flag_flips_once() {
        let notices = Notices::default();
        assert!(!notices.licensing_shown.load(Ordering::Relaxed));
        notices.licensing();
        assert!(notices.licensing_shown.load(Ordering::Relaxed));
        // Second emit is a no-op
        notices.licensing();
        assert!(notices.licensing_shown.load(Ordering::Relaxed));
    }

    #[test]
    fn separate_notices_are_independent() {
        let a = Notices::default();
        let b = Notices::default();
        a.licensing();
        assert!(a.licensing_shown.load(Ordering::Relaxed));
        assert!(!b.licensing_shown.load(Ordering::Relaxed));
    }

    #[test]
    fn print_helpers_do_not_panic() {
        print_info("i");
        print_success("s");
    }
}
