//! Tracing setup shared by the two binaries.

use std::io;
use tracing_subscriber::EnvFilter;

/// Install the stderr fmt subscriber.
///
/// `RUST_LOG` wins when set. Otherwise INFO-level library logs are
/// suppressed while a progress bar is on screen, since the bar already
/// reports every reference.
pub fn init_tracing(verbose: bool, quiet: bool, show_progress: bool) {
    let filter = default_filter(verbose, quiet, show_progress);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();
}

fn default_filter(verbose: bool, quiet: bool, show_progress: bool) -> &'static str {
    if verbose {
        "debug"
    } else if quiet || show_progress {
        "error"
    } else {
        "info"
    }
}

#[cfg(test)]
mod tests {
    use super::default_filter;

    #[test]
    fn verbose_beats_progress_and_quiet() {
        assert_eq!(default_filter(true, true, true), "debug");
        assert_eq!(default_filter(false, false, true), "error");
        assert_eq!(default_filter(false, true, false), "error");
        assert_eq!(default_filter(false, false, false), "info");
    }
}
