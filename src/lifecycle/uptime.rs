//! Process uptime.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

static PROCESS_START: OnceLock<Instant> = OnceLock::new();

/// Pin the process start time. The first call wins; `main` calls it before
/// anything else.
pub fn mark_process_start() -> Instant {
    *PROCESS_START.get_or_init(Instant::now)
}

/// Time elapsed since `mark_process_start` first ran.
pub fn process_uptime() -> Duration {
    mark_process_start().elapsed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_is_pinned_and_uptime_grows() {
        let first = mark_process_start();
        assert_eq!(mark_process_start(), first);

        let before = process_uptime();
        std::thread::sleep(Duration::from_millis(5));
        assert!(process_uptime() > before);
    }
}
