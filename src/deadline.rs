//! Bounded waits on synchronous collaborators
//!
//! `run_with_timeout` runs a blocking call on a named helper thread and
//! waits at most `timeout` for its answer. On timeout the helper is left
//! to finish on its own; its result is discarded.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeadlineError {
    #[error("timed out after {0:?}")]
    Elapsed(Duration),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(String),

    #[error("worker thread panicked")]
    Panicked,
}

/// Run `f` with a deadline
pub fn run_with_timeout<T, F>(name: &str, timeout: Duration, f: F) -> Result<T, DeadlineError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::sync_channel(1);

    thread::Builder::new()
        .name(format!("credence-{}", name))
        .spawn(move || {
            // Receiver may be gone after a timeout
            let _ = tx.send(f());
        })
        .map_err(|e| DeadlineError::Spawn(e.to_string()))?;

    match rx.recv_timeout(timeout) {
        Ok(value) => Ok(value),
        Err(mpsc::RecvTimeoutError::Timeout) => Err(DeadlineError::Elapsed(timeout)),
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(DeadlineError::Panicked),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fast_call_returns_value() {
        let v = run_with_timeout("fast", Duration::from_secs(1), || 41 + 1).unwrap();
        assert_eq!(v, 42);
    }

    #[test]
    fn test_slow_call_times_out() {
        let err = run_with_timeout("slow", Duration::from_millis(20), || {
            thread::sleep(Duration::from_millis(500));
            1
        })
        .unwrap_err();
        assert_eq!(err, DeadlineError::Elapsed(Duration::from_millis(20)));
    }

    #[test]
    fn test_panic_is_reported() {
        let err = run_with_timeout("boom", Duration::from_secs(1), || -> u8 {
            panic!("collaborator exploded")
        })
        .unwrap_err();
        assert_eq!(err, DeadlineError::Panicked);
    }
}
