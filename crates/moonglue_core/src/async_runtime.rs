//! Async bridge for plugins
//!
//! Scripts stay synchronous. Plugins that need blocking I/O or timers run it
//! on one shared Tokio runtime and wait for the result.

use std::future::Future;
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tokio::runtime::Runtime as TokioRuntime;

/// Global Tokio runtime for async operations
static TOKIO_RUNTIME: OnceLock<TokioRuntime> = OnceLock::new();

/// Get or create the global Tokio runtime
pub fn get_runtime() -> &'static TokioRuntime {
    TOKIO_RUNTIME.get_or_init(|| {
        TokioRuntime::new().expect("Failed to create Tokio runtime")
    })
}

/// Run a future to completion on the Tokio runtime
pub fn block_on<F: Future>(future: F) -> F::Output {
    get_runtime().block_on(future)
}

/// Run blocking work on the runtime's blocking pool and wait for it.
pub fn run_blocking<F, T>(work: F) -> std::result::Result<T, tokio::task::JoinError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let handle = get_runtime().spawn_blocking(work);
    block_on(handle)
}

/// Sleep inside the runtime.
pub async fn sleep(duration: Duration) {
    tokio::time::sleep(duration).await;
}

/// Sleep for `duration`, returning the time actually slept.
pub fn sleep_blocking(duration: Duration) -> Duration {
    let start = Instant::now();
    block_on(sleep(duration));
    start.elapsed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sleep_blocking() {
        let elapsed = sleep_blocking(Duration::from_millis(100));
        assert!(elapsed >= Duration::from_millis(90));
    }

    #[test]
    fn test_block_on() {
        let result = block_on(async { 42 });
        assert_eq!(result, 42);
    }

    #[test]
    fn test_run_blocking() {
        let result = run_blocking(|| 6 * 7).unwrap();
        assert_eq!(result, 42);
    }

    #[test]
    fn test_bridge_from_thread_outside_runtime() {
        let worker = std::thread::spawn(|| {
            let slept = sleep_blocking(Duration::from_millis(20));
            let value = run_blocking(|| "done").unwrap();
            (slept, value)
        });
        let (slept, value) = worker.join().unwrap();
        assert!(slept >= Duration::from_millis(15));
        assert_eq!(value, "done");
    }
}
