//! Periodic flush of buffered diagnostics.

use std::io::{self, Write};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// Spawns a detached thread that flushes the global logger and stderr every
/// `interval` for the rest of the process.
///
/// The thread shares nothing with the extraction; dropping the handle leaves
/// it running.
pub fn spawn_log_flusher(interval: Duration) -> io::Result<JoinHandle<()>> {
    spawn_flusher(interval, || {
        log::logger().flush();
        let _ = io::stderr().flush();
    })
}

pub fn spawn_flusher<F>(interval: Duration, flush: F) -> io::Result<JoinHandle<()>>
where
    F: Fn() + Send + 'static,
{
    thread::Builder::new()
        .name("log-flusher".to_string())
        .spawn(move || loop {
            thread::sleep(interval);
            flush();
        })
}
