use std::io;

use anyhow::{anyhow, Result};
#[cfg(all(test, not(rust_analyzer)))]
use crate::utils::mock_ic0::time;
#[cfg(any(not(test), rust_analyzer))]
use ic_cdk::api::time;

/// Current time in nanoseconds since the epoch.
pub fn now() -> u64 {
    time()
}

/// Forwards formatted log lines to the canister log.
struct CanisterLog;

impl io::Write for CanisterLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let line = String::from_utf8_lossy(buf);
        let line = line.trim_end();
        if !line.is_empty() {
            ic_cdk::api::print(line);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Installs the global `tracing` subscriber. Wasm has no wall clock for the
/// formatter, so timestamps are left out; the canister log adds its own.
pub fn init_logging() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(|| CanisterLog)
        .with_max_level(tracing::Level::INFO)
        .without_time()
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow!("failed to install log subscriber: {err}"))
}
