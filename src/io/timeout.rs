//! Bounded waiting on blocking collaborator calls.

use std::thread;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;

use crate::error::{Error, Result};

/// Run `f` on a helper thread and wait at most `timeout` for its result.
///
/// With `None` the call runs inline. A timed-out call keeps running in the
/// background; its result is discarded.
pub(crate) fn with_timeout<T, F>(timeout: Option<Duration>, what: &str, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let Some(timeout) = timeout else {
        return f();
    };

    let (tx, rx) = crossbeam_channel::bounded(1);
    thread::Builder::new()
        .name("onemd-io".to_string())
        .spawn(move || {
            let _ = tx.send(f());
        })?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(Error::Timeout(format!(
            "{} after {} ms",
            what,
            timeout.as_millis()
        ))),
        Err(RecvTimeoutError::Disconnected) => {
            Err(Error::Other(format!("{} worker exited without a result", what)))
        }
    }
}
