// SPDX-License-Identifier: MIT
//
// Blocking-pool dispatch for the async read/write wrappers.
//
// A job queued on the blocking pool can sit behind other work for a while.
// Until it actually starts, cancelling the token must win: the caller gets
// `Cancelled` at once and the job, when the pool finally reaches it, does
// nothing. Once the native call is under way it runs to completion and its
// result is returned, so bytes are never consumed and then dropped.
//
// The job and the waiting caller race for one `claimed` flag. Whoever sets
// it first decides whether the native call happens.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;

use crate::error::{TerminalError, TerminalResult};

/// Run `job` on tokio's blocking pool on behalf of `stream`.
pub(crate) async fn dispatch<T, F>(
    stream: &'static str,
    cancel: &CancellationToken,
    job: F,
) -> TerminalResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> TerminalResult<T> + Send + 'static,
{
    if cancel.is_cancelled() {
        return Err(TerminalError::Cancelled { stream });
    }

    let claimed = Arc::new(AtomicBool::new(false));
    let mut task = tokio::task::spawn_blocking({
        let claimed = Arc::clone(&claimed);
        let cancel = cancel.clone();
        move || {
            if cancel.is_cancelled() || claimed.swap(true, Ordering::AcqRel) {
                return Err(TerminalError::Cancelled { stream });
            }
            job()
        }
    });

    let joined = match cancel.run_until_cancelled(&mut task).await {
        Some(joined) => joined,
        None if !claimed.swap(true, Ordering::AcqRel) => {
            tracing::debug!(stream, "cancelled before dispatch");
            return Err(TerminalError::Cancelled { stream });
        }
        // Already running; wait it out.
        None => task.await,
    };
    joined.map_err(|source| TerminalError::Task { stream, source })?
}
