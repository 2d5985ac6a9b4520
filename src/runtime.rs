//! Shared tokio runtime backing the blocking API.

use crate::error::{Result, SonoffError};
use log::debug;
use std::future::Future;
use std::sync::OnceLock;
use tokio::runtime::{Builder, Handle, Runtime};

const THREAD_NAME: &str = "rusonoff-rt";

static RUNTIME: OnceLock<std::result::Result<Runtime, String>> = OnceLock::new();

fn shared() -> Result<&'static Runtime> {
    RUNTIME
        .get_or_init(|| {
            debug!("Starting shared runtime");
            Builder::new_multi_thread()
                .enable_all()
                .thread_name(THREAD_NAME)
                .build()
                .map_err(|e| e.to_string())
        })
        .as_ref()
        .map_err(|e| SonoffError::Io(format!("Failed to start runtime: {}", e)))
}

/// Handle of the ambient runtime, or of the shared one outside of any runtime.
pub fn handle() -> Result<Handle> {
    match Handle::try_current() {
        Ok(handle) => Ok(handle),
        Err(_) => Ok(shared()?.handle().clone()),
    }
}

/// Drives `future` to completion on the shared runtime, blocking the calling thread.
///
/// Fails with `InvalidState` when called from inside an async context.
pub fn block_on<T, F>(future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if Handle::try_current().is_ok() {
        return Err(SonoffError::InvalidState(
            "Blocking call made from within an async runtime".into(),
        ));
    }
    shared()?.block_on(future)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_futures_outside_async_context() {
        let value = block_on(async { Ok(21 * 2) }).unwrap();
        assert_eq!(value, 42);
        let err = block_on(async { Err::<(), _>(SonoffError::Timeout) }).unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn refuses_to_block_inside_a_runtime() {
        let err = block_on(async { Ok(()) }).unwrap_err();
        assert!(matches!(err, SonoffError::InvalidState(_)));
        assert!(handle().is_ok());
    }
}
