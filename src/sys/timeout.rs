//! Bounded waits on calls into the window server.

use std::thread;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use tracing::warn;

use super::window_server::CaptureError;

/// Runs `f` on a worker thread and waits at most `timeout` for its result.
///
/// A call that does not finish in time is abandoned; its result is dropped
/// when it eventually arrives.
pub fn call_with_timeout<T, F>(name: &'static str, timeout: Duration, f: F) -> Result<T, CaptureError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = crossbeam_channel::bounded(1);
    let spawned = thread::Builder::new().name(format!("bounded-{name}")).spawn(move || {
        _ = tx.send(f());
    });
    if let Err(e) = spawned {
        return Err(CaptureError::Platform(format!("could not spawn {name} worker: {e}")));
    }
    match rx.recv_timeout(timeout) {
        Ok(value) => Ok(value),
        Err(RecvTimeoutError::Timeout) => {
            warn!("{name} did not finish within {timeout:?}");
            Err(CaptureError::TimedOut(timeout))
        }
        Err(RecvTimeoutError::Disconnected) => {
            Err(CaptureError::Platform(format!("{name} worker exited without a result")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_value_when_fast() {
        let v = call_with_timeout("fast", Duration::from_secs(1), || 7).unwrap();
        assert_eq!(v, 7);
    }

    #[test]
    fn times_out_instead_of_blocking() {
        let res = call_with_timeout("slow", Duration::from_millis(20), || {
            thread::sleep(Duration::from_millis(500));
            1
        });
        assert!(matches!(res, Err(CaptureError::TimedOut(_))));
    }

    #[test]
    fn panicking_worker_is_a_failure() {
        let res: Result<(), _> =
            call_with_timeout("panics", Duration::from_secs(1), || panic!("boom"));
        assert!(matches!(res, Err(CaptureError::Platform(_))));
    }
}
