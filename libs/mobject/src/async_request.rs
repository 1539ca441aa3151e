use std::fmt;

use serde_json::Value;
use tokio::task::JoinHandle;

use crate::error::Error;
use crate::transport::TransportError;

type Completion<T> = Box<dyn FnOnce(Value) -> Result<T, Error> + Send>;

/// A call issued in the background.
///
/// The request is already in flight when this is returned. [`wait`](Self::wait)
/// takes `self`, so a request can be completed only once. Dropping it
/// detaches the call; the provider still runs it.
#[must_use = "the reply is lost unless `wait` is called"]
pub struct AsyncRequest<T> {
    pending: JoinHandle<Result<Value, TransportError>>,
    complete: Completion<T>,
}

impl<T> AsyncRequest<T> {
    pub(crate) fn new(
        pending: JoinHandle<Result<Value, TransportError>>,
        complete: impl FnOnce(Value) -> Result<T, Error> + Send + 'static,
    ) -> Self {
        Self {
            pending,
            complete: Box::new(complete),
        }
    }

    /// Suspend the calling task until the reply arrives, then decode it.
    pub async fn wait(self) -> Result<T, Error> {
        let reply = self.pending.await.map_err(TransportError::from)??;
        (self.complete)(reply)
    }

    /// Whether the reply has arrived. Does not consume the request.
    pub fn is_completed(&self) -> bool {
        self.pending.is_finished()
    }
}

impl<T> fmt::Debug for AsyncRequest<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncRequest")
            .field("completed", &self.is_completed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::ErrorKind;
    use serde_json::json;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn wait_runs_completion_on_reply() {
        let (tx, rx) = oneshot::channel::<Value>();
        let pending = tokio::spawn(async move { Ok::<_, TransportError>(rx.await.unwrap_or(Value::Null)) });
        let req = AsyncRequest::new(pending, |v| Ok(v["value"].as_i64().unwrap_or(-1)));

        assert!(!req.is_completed());
        tx.send(json!({"value": 93})).unwrap();
        assert_eq!(req.wait().await.unwrap(), 93);
    }

    #[tokio::test]
    async fn completion_errors_propagate() {
        let pending = tokio::spawn(async { Ok::<_, TransportError>(json!(null)) });
        let req: AsyncRequest<i32> = AsyncRequest::new(pending, |_| {
            Err(Error::Remote {
                kind: ErrorKind::NotFound,
                message: "gone".into(),
            })
        });
        let err = req.wait().await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "gone");
    }

    #[tokio::test]
    async fn transport_failure_skips_completion() {
        let pending = tokio::spawn(async { Err::<Value, _>(TransportError::NoSuchProvider(9)) });
        let req: AsyncRequest<i32> = AsyncRequest::new(pending, |_| unreachable!());
        assert!(matches!(
            req.wait().await,
            Err(Error::Transport(TransportError::NoSuchProvider(9)))
        ));
    }
}
