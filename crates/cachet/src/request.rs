//! Requests whose reply is collected later.

use serde_json::Value;

use crate::error::Result;
use crate::peer::PendingCall;

type Completion<T> = Box<dyn FnOnce(Value) -> Result<T> + Send>;

/// An operation in flight.
///
/// [`wait`](Self::wait) consumes the request, so its reply is read at most once.
/// Dropping the request abandons the reply; the call itself still runs remotely.
pub struct AsyncRequest<T> {
    pending: PendingCall,
    complete: Completion<T>,
}

impl<T> AsyncRequest<T> {
    pub(crate) fn new(
        pending: PendingCall,
        complete: impl FnOnce(Value) -> Result<T> + Send + 'static,
    ) -> Self {
        Self {
            pending,
            complete: Box::new(complete),
        }
    }

    /// Blocks the task until the reply arrives, then decodes it.
    pub async fn wait(self) -> Result<T> {
        let Self { pending, complete } = self;
        let value = pending.wait().await?;
        complete(value)
    }
}

impl<T> std::fmt::Debug for AsyncRequest<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncRequest")
            .field("seq", &self.pending.seq())
            .finish()
    }
}
