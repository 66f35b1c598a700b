use tokio::sync::oneshot;

use super::SdkError;

/// Sending half of a one-shot SDK callback. Consumed on use, so a request can
/// settle at most once.
#[derive(Debug)]
pub struct Responder<T> {
    tx: oneshot::Sender<T>,
}

/// Receiving half of a one-shot SDK callback.
#[derive(Debug)]
pub struct Pending<T> {
    rx: oneshot::Receiver<T>,
}

/// Creates a linked responder/pending pair for one SDK request.
pub fn once<T>() -> (Responder<T>, Pending<T>) {
    let (tx, rx) = oneshot::channel();
    (Responder { tx }, Pending { rx })
}

impl<T> Responder<T> {
    /// Delivers the result. Returns `false` when nobody is waiting anymore.
    pub fn respond(self, value: T) -> bool {
        self.tx.send(value).is_ok()
    }
}

impl<T> Pending<T> {
    /// A request that has already settled.
    pub fn ready(value: T) -> Self {
        let (responder, pending) = once();
        responder.respond(value);
        pending
    }

    /// Waits for the SDK to answer. Fails when the responder was dropped
    /// without ever being invoked.
    pub async fn wait(self) -> Result<T, SdkError> {
        self.rx.await.map_err(|_| SdkError::CallbackDropped)
    }
}
