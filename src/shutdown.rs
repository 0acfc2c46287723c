//! Shutdown notification shared between the accept loop and handlers.
//!
//! The server owns a [`ShutdownTrigger`]; every request carries a cheap
//! [`ShutdownWatch`] clone so long-running handlers can notice that the
//! process is draining (see [`Context`](crate::Context)).

use tokio::sync::watch;

pub(crate) fn channel() -> (ShutdownTrigger, ShutdownWatch) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger(tx), ShutdownWatch(rx))
}

#[derive(Debug)]
pub(crate) struct ShutdownTrigger(watch::Sender<bool>);

impl ShutdownTrigger {
    /// Idempotent.
    pub(crate) fn trigger(&self) {
        self.0.send_replace(true);
    }
}

#[derive(Clone, Debug)]
pub(crate) struct ShutdownWatch(watch::Receiver<bool>);

impl ShutdownWatch {
    pub(crate) fn is_triggered(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once shutdown begins, immediately if it already has. Also
    /// resolves if the server was dropped without triggering.
    pub(crate) async fn triggered(mut self) {
        let _ = self.0.wait_for(|v| *v).await;
    }
}
