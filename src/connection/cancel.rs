use crate::connection::ConnectionError;
use tokio::sync::watch;

/// Read side of the cooperative cancellation signal.
///
/// Checked before every remote command; commands already running are left
/// to finish.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

/// Write side of the cancellation signal.
#[derive(Debug)]
pub struct Canceller {
    tx: watch::Sender<bool>,
}

impl Canceller {
    pub fn new() -> (Canceller, CancelSignal) {
        let (tx, rx) = watch::channel(false);
        (Canceller { tx }, CancelSignal { rx })
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl CancelSignal {
    /// A signal that is never raised.
    pub fn never() -> Self {
        Canceller::new().1
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    pub fn check(&self) -> Result<(), ConnectionError> {
        if self.is_cancelled() {
            return Err(ConnectionError::Cancelled);
        }
        Ok(())
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::never()
    }
}
