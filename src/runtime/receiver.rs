//! End-of-stream aware channel receiver
//!
//! [`Receiver`] borrows a port's crossbeam receiver for one `work()` call,
//! unwraps [`ChannelMessage`] and latches end-of-stream in the port so later
//! calls return `Shutdown` without touching the channel again.

use crossbeam_channel::{Receiver as CrossbeamReceiver, TryRecvError};
use std::sync::atomic::{AtomicBool, Ordering};

use super::errors::{WorkError, WorkResult};
use super::sender::ChannelMessage;
use super::watchdog::{OperationGuard, WatchdogHandle};

pub struct Receiver<'a, T> {
    receiver: &'a CrossbeamReceiver<ChannelMessage<T>>,
    eos: &'a AtomicBool,
    watchdog_handle: Option<WatchdogHandle>,
}

impl<'a, T> Receiver<'a, T> {
    pub fn new(
        receiver: &'a CrossbeamReceiver<ChannelMessage<T>>,
        eos: &'a AtomicBool,
        watchdog_handle: Option<WatchdogHandle>,
    ) -> Self {
        Self {
            receiver,
            eos,
            watchdog_handle,
        }
    }

    /// End-of-stream has been seen on this channel
    pub fn is_finished(&self) -> bool {
        self.eos.load(Ordering::Relaxed)
    }

    /// Blocking receive.
    ///
    /// Returns `Err(WorkError::Shutdown)` once the sender has closed the
    /// stream or every sender has been dropped.
    pub fn recv(&mut self) -> WorkResult<T> {
        if self.is_finished() {
            return Err(WorkError::Shutdown);
        }

        let _guard = self.watchdog_handle.as_ref().map(OperationGuard::new);
        match self.receiver.recv() {
            Ok(ChannelMessage::Item(item)) => Ok(item),
            Ok(ChannelMessage::EndOfStream) => {
                self.eos.store(true, Ordering::Relaxed);
                tracing::debug!("Receiver::recv() - EndOfStream received");
                Err(WorkError::Shutdown)
            }
            Err(_) => {
                self.eos.store(true, Ordering::Relaxed);
                tracing::debug!("Receiver::recv() - channel disconnected, returning Shutdown");
                Err(WorkError::Shutdown)
            }
        }
    }

    /// Non-blocking receive
    pub fn try_recv(&mut self) -> Result<T, TryRecvError> {
        if self.is_finished() {
            return Err(TryRecvError::Disconnected);
        }

        match self.receiver.try_recv() {
            Ok(ChannelMessage::Item(item)) => Ok(item),
            Ok(ChannelMessage::EndOfStream) | Err(TryRecvError::Disconnected) => {
                self.eos.store(true, Ordering::Relaxed);
                Err(TryRecvError::Disconnected)
            }
            Err(TryRecvError::Empty) => Err(TryRecvError::Empty),
        }
    }

    /// Drain everything currently queued without blocking
    pub fn drain(&mut self) -> Vec<T> {
        let mut items = Vec::new();
        while let Ok(item) = self.try_recv() {
            items.push(item);
        }
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    #[test]
    fn test_recv_unwraps_items() {
        let (tx, rx) = bounded::<ChannelMessage<i32>>(10);
        let eos = AtomicBool::new(false);
        let mut r = Receiver::new(&rx, &eos, None);

        tx.send(ChannelMessage::Item(42)).unwrap();
        assert_eq!(r.recv().unwrap(), 42);
    }

    #[test]
    fn test_eos_latches_shutdown() {
        let (tx, rx) = bounded::<ChannelMessage<i32>>(10);
        let eos = AtomicBool::new(false);

        tx.send(ChannelMessage::Item(1)).unwrap();
        tx.send(ChannelMessage::EndOfStream).unwrap();
        tx.send(ChannelMessage::Item(2)).unwrap();

        {
            let mut r = Receiver::new(&rx, &eos, None);
            assert_eq!(r.recv().unwrap(), 1);
            assert!(matches!(r.recv(), Err(WorkError::Shutdown)));
        }

        // A receiver built for the next work() call still sees the latch
        let mut r = Receiver::new(&rx, &eos, None);
        assert!(r.is_finished());
        assert!(matches!(r.recv(), Err(WorkError::Shutdown)));
        assert_eq!(r.try_recv(), Err(TryRecvError::Disconnected));
    }

    #[test]
    fn test_disconnect_is_shutdown() {
        let (tx, rx) = bounded::<ChannelMessage<i32>>(10);
        let eos = AtomicBool::new(false);
        let mut r = Receiver::new(&rx, &eos, None);

        drop(tx);
        assert!(matches!(r.recv(), Err(WorkError::Shutdown)));
    }

    #[test]
    fn test_try_recv_and_drain() {
        let (tx, rx) = bounded::<ChannelMessage<i32>>(10);
        let eos = AtomicBool::new(false);
        let mut r = Receiver::new(&rx, &eos, None);

        assert_eq!(r.try_recv(), Err(TryRecvError::Empty));
        tx.send(ChannelMessage::Item(3)).unwrap();
        tx.send(ChannelMessage::Item(4)).unwrap();
        assert_eq!(r.drain(), vec![3, 4]);
        assert!(!r.is_finished());
    }
}
