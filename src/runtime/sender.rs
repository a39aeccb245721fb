//! Broadcast sender with watchdog monitoring

use crossbeam_channel::{SendError, Sender as CrossbeamSender};

use super::watchdog::{OperationGuard, WatchdogHandle};

/// Channel message wrapper for end-of-stream signaling
///
/// Nodes never see this directly: `Sender::send()` wraps values in `Item`,
/// `Sender::close()` sends `EndOfStream`, and `Receiver` unwraps both.
/// An explicit marker is needed because dropping a node's sender does not
/// close the channel while the port still holds its own handle.
#[derive(Clone, Debug)]
pub enum ChannelMessage<T> {
    Item(T),
    EndOfStream,
}

/// Sender that broadcasts every value to all connected consumers
pub struct Sender<T> {
    destinations: Vec<CrossbeamSender<ChannelMessage<T>>>,
    watchdog_handle: Option<WatchdogHandle>,
}

impl<T: Clone> Sender<T> {
    pub fn new(destinations: Vec<CrossbeamSender<ChannelMessage<T>>>) -> Self {
        Self {
            destinations,
            watchdog_handle: None,
        }
    }

    /// Copy of this sender monitored by `watchdog_handle`
    pub fn with_watchdog(&self, watchdog_handle: WatchdogHandle) -> Self {
        Self {
            destinations: self.destinations.clone(),
            watchdog_handle: Some(watchdog_handle),
        }
    }

    /// Send a value to all destinations, blocking while any is full.
    ///
    /// Fails only when every destination has disconnected.
    pub fn send(&self, value: T) -> Result<(), SendError<T>> {
        let Some((last, rest)) = self.destinations.split_last() else {
            return Ok(());
        };

        let _guard = self.watchdog_handle.as_ref().map(OperationGuard::new);

        let mut delivered = false;
        for dest in rest {
            delivered |= dest.send(ChannelMessage::Item(value.clone())).is_ok();
        }
        match last.send(ChannelMessage::Item(value)) {
            Ok(()) => Ok(()),
            Err(SendError(ChannelMessage::Item(v))) if !delivered => Err(SendError(v)),
            Err(_) => Ok(()),
        }
    }

    /// Signal end-of-stream to all destinations.
    ///
    /// Downstream receivers return `WorkError::Shutdown` from then on.
    pub fn close(&self) {
        let _guard = self.watchdog_handle.as_ref().map(OperationGuard::new);
        for dest in &self.destinations {
            let _ = dest.send(ChannelMessage::EndOfStream);
        }
    }
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        Self {
            destinations: self.destinations.clone(),
            watchdog_handle: self.watchdog_handle.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    #[test]
    fn test_broadcast_reaches_every_destination() {
        let (tx1, rx1) = bounded::<ChannelMessage<u32>>(4);
        let (tx2, rx2) = bounded::<ChannelMessage<u32>>(4);
        let sender = Sender::new(vec![tx1, tx2]);

        sender.send(7).unwrap();
        assert!(matches!(rx1.try_recv(), Ok(ChannelMessage::Item(7))));
        assert!(matches!(rx2.try_recv(), Ok(ChannelMessage::Item(7))));
    }

    #[test]
    fn test_send_fails_only_when_all_disconnected() {
        let (tx1, rx1) = bounded::<ChannelMessage<u32>>(4);
        let (tx2, rx2) = bounded::<ChannelMessage<u32>>(4);
        let sender = Sender::new(vec![tx1, tx2]);

        drop(rx2);
        assert!(sender.send(1).is_ok());

        drop(rx1);
        assert_eq!(sender.send(2), Err(SendError(2)));
    }

    #[test]
    fn test_unconnected_sender_discards() {
        let sender = Sender::<u32>::new(Vec::new());
        assert!(sender.send(3).is_ok());
    }

    #[test]
    fn test_close_sends_marker() {
        let (tx, rx) = bounded::<ChannelMessage<u32>>(4);
        let sender = Sender::new(vec![tx]);
        sender.close();
        assert!(matches!(rx.try_recv(), Ok(ChannelMessage::EndOfStream)));
    }
}
