//! Type-erased port wrappers and port schemas
//!
//! Nodes see their channels as slices of [`InputPort`] and [`OutputPort`] and
//! recover the typed endpoint with `get::<T>()`. A port that was left
//! unconnected holds a unit placeholder, so `get` returns `None`.

use crossbeam_channel::Receiver as CrossbeamReceiver;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::atomic::AtomicBool;

pub use super::errors::ConnectionError;
pub use super::pipeline::Pipeline;
pub use super::receiver::Receiver;
pub use super::sender::{ChannelMessage, Sender};
pub use super::type_registry::register_type;

use super::watchdog::{Watchdog, WatchdogHandle};

/// Direction of a port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    Input,
    Output,
}

/// Name, item type and position of a port
#[derive(Debug, Clone)]
pub struct PortSchema {
    pub name: String,
    pub type_id: TypeId,
    pub index: usize,
    pub direction: PortDirection,
}

impl PortSchema {
    pub fn new<T: 'static>(name: impl Into<String>, index: usize, direction: PortDirection) -> Self {
        Self {
            name: name.into(),
            type_id: TypeId::of::<T>(),
            index,
            direction,
        }
    }
}

/// Type-erased input port wrapping a crossbeam receiver of `ChannelMessage<T>`
pub struct InputPort {
    channel: Box<dyn Any + Send>,
    /// Latched end-of-stream, kept here so it survives across work() calls
    eos: AtomicBool,
    watchdog_handle: Option<WatchdogHandle>,
}

impl InputPort {
    pub(crate) fn from_type_erased(channel: Box<dyn Any + Send>) -> Self {
        Self {
            channel,
            eos: AtomicBool::new(false),
            watchdog_handle: None,
        }
    }

    /// Unconnected port
    pub fn unconnected() -> Self {
        Self::from_type_erased(Box::new(()))
    }

    /// Wrap a receiver directly, for driving nodes outside a pipeline.
    pub fn new_with_watchdog<T: Send + 'static>(
        receiver: CrossbeamReceiver<ChannelMessage<T>>,
        watchdog: &Watchdog,
        node_name: &str,
        port_name: &str,
    ) -> Self {
        Self::from_type_erased(Box::new(receiver)).with_watchdog(watchdog, node_name, port_name)
    }

    pub(crate) fn with_watchdog(mut self, watchdog: &Watchdog, node_name: &str, port_name: &str) -> Self {
        self.watchdog_handle = Some(watchdog.register_port(node_name, "recv", port_name));
        self
    }

    pub fn is_connected(&self) -> bool {
        !self.channel.is::<()>()
    }

    /// Typed receiver for this port, or `None` if the port does not carry `T`
    pub fn get<T: Send + 'static>(&self) -> Option<Receiver<'_, T>> {
        let receiver = self.channel.downcast_ref::<CrossbeamReceiver<ChannelMessage<T>>>()?;
        Some(Receiver::new(receiver, &self.eos, self.watchdog_handle.clone()))
    }
}

impl fmt::Debug for InputPort {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "InputPort(connected={})", self.is_connected())
    }
}

/// Type-erased output port wrapping a broadcast `Sender<T>`
pub struct OutputPort {
    channel: Box<dyn Any + Send>,
    watchdog_handle: Option<WatchdogHandle>,
}

impl OutputPort {
    pub(crate) fn from_type_erased(channel: Box<dyn Any + Send>) -> Self {
        Self {
            channel,
            watchdog_handle: None,
        }
    }

    /// Unconnected port
    pub fn unconnected() -> Self {
        Self::from_type_erased(Box::new(()))
    }

    /// Wrap a sender directly, for driving nodes outside a pipeline.
    pub fn new_with_watchdog<T: Send + Clone + 'static>(
        sender: Sender<T>,
        watchdog: &Watchdog,
        node_name: &str,
        port_name: &str,
    ) -> Self {
        Self::from_type_erased(Box::new(sender)).with_watchdog(watchdog, node_name, port_name)
    }

    pub(crate) fn with_watchdog(mut self, watchdog: &Watchdog, node_name: &str, port_name: &str) -> Self {
        self.watchdog_handle = Some(watchdog.register_port(node_name, "send", port_name));
        self
    }

    pub fn is_connected(&self) -> bool {
        !self.channel.is::<()>()
    }

    /// Typed sender for this port, or `None` if the port does not carry `T`
    pub fn get<T: Send + Clone + 'static>(&self) -> Option<Sender<T>> {
        let sender = self.channel.downcast_ref::<Sender<T>>()?;
        Some(match &self.watchdog_handle {
            Some(handle) => sender.with_watchdog(handle.clone()),
            None => sender.clone(),
        })
    }
}

impl fmt::Debug for OutputPort {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "OutputPort(connected={})", self.is_connected())
    }
}
