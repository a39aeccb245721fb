//! Runtime support for streaming node graphs

pub mod errors;
pub mod node;
pub mod packet;
pub mod pipeline;
pub mod ports;
pub mod receiver;
pub mod scheduler;
pub mod sender;
pub mod type_registry;
pub mod watchdog;

pub use errors::{ConnectionError, WorkError, WorkResult};
pub use node::ProcessNode;
pub use packet::{
    DataPacket, OutputPacket, SampleMode, StreamEvent, StreamMetadata, TransposeChange, Units,
};
pub use pipeline::Pipeline;
pub use ports::{ChannelMessage, InputPort, OutputPort, PortDirection, PortSchema, register_type};
pub use receiver::Receiver;
pub use scheduler::Scheduler;
pub use sender::Sender;
pub use watchdog::Watchdog;
