//! Streaming burst deserializer
//!
//! Takes framed sample streams, where every packet carries whole frames of
//! `subsize` elements, and splits them into one-dimensional derived streams:
//!
//! - **Column mode** (`transpose`): one persistent stream per frame column,
//!   fed across packets
//! - **Burst mode**: every frame becomes its own single-packet stream
//!
//! The splitting engine ([`Deserializer`]) is independent of any runtime and
//! writes to a [`StreamSink`]. [`BurstDeserializer`] binds it to the
//! thread-per-node pipeline in [`runtime`].
//!
//! # Example
//!
//! ```
//! use burst_deserializer::{DataPacket, Deserializer, StreamEvent, StreamMetadata, Units};
//!
//! let md = StreamMetadata::new("raster")
//!     .with_subsize(2)
//!     .with_y_axis(0.0, 1.0, Units::Time);
//! let mut engine = Deserializer::new(true);
//! let mut events: Vec<StreamEvent> = Vec::new();
//! engine.process(DataPacket::new(md, vec![1.0, 2.0, 3.0, 4.0], 0), &mut events)?;
//! assert_eq!(engine.registry().output_ids().count(), 2);
//! # Ok::<(), burst_deserializer::WorkError>(())
//! ```

pub mod nodes;
pub mod runtime;

pub use nodes::deserializer::{
    DemuxWarning, Deserializer, DeserializerStats, StreamRegistry, StreamSink, StreamState,
};
pub use nodes::{BurstDeserializer, CollectedStreams, PacketSource, StreamCollector, StreamSummary};

pub use runtime::{
    ConnectionError, DataPacket, InputPort, OutputPacket, OutputPort, Pipeline, PortDirection,
    PortSchema, ProcessNode, SampleMode, Scheduler, StreamEvent, StreamMetadata, TransposeChange,
    Units, WorkError, WorkResult, register_type,
};
