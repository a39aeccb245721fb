//! Processing nodes
//!
//! - **BurstDeserializer**: splits framed streams into column or burst streams
//! - **PacketSource**: replays prepared packets into a pipeline
//! - **StreamCollector**: records derived-stream events for inspection
//!
//! # Examples
//!
//! ```no_run
//! use burst_deserializer::nodes::{BurstDeserializer, PacketSource, StreamCollector};
//! use burst_deserializer::runtime::Pipeline;
//!
//! let collector = StreamCollector::new();
//! let streams = collector.handle();
//!
//! let mut pipeline = Pipeline::new();
//! pipeline.add_process("source", PacketSource::new(Vec::new()))?;
//! pipeline.add_process("deser", BurstDeserializer::new(true))?;
//! pipeline.add_process("sink", collector)?;
//! pipeline.connect("source", "out", "deser", "data_in")?;
//! pipeline.connect("deser", "data_out", "sink", "in")?;
//! pipeline.build()?.wait();
//! println!("{} derived streams", streams.streams().len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod deserializer;
mod packet_source;
mod stream_collector;

pub use deserializer::BurstDeserializer;
pub use packet_source::PacketSource;
pub use stream_collector::{CollectedStreams, StreamCollector, StreamSummary};
