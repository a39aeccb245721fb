//! Burst deserializer node
//!
//! Splits framed sample streams into derived one-dimensional streams, either
//! one persistent stream per frame column (`transpose` set) or one terminated
//! stream per frame (`transpose` clear).
//!
//! Ports:
//! - `data_in` (0): [`DataPacket`] from any number of source streams
//! - `transpose` (1, optional): [`TransposeChange`] notifications
//! - `data_out` (0): [`StreamEvent`] metadata and data for derived streams

mod burst;
mod column;
mod engine;
mod metadata;
mod registry;
mod sink;
mod warnings;

pub use column::strided_copy;
pub use engine::Deserializer;
pub use registry::{StreamRegistry, StreamState};
pub use sink::StreamSink;
pub use warnings::{DemuxWarning, DeserializerStats};

use crate::runtime::node::{InputPort, OutputPort, ProcessNode, WorkError, WorkResult};
use crate::runtime::ports::{PortDirection, PortSchema};
use crate::runtime::{DataPacket, Sender, StreamEvent, TransposeChange};
use tracing::{debug, info};

pub struct BurstDeserializer {
    name: String,
    engine: Deserializer,
    last_timestamp: u64,
    finished: bool,
    work_call_count: usize,
}

impl BurstDeserializer {
    /// Create a deserializer starting in column mode (`transpose`) or burst mode
    pub fn new(transpose: bool) -> Self {
        Self {
            name: "burst_deserializer".to_string(),
            engine: Deserializer::new(transpose),
            last_timestamp: 0,
            finished: false,
            work_call_count: 0,
        }
    }

    /// With custom name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn engine(&self) -> &Deserializer {
        &self.engine
    }

    /// Input is exhausted: end every open derived stream and close the output
    fn shut_down(&mut self, output: &mut Sender<StreamEvent>) -> WorkResult<usize> {
        let terminated = self.engine.finish(self.last_timestamp, output)?;
        output.close();
        self.finished = true;

        let stats = self.engine.stats();
        info!(
            "[{}] Input closed after {} packets: {} out, {} streams opened, {} pass-through, {} warnings",
            self.name,
            stats.packets_in,
            stats.packets_out,
            stats.streams_opened,
            stats.passthrough_packets,
            stats.warnings
        );
        Ok(terminated)
    }
}

impl ProcessNode for BurstDeserializer {
    fn name(&self) -> &str {
        &self.name
    }

    fn should_stop(&self) -> bool {
        self.finished
    }

    fn num_inputs(&self) -> usize {
        2 // data + mode control
    }

    fn num_outputs(&self) -> usize {
        1
    }

    fn input_schema(&self) -> Vec<PortSchema> {
        vec![
            PortSchema::new::<DataPacket>("data_in", 0, PortDirection::Input),
            PortSchema::new::<TransposeChange>("transpose", 1, PortDirection::Input),
        ]
    }

    fn output_schema(&self) -> Vec<PortSchema> {
        vec![PortSchema::new::<StreamEvent>("data_out", 0, PortDirection::Output)]
    }

    fn work(&mut self, inputs: &[InputPort], outputs: &[OutputPort]) -> WorkResult<usize> {
        self.work_call_count += 1;
        if self.work_call_count == 1 {
            debug!(
                "[{}] First work() call: {} inputs, {} outputs, transpose={}",
                self.name,
                inputs.len(),
                outputs.len(),
                self.engine.transpose()
            );
        }

        let mut output = outputs
            .first()
            .and_then(|port| port.get::<StreamEvent>())
            .ok_or_else(|| WorkError::NodeError("Missing data_out output".to_string()))?;

        let mut input = inputs
            .first()
            .and_then(|port| port.get::<DataPacket>())
            .ok_or_else(|| WorkError::NodeError("Missing data_in input".to_string()))?;

        let packet = match input.recv() {
            Ok(packet) => packet,
            Err(WorkError::Shutdown) => return self.shut_down(&mut output),
            Err(e) => return Err(e),
        };
        self.last_timestamp = packet.timestamp;

        // Mode changes only arm a flush; it runs inside process()
        if let Some(mut control) = inputs.get(1).and_then(|port| port.get::<TransposeChange>()) {
            for change in control.drain() {
                self.engine.on_transpose_changed(change.old, change.new);
            }
        }

        // A consumed packet is progress even when it yields no output
        self.engine.process(packet, &mut output).map(|n| n.max(1))
    }
}
