//! Replays a fixed sequence of packets into a pipeline

use crate::runtime::node::{InputPort, OutputPort, ProcessNode, WorkError, WorkResult};
use crate::runtime::ports::{PortDirection, PortSchema};
use crate::runtime::DataPacket;
use std::collections::VecDeque;
use tracing::{debug, info};

/// Source node sending one queued [`DataPacket`] per `work()` call.
///
/// Closes its output once the queue is empty.
pub struct PacketSource {
    name: String,
    packets: VecDeque<DataPacket>,
    sent: usize,
    done: bool,
}

impl PacketSource {
    pub fn new(packets: impl IntoIterator<Item = DataPacket>) -> Self {
        Self {
            name: "packet_source".to_string(),
            packets: packets.into_iter().collect(),
            sent: 0,
            done: false,
        }
    }

    /// With custom name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn remaining(&self) -> usize {
        self.packets.len()
    }
}

impl ProcessNode for PacketSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn should_stop(&self) -> bool {
        self.done
    }

    fn num_inputs(&self) -> usize {
        0
    }

    fn num_outputs(&self) -> usize {
        1
    }

    fn input_schema(&self) -> Vec<PortSchema> {
        vec![]
    }

    fn output_schema(&self) -> Vec<PortSchema> {
        vec![PortSchema::new::<DataPacket>("out", 0, PortDirection::Output)]
    }

    fn work(&mut self, _inputs: &[InputPort], outputs: &[OutputPort]) -> WorkResult<usize> {
        let output = outputs
            .first()
            .and_then(|port| port.get::<DataPacket>())
            .ok_or_else(|| WorkError::NodeError("Missing out output".to_string()))?;

        match self.packets.pop_front() {
            Some(packet) => {
                debug!("[{}] Sending {}", self.name, packet);
                output.send(packet)?;
                self.sent += 1;
                Ok(1)
            }
            None => {
                info!("[{}] Replayed {} packets", self.name, self.sent);
                output.close();
                self.done = true;
                Ok(0)
            }
        }
    }
}
