//! Terminal node recording every derived-stream event it receives

use crate::runtime::node::{InputPort, OutputPort, ProcessNode, WorkError, WorkResult};
use crate::runtime::ports::{PortDirection, PortSchema};
use crate::runtime::StreamEvent;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// What one derived stream looked like downstream
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StreamSummary {
    /// Metadata announcements seen
    pub metadata: usize,
    /// Data packets, including empty end-of-stream markers
    pub packets: usize,
    /// Scalar values received
    pub samples: usize,
    pub closed: bool,
    /// Origin of the most recent announcement
    pub xstart: f64,
}

/// Shared view of everything a [`StreamCollector`] has received
#[derive(Debug, Clone, Default)]
pub struct CollectedStreams {
    events: Arc<Mutex<Vec<StreamEvent>>>,
}

impl CollectedStreams {
    fn lock(&self) -> MutexGuard<'_, Vec<StreamEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of all events, in arrival order
    pub fn events(&self) -> Vec<StreamEvent> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Per-stream summary keyed by derived stream id
    pub fn streams(&self) -> BTreeMap<String, StreamSummary> {
        let mut streams: BTreeMap<String, StreamSummary> = BTreeMap::new();
        for event in self.lock().iter() {
            let summary = streams.entry(event.stream_id().to_string()).or_default();
            match event {
                StreamEvent::Metadata(md) => {
                    summary.metadata += 1;
                    summary.xstart = md.xstart;
                }
                StreamEvent::Packet(p) => {
                    summary.packets += 1;
                    summary.samples += p.samples.len();
                    summary.closed |= p.end_of_stream;
                }
            }
        }
        streams
    }
}

pub struct StreamCollector {
    name: String,
    collected: CollectedStreams,
    done: bool,
}

impl StreamCollector {
    pub fn new() -> Self {
        Self {
            name: "stream_collector".to_string(),
            collected: CollectedStreams::default(),
            done: false,
        }
    }

    /// With custom name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Handle that stays valid after the node moves into a pipeline
    pub fn handle(&self) -> CollectedStreams {
        self.collected.clone()
    }
}

impl Default for StreamCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessNode for StreamCollector {
    fn name(&self) -> &str {
        &self.name
    }

    fn should_stop(&self) -> bool {
        self.done
    }

    fn num_inputs(&self) -> usize {
        1
    }

    fn num_outputs(&self) -> usize {
        0
    }

    fn input_schema(&self) -> Vec<PortSchema> {
        vec![PortSchema::new::<StreamEvent>("in", 0, PortDirection::Input)]
    }

    fn output_schema(&self) -> Vec<PortSchema> {
        vec![]
    }

    fn work(&mut self, inputs: &[InputPort], _outputs: &[OutputPort]) -> WorkResult<usize> {
        let mut input = inputs
            .first()
            .and_then(|port| port.get::<StreamEvent>())
            .ok_or_else(|| WorkError::NodeError("Missing in input".to_string()))?;

        match input.recv() {
            Ok(event) => {
                debug!("[{}] {}", self.name, event.stream_id());
                self.collected.lock().push(event);
                Ok(1)
            }
            Err(WorkError::Shutdown) => {
                info!("[{}] Collected {} events", self.name, self.collected.len());
                self.done = true;
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }
}
