//! Node trait for streaming processing
//!
//! A node is driven by the scheduler: each `work()` call is one processing
//! step that consumes at most what it needs from its inputs and pushes results
//! to its outputs before returning control.

pub use super::errors::{WorkError, WorkResult};
pub use super::ports::{InputPort, OutputPort, PortSchema};

/// A processing node in a streaming pipeline
/// - Sources have 0 inputs and N outputs
/// - Sinks have N inputs and 0 outputs
/// - Processors have N inputs and M outputs
pub trait ProcessNode: Send {
    /// Debug name for this node
    fn name(&self) -> &str;

    /// Whether the scheduler should stop calling `work()`
    fn should_stop(&self) -> bool {
        false
    }

    /// Number of input ports this node requires
    fn num_inputs(&self) -> usize;

    /// Number of output ports this node provides
    fn num_outputs(&self) -> usize;

    /// Schema for all input ports (name + type + index)
    fn input_schema(&self) -> Vec<PortSchema> {
        Vec::new()
    }

    /// Schema for all output ports (name + type + index)
    fn output_schema(&self) -> Vec<PortSchema> {
        Vec::new()
    }

    /// Perform one processing step.
    ///
    /// Returns `Ok(n)` with the number of items produced. `Ok(0)` tells the
    /// scheduler there was no work, and it backs off before the next call.
    fn work(&mut self, inputs: &[InputPort], outputs: &[OutputPort]) -> WorkResult<usize>;
}
