//! Pipeline builder for constructing node graphs
//!
//! Nodes are added by name; connections are made between named ports and
//! type-checked against the nodes' port schemas. `build()` creates the
//! channels and starts one scheduler thread per node.

use super::errors::ConnectionError;
use super::node::{InputPort, OutputPort, ProcessNode};
use super::ports::PortSchema;
use super::scheduler::Scheduler;
use super::type_registry::TYPE_REGISTRY;
use super::watchdog::Watchdog;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

struct NodeEntry {
    node: Box<dyn ProcessNode>,
    inputs: Vec<PortSchema>,
    outputs: Vec<PortSchema>,
}

struct PendingConnection {
    from_node: usize,
    from_port: usize,
    to_node: usize,
    to_port: usize,
    type_id: TypeId,
    buffer_size: usize,
}

/// Pipeline builder that manages nodes and connections
pub struct Pipeline {
    nodes: Vec<NodeEntry>,
    node_names: HashMap<String, usize>,
    connections: Vec<PendingConnection>,
    default_buffer_size: usize,
    idle_backoff: Option<Duration>,
    watchdog: Watchdog,
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            node_names: HashMap::new(),
            connections: Vec::new(),
            default_buffer_size: 1000,
            idle_backoff: None,
            watchdog: Watchdog::new(),
        }
    }

    /// Channel capacity used by `connect()`
    pub fn with_default_buffer_size(mut self, size: usize) -> Self {
        self.default_buffer_size = size;
        self
    }

    /// Sleep applied after a node step that produced nothing
    pub fn with_idle_backoff(mut self, backoff: Duration) -> Self {
        self.idle_backoff = Some(backoff);
        self
    }

    pub fn with_watchdog(mut self, watchdog: Watchdog) -> Self {
        self.watchdog = watchdog;
        self
    }

    /// Add a node under a unique name
    pub fn add_process<N: ProcessNode + 'static>(
        &mut self,
        name: impl Into<String>,
        node: N,
    ) -> Result<(), String> {
        let name = name.into();
        if self.node_names.contains_key(&name) {
            return Err(format!("Node with name '{}' already exists", name));
        }

        let entry = NodeEntry {
            inputs: node.input_schema(),
            outputs: node.output_schema(),
            node: Box::new(node),
        };
        self.node_names.insert(name, self.nodes.len());
        self.nodes.push(entry);
        Ok(())
    }

    /// Connect an output port to an input port by name
    pub fn connect(
        &mut self,
        from_node: &str,
        from_port: &str,
        to_node: &str,
        to_port: &str,
    ) -> Result<(), Box<ConnectionError>> {
        self.connect_with_buffer(from_node, from_port, to_node, to_port, self.default_buffer_size)
    }

    /// Connect with a custom channel capacity
    pub fn connect_with_buffer(
        &mut self,
        from_node: &str,
        from_port: &str,
        to_node: &str,
        to_port: &str,
        buffer_size: usize,
    ) -> Result<(), Box<ConnectionError>> {
        let from_id = self.node_id(from_node)?;
        let to_id = self.node_id(to_node)?;

        let from_schema = find_port(&self.nodes[from_id].outputs, from_node, from_port)?;
        let to_schema = find_port(&self.nodes[to_id].inputs, to_node, to_port)?;

        if from_schema.type_id != to_schema.type_id {
            return Err(Box::new(ConnectionError::TypeMismatch {
                from_node: from_node.to_string(),
                from_port: from_port.to_string(),
                from_type: from_schema.type_id,
                to_node: to_node.to_string(),
                to_port: to_port.to_string(),
                to_type: to_schema.type_id,
            }));
        }

        // Fan-out is allowed, fan-in is not
        if self
            .connections
            .iter()
            .any(|c| c.to_node == to_id && c.to_port == to_schema.index)
        {
            return Err(Box::new(ConnectionError::DuplicateConnection {
                node: to_node.to_string(),
                port: to_port.to_string(),
            }));
        }

        self.connections.push(PendingConnection {
            from_node: from_id,
            from_port: from_schema.index,
            to_node: to_id,
            to_port: to_schema.index,
            type_id: from_schema.type_id,
            buffer_size,
        });

        Ok(())
    }

    /// All node names
    pub fn list_nodes(&self) -> Vec<&str> {
        self.node_names.keys().map(|s| s.as_str()).collect()
    }

    fn node_id(&self, name: &str) -> Result<usize, Box<ConnectionError>> {
        self.node_names
            .get(name)
            .copied()
            .ok_or_else(|| Box::new(ConnectionError::NodeNotFound(name.to_string())))
    }

    /// Create the channels and start every node
    pub fn build(self) -> Result<Scheduler, String> {
        info!(
            "Building pipeline with {} nodes and {} connections",
            self.nodes.len(),
            self.connections.len()
        );

        let mut scheduler = Scheduler::with_watchdog(self.watchdog.clone());
        if let Some(backoff) = self.idle_backoff {
            scheduler = scheduler.with_idle_backoff(backoff);
        }

        let registry = TYPE_REGISTRY
            .lock()
            .map_err(|_| "Type registry poisoned".to_string())?;

        type PortKey = (usize, usize);
        let mut receivers: HashMap<PortKey, Box<dyn Any + Send>> = HashMap::new();
        let mut senders: HashMap<PortKey, (TypeId, Vec<Box<dyn Any + Send>>)> = HashMap::new();

        for conn in &self.connections {
            let (tx, rx) = registry
                .create_channel(conn.type_id, conn.buffer_size)
                .ok_or_else(|| {
                    format!(
                        "Type {:?} not registered. Call register_type::<T>() before building pipeline.",
                        conn.type_id
                    )
                })?;

            receivers.insert((conn.to_node, conn.to_port), rx);
            senders
                .entry((conn.from_node, conn.from_port))
                .or_insert_with(|| (conn.type_id, Vec::new()))
                .1
                .push(tx);
        }

        let watchdog = self.watchdog;
        for (id, entry) in self.nodes.into_iter().enumerate() {
            let node_name = entry.node.name().to_string();
            debug!("Starting node {}: {}", id, node_name);

            let inputs: Vec<InputPort> = (0..entry.node.num_inputs())
                .map(|i| {
                    let port = receivers
                        .remove(&(id, i))
                        .map(InputPort::from_type_erased)
                        .unwrap_or_else(InputPort::unconnected);
                    port.with_watchdog(&watchdog, &node_name, &port_name(&entry.inputs, i, "in"))
                })
                .collect();

            let outputs = (0..entry.node.num_outputs())
                .map(|i| {
                    let port = match senders.remove(&(id, i)) {
                        Some((type_id, list)) => {
                            OutputPort::from_type_erased(registry.wrap_output(type_id, list)?)
                        }
                        None => OutputPort::unconnected(),
                    };
                    Ok(port.with_watchdog(&watchdog, &node_name, &port_name(&entry.outputs, i, "out")))
                })
                .collect::<Result<Vec<_>, String>>()?;

            scheduler.start_process(entry.node, inputs, outputs);
        }

        drop(registry);
        info!("Pipeline built successfully with {} threads", scheduler.num_threads());
        Ok(scheduler)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

fn find_port<'a>(
    schemas: &'a [PortSchema],
    node: &str,
    port: &str,
) -> Result<&'a PortSchema, Box<ConnectionError>> {
    schemas.iter().find(|s| s.name == port).ok_or_else(|| {
        Box::new(ConnectionError::PortNotFound {
            node: node.to_string(),
            port: port.to_string(),
        })
    })
}

fn port_name(schemas: &[PortSchema], index: usize, prefix: &str) -> String {
    schemas
        .iter()
        .find(|s| s.index == index)
        .map(|s| s.name.clone())
        .unwrap_or_else(|| format!("{}{}", prefix, index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::errors::WorkResult;
    use crate::runtime::packet::{DataPacket, StreamEvent};
    use crate::runtime::ports::PortDirection;

    struct Source;
    impl ProcessNode for Source {
        fn name(&self) -> &str { "source" }
        fn num_inputs(&self) -> usize { 0 }
        fn num_outputs(&self) -> usize { 1 }
        fn output_schema(&self) -> Vec<PortSchema> {
            vec![PortSchema::new::<DataPacket>("out", 0, PortDirection::Output)]
        }
        fn work(&mut self, _inputs: &[InputPort], _outputs: &[OutputPort]) -> WorkResult<usize> {
            Ok(0)
        }
    }

    struct PacketSink;
    impl ProcessNode for PacketSink {
        fn name(&self) -> &str { "packet_sink" }
        fn num_inputs(&self) -> usize { 1 }
        fn num_outputs(&self) -> usize { 0 }
        fn input_schema(&self) -> Vec<PortSchema> {
            vec![PortSchema::new::<DataPacket>("in", 0, PortDirection::Input)]
        }
        fn work(&mut self, _inputs: &[InputPort], _outputs: &[OutputPort]) -> WorkResult<usize> {
            Ok(0)
        }
    }

    struct EventSink;
    impl ProcessNode for EventSink {
        fn name(&self) -> &str { "event_sink" }
        fn num_inputs(&self) -> usize { 1 }
        fn num_outputs(&self) -> usize { 0 }
        fn input_schema(&self) -> Vec<PortSchema> {
            vec![PortSchema::new::<StreamEvent>("in", 0, PortDirection::Input)]
        }
        fn work(&mut self, _inputs: &[InputPort], _outputs: &[OutputPort]) -> WorkResult<usize> {
            Ok(0)
        }
    }

    #[test]
    fn test_single_connection() {
        let mut pipeline = Pipeline::new();
        pipeline.add_process("source", Source).unwrap();
        pipeline.add_process("sink", PacketSink).unwrap();
        assert!(pipeline.connect("source", "out", "sink", "in").is_ok());
    }

    #[test]
    fn test_type_mismatch_rejected() {
        let mut pipeline = Pipeline::new();
        pipeline.add_process("source", Source).unwrap();
        pipeline.add_process("sink", EventSink).unwrap();
        let err = pipeline.connect("source", "out", "sink", "in").unwrap_err();
        assert!(matches!(*err, ConnectionError::TypeMismatch { .. }));
    }

    #[test]
    fn test_duplicate_input_connection_rejected() {
        let mut pipeline = Pipeline::new();
        pipeline.add_process("source1", Source).unwrap();
        pipeline.add_process("source2", Source).unwrap();
        pipeline.add_process("sink", PacketSink).unwrap();

        pipeline.connect("source1", "out", "sink", "in").unwrap();
        let err = pipeline.connect("source2", "out", "sink", "in").unwrap_err();
        assert!(err.to_string().contains("already connected"));
    }

    #[test]
    fn test_fan_out_allowed() {
        let mut pipeline = Pipeline::new();
        pipeline.add_process("source", Source).unwrap();
        pipeline.add_process("sink1", PacketSink).unwrap();
        pipeline.add_process("sink2", PacketSink).unwrap();
        assert!(pipeline.connect("source", "out", "sink1", "in").is_ok());
        assert!(pipeline.connect("source", "out", "sink2", "in").is_ok());
    }

    #[test]
    fn test_unknown_node_and_port() {
        let mut pipeline = Pipeline::new();
        pipeline.add_process("source", Source).unwrap();
        pipeline.add_process("sink", PacketSink).unwrap();

        let err = pipeline.connect("source", "out", "nowhere", "in").unwrap_err();
        assert!(matches!(*err, ConnectionError::NodeNotFound(_)));
        let err = pipeline.connect("source", "bogus", "sink", "in").unwrap_err();
        assert!(matches!(*err, ConnectionError::PortNotFound { .. }));
    }

    #[test]
    fn test_duplicate_node_name_rejected() {
        let mut pipeline = Pipeline::new();
        assert!(pipeline.add_process("node", Source).is_ok());
        let err = pipeline.add_process("node", Source).unwrap_err();
        assert!(err.contains("already exists"));
        assert_eq!(pipeline.list_nodes(), vec!["node"]);
    }
}
