//! Type registry for dynamic channel creation
//!
//! The pipeline only knows a connection's `TypeId`; the registry maps it back
//! to code that creates a typed channel and wraps the sending halves in a
//! broadcast [`Sender`].

use super::packet::{DataPacket, StreamEvent, TransposeChange};
use super::sender::{ChannelMessage, Sender};
use crossbeam_channel::{Sender as CrossbeamSender, bounded};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

type ErasedChannel = (Box<dyn Any + Send>, Box<dyn Any + Send>);
type ChannelCreatorFn = Box<dyn Fn(usize) -> ErasedChannel + Send + Sync>;
type OutputWrapperFn =
    Box<dyn Fn(Vec<Box<dyn Any + Send>>) -> Result<Box<dyn Any + Send>, String> + Send + Sync>;

pub(crate) struct TypeRegistry {
    channel_creators: HashMap<TypeId, ChannelCreatorFn>,
    output_wrappers: HashMap<TypeId, OutputWrapperFn>,
}

impl TypeRegistry {
    fn new() -> Self {
        Self {
            channel_creators: HashMap::new(),
            output_wrappers: HashMap::new(),
        }
    }

    fn register<T: 'static + Send + Clone>(&mut self) {
        let type_id = TypeId::of::<T>();

        self.channel_creators.insert(
            type_id,
            Box::new(|buffer_size: usize| {
                let (tx, rx) = bounded::<ChannelMessage<T>>(buffer_size);
                (
                    Box::new(tx) as Box<dyn Any + Send>,
                    Box::new(rx) as Box<dyn Any + Send>,
                )
            }),
        );

        self.output_wrappers.insert(
            type_id,
            Box::new(|senders: Vec<Box<dyn Any + Send>>| {
                let typed = senders
                    .into_iter()
                    .map(|s| {
                        s.downcast::<CrossbeamSender<ChannelMessage<T>>>()
                            .map(|tx| *tx)
                            .map_err(|_| "Type mismatch in sender".to_string())
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                if typed.is_empty() {
                    return Err("No senders to wrap".to_string());
                }
                Ok(Box::new(Sender::new(typed)) as Box<dyn Any + Send>)
            }),
        );
    }

    pub(crate) fn create_channel(&self, type_id: TypeId, buffer_size: usize) -> Option<ErasedChannel> {
        self.channel_creators.get(&type_id).map(|create| create(buffer_size))
    }

    pub(crate) fn wrap_output(
        &self,
        type_id: TypeId,
        senders: Vec<Box<dyn Any + Send>>,
    ) -> Result<Box<dyn Any + Send>, String> {
        self.output_wrappers
            .get(&type_id)
            .ok_or_else(|| format!("Type {:?} not registered", type_id))?(senders)
    }
}

lazy_static::lazy_static! {
    pub(crate) static ref TYPE_REGISTRY: Arc<Mutex<TypeRegistry>> = {
        let mut registry = TypeRegistry::new();
        registry.register::<DataPacket>();
        registry.register::<StreamEvent>();
        registry.register::<TransposeChange>();
        Arc::new(Mutex::new(registry))
    };
}

/// Register a custom type for use in pipelines.
/// Call this before building pipelines that carry it.
pub fn register_type<T: 'static + Send + Clone>() {
    if let Ok(mut registry) = TYPE_REGISTRY.lock() {
        registry.register::<T>();
    }
}
