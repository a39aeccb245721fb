//! Per-source-stream bookkeeping
//!
//! One [`StreamState`] exists for every source stream seen since the last
//! flush. It owns the identifiers of the derived streams it has opened and the
//! metadata advertised on them.

use crate::runtime::StreamMetadata;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

#[derive(Debug, Clone)]
pub struct StreamState {
    pub(crate) source_id: String,
    /// Next suffix to hand out; only ever reset together with `output_ids`
    pub(crate) stream_count: u64,
    /// Column mode: index `i` is the stream carrying column `i`
    pub(crate) output_ids: Vec<String>,
    /// Metadata advertised for derived streams, `None` until first derived
    pub(crate) derived: Option<StreamMetadata>,
    /// Both axes of the latest metadata are time
    pub(crate) adjust_origin: bool,
    /// The column streams' last packet carried the source's end-of-stream
    pub(crate) columns_ended: bool,
}

impl StreamState {
    fn new(source_id: &str, metadata: &StreamMetadata) -> Self {
        Self {
            source_id: source_id.to_string(),
            stream_count: 0,
            output_ids: Vec::new(),
            derived: None,
            adjust_origin: metadata.is_time_raster(),
            columns_ended: false,
        }
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn stream_count(&self) -> u64 {
        self.stream_count
    }

    /// Identifiers of the persistent (column) streams currently open
    pub fn output_ids(&self) -> &[String] {
        &self.output_ids
    }

    pub fn derived_metadata(&self) -> Option<&StreamMetadata> {
        self.derived.as_ref()
    }

    pub fn adjusts_origin(&self) -> bool {
        self.adjust_origin
    }

    /// Mint the next derived stream identifier
    pub(crate) fn mint_stream_id(&mut self) -> String {
        mint_stream_id(&self.source_id, &mut self.stream_count)
    }
}

/// `"{source}_{count}"`, advancing `count`
pub(crate) fn mint_stream_id(source_id: &str, stream_count: &mut u64) -> String {
    let id = format!("{}_{}", source_id, stream_count);
    *stream_count += 1;
    id
}

/// Source stream id -> state
#[derive(Debug, Default)]
pub struct StreamRegistry {
    streams: HashMap<String, StreamState>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// State for `source_id`, creating it from `metadata` on first sighting.
    ///
    /// Returns the state and whether it was just created.
    pub fn lookup_or_create(
        &mut self,
        source_id: &str,
        metadata: &StreamMetadata,
    ) -> (&mut StreamState, bool) {
        match self.streams.entry(source_id.to_string()) {
            Entry::Occupied(e) => (e.into_mut(), false),
            Entry::Vacant(e) => (e.insert(StreamState::new(source_id, metadata)), true),
        }
    }

    pub fn get(&self, source_id: &str) -> Option<&StreamState> {
        self.streams.get(source_id)
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Every open persistent output identifier across all source streams
    pub fn output_ids(&self) -> impl Iterator<Item = &str> {
        self.streams
            .values()
            .flat_map(|s| s.output_ids.iter().map(String::as_str))
    }

    /// Persistent output identifiers not already ended by their source
    pub fn open_output_ids(&self) -> impl Iterator<Item = &str> {
        self.streams
            .values()
            .filter(|s| !s.columns_ended)
            .flat_map(|s| s.output_ids.iter().map(String::as_str))
    }

    /// Drop every entry. Callers terminate the derived streams first.
    pub fn clear_all(&mut self) {
        self.streams.clear();
    }
}
