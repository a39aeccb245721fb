//! Per-packet dispatch for the burst deserializer
//!
//! [`Deserializer`] owns the stream registry and runs one packet at a time:
//! pending flush, registry lookup, metadata refresh, then exactly one of
//! column demultiplexing, burst splitting, or pass-through. It knows nothing
//! about ports or threads; output goes to any [`StreamSink`].

use super::registry::StreamRegistry;
use super::sink::{Emitter, StreamSink};
use super::warnings::{DemuxWarning, DeserializerStats};
use super::{burst, column, metadata};
use crate::runtime::{DataPacket, OutputPacket, WorkResult};
use tracing::debug;

#[derive(Debug, Default)]
pub struct Deserializer {
    /// Column mode when set, burst mode otherwise
    transpose: bool,
    flush_pending: bool,
    registry: StreamRegistry,
    stats: DeserializerStats,
}

impl Deserializer {
    pub fn new(transpose: bool) -> Self {
        Self {
            transpose,
            ..Self::default()
        }
    }

    pub fn transpose(&self) -> bool {
        self.transpose
    }

    pub fn flush_pending(&self) -> bool {
        self.flush_pending
    }

    pub fn registry(&self) -> &StreamRegistry {
        &self.registry
    }

    pub fn stats(&self) -> &DeserializerStats {
        &self.stats
    }

    /// Record a change of the mode property.
    ///
    /// Only arms the flush; the streams are torn down by the next `process()`.
    /// Arms it whenever `new` differs from the current mode, whatever `old` says.
    pub fn on_transpose_changed(&mut self, old: bool, new: bool) {
        debug!("transpose changed from {} to {}", old, new);
        if new != self.transpose {
            self.flush_pending = true;
        }
        self.transpose = new;
    }

    /// Terminate every open derived stream and forget all source streams
    pub fn flush<S: StreamSink>(&mut self, timestamp: u64, sink: &mut S) -> WorkResult<usize> {
        let mut out = Emitter::new(sink, &mut self.stats);
        flush_streams(&mut self.registry, timestamp, &mut out)
    }

    /// The input is exhausted: terminate the derived streams that are still
    /// open and forget all source streams.
    ///
    /// Column streams whose last packet already carried the source's
    /// end-of-stream get no second marker.
    pub fn finish<S: StreamSink>(&mut self, timestamp: u64, sink: &mut S) -> WorkResult<usize> {
        debug!("finishing streams");
        let mut out = Emitter::new(sink, &mut self.stats);
        let mut terminated = 0;
        for id in self.registry.open_output_ids() {
            out.end_stream(id, timestamp)?;
            terminated += 1;
        }
        self.registry.clear_all();
        Ok(terminated)
    }

    /// Process one input packet. The packet is consumed on every path.
    ///
    /// Returns the number of data packets emitted for it, not counting
    /// end-of-stream markers from a flush or shape change.
    pub fn process<S: StreamSink>(&mut self, mut packet: DataPacket, sink: &mut S) -> WorkResult<usize> {
        let transpose = self.transpose;
        let mut out = Emitter::new(sink, &mut self.stats);
        out.stats().packets_in += 1;

        if packet.queue_flushed {
            out.warn(DemuxWarning::QueueFlushed {
                stream_id: packet.stream_id.clone(),
            });
            self.flush_pending = true;
        }

        if self.flush_pending {
            flush_streams(&mut self.registry, packet.timestamp, &mut out)?;
            self.flush_pending = false;
        }

        let (state, is_new) = self.registry.lookup_or_create(&packet.stream_id, &packet.metadata);
        if is_new {
            debug!("New input stream: {}", packet.stream_id);
        }

        let shape_refresh = transpose
            && usize::try_from(packet.metadata.subsize).ok() != Some(state.output_ids.len());

        let refreshed =
            is_new || packet.metadata_changed || shape_refresh || state.derived.is_none();
        if refreshed {
            metadata::refresh(state, &mut packet, transpose, shape_refresh, &mut out)?;
        }

        let subsize = match (packet.metadata.frame_width(), state.derived.is_some()) {
            (Some(subsize), true) => subsize,
            _ => {
                if !refreshed {
                    out.warn(DemuxWarning::NoFrameShape {
                        stream_id: packet.stream_id.clone(),
                        subsize: packet.metadata.subsize,
                    });
                }
                return pass_through(packet, &mut out);
            }
        };

        let width = packet.metadata.mode.complex_factor();
        let elements = packet.samples.len() / width;
        if elements % subsize != 0 {
            out.warn(DemuxWarning::PartialFrame { elements, subsize });
        }

        let incoming = &packet.metadata;
        if state.adjust_origin
            && (incoming.xstart != 0.0 || incoming.ystart != 0.0)
            && (!transpose || packet.metadata_changed)
            && let Some(derived) = state.derived.as_mut()
        {
            metadata::apply_origin(derived, incoming, &mut out);
        }

        if transpose {
            column::push_columns(state, &packet, subsize, &mut out)
        } else {
            burst::push_bursts(state, &packet, subsize, &mut out)
        }
    }
}

fn flush_streams<S: StreamSink>(
    registry: &mut StreamRegistry,
    timestamp: u64,
    out: &mut Emitter<'_, S>,
) -> WorkResult<usize> {
    debug!("flushing streams");
    let mut terminated = 0;
    for id in registry.output_ids() {
        out.end_stream(id, timestamp)?;
        terminated += 1;
    }
    registry.clear_all();
    out.stats().flushes += 1;
    Ok(terminated)
}

fn pass_through<S: StreamSink>(packet: DataPacket, out: &mut Emitter<'_, S>) -> WorkResult<usize> {
    if packet.metadata_changed {
        out.metadata(&packet.metadata)?;
    }
    out.packet(OutputPacket {
        stream_id: packet.stream_id,
        samples: packet.samples,
        timestamp: packet.timestamp,
        end_of_stream: packet.end_of_stream,
    })?;
    out.stats().passthrough_packets += 1;
    Ok(1)
}
