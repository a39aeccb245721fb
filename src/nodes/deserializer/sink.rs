//! Where demultiplexed metadata and data go
//!
//! The engine only needs a [`StreamSink`]. Inside a pipeline this is the node's
//! output [`Sender`]; in tests and embedded use it is a plain `Vec`.

use super::warnings::{DeserializerStats, DemuxWarning};
use crate::runtime::{OutputPacket, Sender, StreamEvent, StreamMetadata, WorkResult};

pub trait StreamSink {
    /// Announce (or re-announce) the metadata of `metadata.stream_id`
    fn push_metadata(&mut self, metadata: &StreamMetadata) -> WorkResult<()>;

    fn push_packet(&mut self, packet: OutputPacket) -> WorkResult<()>;
}

impl StreamSink for Vec<StreamEvent> {
    fn push_metadata(&mut self, metadata: &StreamMetadata) -> WorkResult<()> {
        self.push(StreamEvent::Metadata(metadata.clone()));
        Ok(())
    }

    fn push_packet(&mut self, packet: OutputPacket) -> WorkResult<()> {
        self.push(StreamEvent::Packet(packet));
        Ok(())
    }
}

impl StreamSink for Sender<StreamEvent> {
    fn push_metadata(&mut self, metadata: &StreamMetadata) -> WorkResult<()> {
        self.send(StreamEvent::Metadata(metadata.clone()))?;
        Ok(())
    }

    fn push_packet(&mut self, packet: OutputPacket) -> WorkResult<()> {
        self.send(StreamEvent::Packet(packet))?;
        Ok(())
    }
}

/// Sink wrapper that keeps the deserializer's counters
pub(crate) struct Emitter<'a, S> {
    sink: &'a mut S,
    stats: &'a mut DeserializerStats,
}

impl<'a, S: StreamSink> Emitter<'a, S> {
    pub(crate) fn new(sink: &'a mut S, stats: &'a mut DeserializerStats) -> Self {
        Self { sink, stats }
    }

    pub(crate) fn metadata(&mut self, metadata: &StreamMetadata) -> WorkResult<()> {
        self.sink.push_metadata(metadata)?;
        self.stats.metadata_out += 1;
        Ok(())
    }

    pub(crate) fn packet(&mut self, packet: OutputPacket) -> WorkResult<()> {
        let eos = packet.end_of_stream;
        self.sink.push_packet(packet)?;
        self.stats.packets_out += 1;
        if eos {
            self.stats.eos_out += 1;
        }
        Ok(())
    }

    /// Terminate a derived stream with an empty end-of-stream packet
    pub(crate) fn end_stream(&mut self, stream_id: &str, timestamp: u64) -> WorkResult<()> {
        self.packet(OutputPacket::end_of_stream(stream_id, timestamp))
    }

    pub(crate) fn warn(&mut self, warning: DemuxWarning) {
        self.stats.report(warning);
    }

    pub(crate) fn stats(&mut self) -> &mut DeserializerStats {
        &mut *self.stats
    }
}
