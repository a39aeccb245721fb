//! Burst splitting: every frame becomes its own terminated derived stream

use super::registry::StreamState;
use super::sink::{Emitter, StreamSink};
use crate::runtime::{DataPacket, OutputPacket, WorkResult};
use std::sync::Arc;

/// Emit each whole frame of `packet` as a fresh single-packet stream.
///
/// Returns the number of frames emitted.
pub(crate) fn push_bursts<S: StreamSink>(
    state: &mut StreamState,
    packet: &DataPacket,
    subsize: usize,
    out: &mut Emitter<'_, S>,
) -> WorkResult<usize> {
    let stride = subsize * packet.metadata.mode.complex_factor();
    let mut frames = 0;

    for frame in packet.samples.chunks_exact(stride) {
        let id = state.mint_stream_id();
        let Some(derived) = state.derived.as_mut() else {
            break;
        };
        out.stats().streams_opened += 1;

        derived.stream_id = id.clone();
        out.metadata(derived)?;
        out.packet(OutputPacket {
            stream_id: id,
            samples: Arc::from(frame),
            timestamp: packet.timestamp,
            end_of_stream: true,
        })?;

        if state.adjust_origin {
            derived.xstart += packet.metadata.ydelta;
        }
        frames += 1;
    }

    Ok(frames)
}
