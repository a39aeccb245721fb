//! Column demultiplexing: one persistent derived stream per frame column
//!
//! Every packet contributes one element per frame to each column stream, so
//! a column stream is the time series of that column across all packets.

use super::registry::{StreamState, mint_stream_id};
use super::sink::{Emitter, StreamSink};
use crate::runtime::{DataPacket, OutputPacket, WorkResult};
use std::sync::Arc;

/// Copy every `stride`-th element of `src`, starting at element `first`.
///
/// An element is `width` consecutive scalars (2 for interleaved complex). A
/// trailing partial element is ignored.
pub fn strided_copy(src: &[f64], dst: &mut Vec<f64>, first: usize, stride: usize, width: usize) {
    dst.clear();
    let elements = src.len() / width;
    if first >= elements {
        return;
    }
    dst.reserve((elements - first).div_ceil(stride) * width);
    for e in (first..elements).step_by(stride) {
        dst.extend_from_slice(&src[e * width..(e + 1) * width]);
    }
}

/// Emit one packet per column of `packet` on the column streams of `state`.
///
/// Returns the number of data packets emitted.
pub(crate) fn push_columns<S: StreamSink>(
    state: &mut StreamState,
    packet: &DataPacket,
    subsize: usize,
    out: &mut Emitter<'_, S>,
) -> WorkResult<usize> {
    let StreamState {
        source_id,
        stream_count,
        output_ids,
        derived,
        adjust_origin,
        columns_ended,
    } = state;
    let Some(derived) = derived.as_mut() else {
        return Ok(0);
    };

    let width = packet.metadata.mode.complex_factor();
    let mut column = Vec::new();

    for col in 0..subsize {
        strided_copy(&packet.samples, &mut column, col, subsize, width);

        let mut push_metadata = packet.metadata_changed;
        if output_ids.len() == col {
            output_ids.push(mint_stream_id(source_id, stream_count));
            out.stats().streams_opened += 1;
            push_metadata = true;
        }
        let id = &output_ids[col];

        if push_metadata {
            derived.stream_id = id.clone();
            out.metadata(derived)?;
            if *adjust_origin {
                derived.xstart += packet.metadata.xdelta;
            }
        }

        out.packet(OutputPacket {
            stream_id: id.clone(),
            samples: Arc::from(column.as_slice()),
            timestamp: packet.timestamp,
            end_of_stream: packet.end_of_stream,
        })?;
    }
    *columns_ended = packet.end_of_stream;

    Ok(subsize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strided_copy_real() {
        let src = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let mut dst = Vec::new();
        strided_copy(&src, &mut dst, 0, 2, 1);
        assert_eq!(dst, vec![1.0, 3.0, 5.0]);
        strided_copy(&src, &mut dst, 1, 2, 1);
        assert_eq!(dst, vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_strided_copy_complex_pairs() {
        // Two frames of two complex elements: (1,2) (3,4) | (5,6) (7,8)
        let src = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let mut dst = Vec::new();
        strided_copy(&src, &mut dst, 0, 2, 2);
        assert_eq!(dst, vec![1.0, 2.0, 5.0, 6.0]);
        strided_copy(&src, &mut dst, 1, 2, 2);
        assert_eq!(dst, vec![3.0, 4.0, 7.0, 8.0]);
    }

    #[test]
    fn test_strided_copy_partial_frame() {
        let src = [1.0, 2.0, 3.0, 4.0, 5.0];
        let mut dst = Vec::new();
        strided_copy(&src, &mut dst, 0, 2, 1);
        assert_eq!(dst, vec![1.0, 3.0, 5.0]);
        strided_copy(&src, &mut dst, 1, 2, 1);
        assert_eq!(dst, vec![2.0, 4.0]);

        // Dangling half of a complex element is dropped
        strided_copy(&src, &mut dst, 0, 1, 2);
        assert_eq!(dst, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_strided_copy_past_end() {
        let mut dst = vec![9.0];
        strided_copy(&[1.0, 2.0], &mut dst, 4, 8, 1);
        assert!(dst.is_empty());
    }
}
