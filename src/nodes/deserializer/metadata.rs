//! Derivation of the metadata advertised on derived streams
//!
//! Derived streams are always one-dimensional. In column mode each derived
//! stream runs across frames, so its x axis is taken from the incoming y axis.
//! In burst mode each derived stream is one frame, so the x axis is kept.

use super::registry::StreamState;
use super::sink::{Emitter, StreamSink};
use super::warnings::DemuxWarning;
use crate::runtime::{DataPacket, StreamMetadata, Units, WorkResult};
use tracing::debug;

/// Re-derive `state`'s metadata from `packet`.
///
/// On a shape refresh every open column stream is terminated first. Forces
/// `packet.metadata_changed` so the new metadata goes out with this packet.
/// An unframed packet leaves the state untouched.
pub(crate) fn refresh<S: StreamSink>(
    state: &mut StreamState,
    packet: &mut DataPacket,
    transpose: bool,
    shape_refresh: bool,
    out: &mut Emitter<'_, S>,
) -> WorkResult<()> {
    debug!("updating metadata for stream: {}", packet.stream_id);

    let Some(subsize) = packet.metadata.frame_width() else {
        out.warn(DemuxWarning::NoFrameShape {
            stream_id: packet.stream_id.clone(),
            subsize: packet.metadata.subsize,
        });
        return Ok(());
    };

    packet.metadata_changed = true;

    if shape_refresh && !state.output_ids.is_empty() {
        debug!("clearing out old streams due to subsize change");
        for id in state.output_ids.drain(..) {
            out.end_stream(&id, packet.timestamp)?;
        }
        state.stream_count = 0;
    }

    let incoming = &packet.metadata;
    state.adjust_origin = incoming.is_time_raster();

    let mut derived = incoming.clone();
    if transpose {
        derived.xdelta = if incoming.ydelta > 0.0 {
            incoming.ydelta
        } else {
            let substitute = incoming.xdelta / subsize as f64;
            out.warn(DemuxWarning::InvalidRowDelta {
                ydelta: incoming.ydelta,
                substitute,
            });
            substitute
        };
        derived.xstart = incoming.ystart;
        derived.xunits = incoming.yunits;
    }

    derived.subsize = 0;
    derived.ystart = 0.0;
    derived.ydelta = 0.0;
    derived.yunits = Units::None;

    state.derived = Some(derived);
    Ok(())
}

/// Reset the derived origin from the incoming metadata.
///
/// `xstart` wins when set; `ystart` is used otherwise.
pub(crate) fn apply_origin<S: StreamSink>(
    derived: &mut StreamMetadata,
    incoming: &StreamMetadata,
    out: &mut Emitter<'_, S>,
) {
    if incoming.xstart != 0.0 {
        derived.xstart = incoming.xstart;
        if incoming.ystart != 0.0 && incoming.ystart != incoming.xstart {
            out.warn(DemuxWarning::OriginMismatch {
                xstart: incoming.xstart,
                ystart: incoming.ystart,
            });
        }
    } else {
        derived.xstart = incoming.ystart;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::deserializer::registry::StreamRegistry;
    use crate::nodes::deserializer::warnings::DeserializerStats;
    use crate::runtime::{SampleMode, StreamEvent};

    fn raster(subsize: i32) -> StreamMetadata {
        StreamMetadata::new("src")
            .with_subsize(subsize)
            .with_x_axis(10.0, 0.5, Units::Frequency)
            .with_y_axis(20.0, 4.0, Units::Time)
    }

    fn run_refresh(
        registry: &mut StreamRegistry,
        packet: &mut DataPacket,
        transpose: bool,
        shape_refresh: bool,
    ) -> (Vec<StreamEvent>, DeserializerStats) {
        let mut events = Vec::new();
        let mut stats = DeserializerStats::default();
        let (state, _) = registry.lookup_or_create("src", &packet.metadata);
        let mut out = Emitter::new(&mut events, &mut stats);
        refresh(state, packet, transpose, shape_refresh, &mut out).unwrap();
        (events, stats)
    }

    #[test]
    fn test_column_mode_takes_y_axis() {
        let mut registry = StreamRegistry::new();
        let mut packet = DataPacket::new(raster(4), vec![0.0; 8], 0);

        let (events, stats) = run_refresh(&mut registry, &mut packet, true, true);
        assert!(events.is_empty());
        assert_eq!(stats.warnings, 0);
        assert!(packet.metadata_changed);

        let derived = registry.get("src").unwrap().derived_metadata().unwrap();
        assert_eq!(derived.xstart, 20.0);
        assert_eq!(derived.xdelta, 4.0);
        assert_eq!(derived.xunits, Units::Time);
        assert_eq!(derived.subsize, 0);
        assert_eq!(derived.ystart, 0.0);
        assert_eq!(derived.ydelta, 0.0);
        assert_eq!(derived.yunits, Units::None);
    }

    #[test]
    fn test_burst_mode_keeps_x_axis() {
        let mut registry = StreamRegistry::new();
        let md = raster(4).with_mode(SampleMode::Complex);
        let mut packet = DataPacket::new(md, vec![0.0; 8], 0);

        run_refresh(&mut registry, &mut packet, false, false);

        let derived = registry.get("src").unwrap().derived_metadata().unwrap();
        assert_eq!(derived.xstart, 10.0);
        assert_eq!(derived.xdelta, 0.5);
        assert_eq!(derived.xunits, Units::Frequency);
        assert_eq!(derived.mode, SampleMode::Complex);
        assert_eq!(derived.subsize, 0);
        assert_eq!(derived.yunits, Units::None);
    }

    #[test]
    fn test_invalid_ydelta_substituted() {
        let mut registry = StreamRegistry::new();
        let md = raster(4).with_y_axis(0.0, 0.0, Units::Time);
        let mut packet = DataPacket::new(md, vec![0.0; 8], 0);

        let (_, stats) = run_refresh(&mut registry, &mut packet, true, true);
        assert_eq!(stats.warnings, 1);
        let derived = registry.get("src").unwrap().derived_metadata().unwrap();
        assert_eq!(derived.xdelta, 0.125);
    }

    #[test]
    fn test_unframed_leaves_state_untouched() {
        let mut registry = StreamRegistry::new();
        let mut packet = DataPacket::new(raster(0), vec![1.0], 0);

        let (events, stats) = run_refresh(&mut registry, &mut packet, true, true);
        assert!(events.is_empty());
        assert_eq!(stats.warnings, 1);
        assert!(!packet.metadata_changed);
        assert!(registry.get("src").unwrap().derived_metadata().is_none());
    }

    #[test]
    fn test_shape_refresh_terminates_columns() {
        let mut registry = StreamRegistry::new();
        let md = raster(2);
        {
            let (state, _) = registry.lookup_or_create("src", &md);
            for _ in 0..2 {
                let id = state.mint_stream_id();
                state.output_ids.push(id);
            }
        }

        let mut packet = DataPacket::new(md.with_subsize(3), vec![0.0; 6], 77);
        let (events, _) = run_refresh(&mut registry, &mut packet, true, true);

        assert_eq!(
            events,
            vec![
                StreamEvent::Packet(crate::runtime::OutputPacket::end_of_stream("src_0", 77)),
                StreamEvent::Packet(crate::runtime::OutputPacket::end_of_stream("src_1", 77)),
            ]
        );
        let state = registry.get("src").unwrap();
        assert!(state.output_ids().is_empty());
        assert_eq!(state.stream_count(), 0);
    }

    #[test]
    fn test_origin_prefers_xstart() {
        let mut events = Vec::new();
        let mut stats = DeserializerStats::default();
        let mut out = Emitter::new(&mut events, &mut stats);
        let mut derived = StreamMetadata::new("src_0");

        let incoming = StreamMetadata::new("src").with_x_axis(5.0, 1.0, Units::Time);
        apply_origin(&mut derived, &incoming, &mut out);
        assert_eq!(derived.xstart, 5.0);

        let incoming = incoming.with_x_axis(0.0, 1.0, Units::Time).with_y_axis(7.0, 1.0, Units::Time);
        apply_origin(&mut derived, &incoming, &mut out);
        assert_eq!(derived.xstart, 7.0);

        let incoming = incoming.with_x_axis(3.0, 1.0, Units::Time);
        apply_origin(&mut derived, &incoming, &mut out);
        assert_eq!(derived.xstart, 3.0);
        assert_eq!(stats.warnings, 1);
    }
}
