//! Non-fatal conditions reported while demultiplexing
//!
//! None of these stop a packet from being processed. Each is logged once at
//! `warn` level and counted in [`DeserializerStats`].

use tracing::warn;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DemuxWarning {
    #[error("input queue flushed on stream {stream_id} - data has been discarded upstream")]
    QueueFlushed { stream_id: String },

    #[error(
        "{elements} elements with subsize {subsize} is not a whole number of frames; trailing data is truncated"
    )]
    PartialFrame { elements: usize, subsize: usize },

    #[error("xstart {xstart} and ystart {ystart} differ for a time vs time raster; using xstart")]
    OriginMismatch { xstart: f64, ystart: f64 },

    #[error("ydelta {ydelta} is invalid; using best guess {substitute}")]
    InvalidRowDelta { ydelta: f64, substitute: f64 },

    #[error("stream {stream_id} has subsize {subsize}; passing data through without demultiplexing")]
    NoFrameShape { stream_id: String, subsize: i32 },
}

/// Running counters for one deserializer instance
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeserializerStats {
    pub packets_in: u64,
    pub passthrough_packets: u64,
    pub packets_out: u64,
    pub metadata_out: u64,
    pub streams_opened: u64,
    /// Output packets carrying the end-of-stream flag
    pub eos_out: u64,
    pub flushes: u64,
    pub warnings: u64,
}

impl DeserializerStats {
    /// Log and count a warning
    pub(crate) fn report(&mut self, warning: DemuxWarning) {
        self.warnings += 1;
        warn!("{}", warning);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_counts() {
        let mut stats = DeserializerStats::default();
        stats.report(DemuxWarning::PartialFrame {
            elements: 5,
            subsize: 2,
        });
        stats.report(DemuxWarning::OriginMismatch {
            xstart: 1.0,
            ystart: 2.0,
        });
        assert_eq!(stats.warnings, 2);
    }

    #[test]
    fn test_messages_name_the_values() {
        let w = DemuxWarning::InvalidRowDelta {
            ydelta: 0.0,
            substitute: 0.25,
        };
        assert_eq!(w.to_string(), "ydelta 0 is invalid; using best guess 0.25");
    }
}
