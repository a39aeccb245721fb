//! Stream data types carried between nodes
//!
//! A [`DataPacket`] is one block of 64-bit samples from a source stream, tagged
//! with the [`StreamMetadata`] that describes how to interpret it. Framed data
//! (`subsize > 0`) is laid out row-major: each frame is `subsize` elements, and
//! each element is one scalar (real) or an interleaved re/im pair (complex).

use std::fmt;
use std::sync::Arc;

/// Units of an axis
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Units {
    #[default]
    None,
    Time,
    Delay,
    Frequency,
    TimeCode,
    Distance,
    Velocity,
    Acceleration,
    Jerk,
    Doppler,
    DopplerRate,
    Energy,
    Power,
    Mass,
}

/// Numeric interpretation of a sample buffer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SampleMode {
    #[default]
    Real,
    /// Consecutive scalars pair up as (re, im)
    Complex,
}

impl SampleMode {
    /// Number of scalars per element
    #[inline]
    pub fn complex_factor(self) -> usize {
        match self {
            SampleMode::Real => 1,
            SampleMode::Complex => 2,
        }
    }
}

/// Description of a stream's layout, sent ahead of its data
///
/// The x axis runs along a frame (one element per `xdelta`), the y axis runs
/// across frames (one frame per `ydelta`). `subsize` is the frame width in
/// elements; zero means the stream has no frame structure.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamMetadata {
    pub stream_id: String,
    pub subsize: i32,
    pub mode: SampleMode,
    pub xstart: f64,
    pub xdelta: f64,
    pub xunits: Units,
    pub ystart: f64,
    pub ydelta: f64,
    pub yunits: Units,
}

impl StreamMetadata {
    /// Unframed real metadata with unit sample spacing
    pub fn new(stream_id: impl Into<String>) -> Self {
        Self {
            stream_id: stream_id.into(),
            subsize: 0,
            mode: SampleMode::Real,
            xstart: 0.0,
            xdelta: 1.0,
            xunits: Units::Time,
            ystart: 0.0,
            ydelta: 0.0,
            yunits: Units::None,
        }
    }

    /// Set the frame width in elements
    pub fn with_subsize(mut self, subsize: i32) -> Self {
        self.subsize = subsize;
        self
    }

    /// Mark the data as complex
    pub fn with_mode(mut self, mode: SampleMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the along-frame axis
    pub fn with_x_axis(mut self, xstart: f64, xdelta: f64, xunits: Units) -> Self {
        self.xstart = xstart;
        self.xdelta = xdelta;
        self.xunits = xunits;
        self
    }

    /// Set the across-frame axis
    pub fn with_y_axis(mut self, ystart: f64, ydelta: f64, yunits: Units) -> Self {
        self.ystart = ystart;
        self.ydelta = ydelta;
        self.yunits = yunits;
        self
    }

    /// Frame width, if the stream is framed
    #[inline]
    pub fn frame_width(&self) -> Option<usize> {
        usize::try_from(self.subsize).ok().filter(|&n| n > 0)
    }

    /// Both axes are measured in time (a time-vs-time raster)
    #[inline]
    pub fn is_time_raster(&self) -> bool {
        self.xunits == Units::Time && self.yunits == Units::Time
    }
}

impl fmt::Display for StreamMetadata {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Metadata[id={}, subsize={}, mode={:?}, x={}+{}*n ({:?}), y={}+{}*n ({:?})]",
            self.stream_id,
            self.subsize,
            self.mode,
            self.xstart,
            self.xdelta,
            self.xunits,
            self.ystart,
            self.ydelta,
            self.yunits
        )
    }
}

/// Incoming block of samples from one source stream
#[derive(Clone, Debug)]
pub struct DataPacket {
    pub stream_id: String,
    /// Shared so broadcasting to several consumers does not copy the buffer
    pub samples: Arc<[f64]>,
    /// Nanoseconds
    pub timestamp: u64,
    pub end_of_stream: bool,
    /// `metadata` differs from what was last sent for this stream
    pub metadata_changed: bool,
    /// The upstream queue overflowed and dropped data before this packet
    pub queue_flushed: bool,
    pub metadata: StreamMetadata,
}

impl DataPacket {
    /// Create a packet for the stream named by `metadata`
    pub fn new(metadata: StreamMetadata, samples: impl Into<Arc<[f64]>>, timestamp: u64) -> Self {
        Self {
            stream_id: metadata.stream_id.clone(),
            samples: samples.into(),
            timestamp,
            end_of_stream: false,
            metadata_changed: false,
            queue_flushed: false,
            metadata,
        }
    }

    pub fn with_metadata_changed(mut self, changed: bool) -> Self {
        self.metadata_changed = changed;
        self
    }

    pub fn with_end_of_stream(mut self, eos: bool) -> Self {
        self.end_of_stream = eos;
        self
    }

    pub fn with_queue_flushed(mut self, flushed: bool) -> Self {
        self.queue_flushed = flushed;
        self
    }
}

impl fmt::Display for DataPacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "DataPacket[id={}, samples={}, t={}, eos={}]",
            self.stream_id,
            self.samples.len(),
            self.timestamp,
            self.end_of_stream
        )
    }
}

/// Outgoing block of samples on a derived (or passed-through) stream
#[derive(Clone, Debug, PartialEq)]
pub struct OutputPacket {
    pub stream_id: String,
    pub samples: Arc<[f64]>,
    pub timestamp: u64,
    pub end_of_stream: bool,
}

impl OutputPacket {
    /// Empty packet that terminates `stream_id`
    pub fn end_of_stream(stream_id: impl Into<String>, timestamp: u64) -> Self {
        Self {
            stream_id: stream_id.into(),
            samples: Arc::from(Vec::new()),
            timestamp,
            end_of_stream: true,
        }
    }
}

/// One message on a deserializer output port
///
/// Metadata and data share a channel so consumers see them in emission order.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    Metadata(StreamMetadata),
    Packet(OutputPacket),
}

impl StreamEvent {
    /// Stream the event belongs to
    pub fn stream_id(&self) -> &str {
        match self {
            StreamEvent::Metadata(m) => &m.stream_id,
            StreamEvent::Packet(p) => &p.stream_id,
        }
    }
}

/// Notification that the demultiplexing mode property was set
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransposeChange {
    pub old: bool,
    pub new: bool,
}

impl TransposeChange {
    pub fn new(old: bool, new: bool) -> Self {
        Self { old, new }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_width() {
        let md = StreamMetadata::new("s");
        assert_eq!(md.frame_width(), None);
        assert_eq!(md.clone().with_subsize(-3).frame_width(), None);
        assert_eq!(md.with_subsize(8).frame_width(), Some(8));
    }

    #[test]
    fn test_time_raster() {
        let md = StreamMetadata::new("s").with_y_axis(0.0, 1.0, Units::Time);
        assert!(md.is_time_raster());
        let md = md.with_x_axis(0.0, 1.0, Units::Frequency);
        assert!(!md.is_time_raster());
    }

    #[test]
    fn test_end_of_stream_packet_is_empty() {
        let p = OutputPacket::end_of_stream("s_0", 42);
        assert!(p.samples.is_empty());
        assert!(p.end_of_stream);
        assert_eq!(p.timestamp, 42);
    }
}
