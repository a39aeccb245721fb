//! Example: split a synthetic time raster into derived streams
//!
//! Generates `--packets` packets, each holding `--frames` frames of
//! `--subsize` elements, runs them through a BurstDeserializer and prints a
//! summary of every derived stream.
//!
//! Usage:
//!   cargo run --example raster_split -- --subsize 8 --frames 4 --packets 10
//!   cargo run --example raster_split -- --subsize 8 --burst --complex

use burst_deserializer::nodes::{BurstDeserializer, PacketSource, StreamCollector};
use burst_deserializer::runtime::{DataPacket, Pipeline, SampleMode, StreamMetadata, Units};
use clap::Parser;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Split a framed raster into column or burst streams")]
struct Args {
    /// Elements per frame
    #[arg(short, long, default_value_t = 8)]
    subsize: i32,

    /// Frames per packet
    #[arg(short, long, default_value_t = 4)]
    frames: usize,

    /// Packets to generate
    #[arg(short = 'n', long, default_value_t = 10)]
    packets: u64,

    /// Emit one stream per frame instead of one per column
    #[arg(long)]
    burst: bool,

    /// Interleaved complex samples
    #[arg(long)]
    complex: bool,

    /// Sample spacing in seconds
    #[arg(long, default_value_t = 1e-6)]
    xdelta: f64,

    /// Channel capacity between nodes
    #[arg(long, default_value_t = 64)]
    buffer: usize,
}

fn raster_packets(args: &Args) -> Vec<DataPacket> {
    let mode = if args.complex {
        SampleMode::Complex
    } else {
        SampleMode::Real
    };
    let subsize = args.subsize.max(0) as usize;
    let frame_period = args.xdelta * subsize as f64;
    let scalars = subsize * args.frames * mode.complex_factor();

    (0..args.packets)
        .map(|i| {
            let xstart = i as f64 * frame_period * args.frames as f64;
            let md = StreamMetadata::new("raster")
                .with_subsize(args.subsize)
                .with_mode(mode)
                .with_x_axis(xstart, args.xdelta, Units::Time)
                .with_y_axis(xstart, frame_period, Units::Time);
            let samples: Vec<f64> = (0..scalars).map(|s| (i as usize * scalars + s) as f64).collect();
            DataPacket::new(md, samples, i).with_metadata_changed(i == 0)
        })
        .collect()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    info!("=== Raster Split Example ===");
    info!(
        "{} packets x {} frames x {} elements, mode: {}",
        args.packets,
        args.frames,
        args.subsize,
        if args.burst { "burst" } else { "column" }
    );

    let collector = StreamCollector::new();
    let collected = collector.handle();

    let mut pipeline = Pipeline::new()
        .with_default_buffer_size(args.buffer)
        .with_idle_backoff(Duration::from_millis(1));
    pipeline.add_process("source", PacketSource::new(raster_packets(&args)))?;
    pipeline.add_process(
        "deserializer",
        BurstDeserializer::new(!args.burst).with_name("deserializer"),
    )?;
    pipeline.add_process("collector", collector)?;

    pipeline.connect("source", "out", "deserializer", "data_in")?;
    pipeline.connect("deserializer", "data_out", "collector", "in")?;

    info!("Building pipeline...");
    let scheduler = pipeline.build()?;

    info!("Running...");
    scheduler.wait();

    let streams = collected.streams();
    println!("{:<16} {:>6} {:>8} {:>9} {:>14}  closed", "stream", "meta", "packets", "samples", "xstart");
    for (id, s) in &streams {
        println!(
            "{:<16} {:>6} {:>8} {:>9} {:>14.9}  {}",
            id, s.metadata, s.packets, s.samples, s.xstart, s.closed
        );
    }
    info!("{} derived streams from {} events", streams.len(), collected.len());

    Ok(())
}
