//! Example: switch between column and burst mode mid-stream
//!
//! Drives the splitting engine directly, without a pipeline, and flips the
//! transpose setting after `--toggle-after` packets. Every open column stream
//! is terminated before the first packet in the new mode is split.
//!
//! Usage:
//!   cargo run --example mode_toggle -- --subsize 3 --packets 4 --toggle-after 2

use burst_deserializer::{DataPacket, Deserializer, StreamEvent, StreamMetadata, Units};
use clap::Parser;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Column/burst mode switch demo")]
struct Args {
    /// Elements per frame
    #[arg(short, long, default_value_t = 3)]
    subsize: i32,

    /// Frames per packet
    #[arg(short, long, default_value_t = 2)]
    frames: usize,

    /// Packets to process
    #[arg(short = 'n', long, default_value_t = 4)]
    packets: u64,

    /// Packets processed before the mode switch
    #[arg(short, long, default_value_t = 2)]
    toggle_after: u64,

    /// Start in burst mode instead of column mode
    #[arg(long)]
    burst: bool,
}

fn describe(event: &StreamEvent) -> String {
    match event {
        StreamEvent::Metadata(md) => format!("  META {}", md),
        StreamEvent::Packet(p) if p.samples.is_empty() && p.end_of_stream => {
            format!("  EOS  {}", p.stream_id)
        }
        StreamEvent::Packet(p) => format!(
            "  DATA {} {:?}{}",
            p.stream_id,
            &p.samples[..],
            if p.end_of_stream { " (eos)" } else { "" }
        ),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let elements = args.subsize.max(0) as usize * args.frames;

    let mut engine = Deserializer::new(!args.burst);
    info!("=== Mode Toggle Example === (transpose={})", engine.transpose());

    for i in 0..args.packets {
        if i == args.toggle_after {
            let current = engine.transpose();
            engine.on_transpose_changed(current, !current);
            info!("Transpose switched to {}, flush pending", engine.transpose());
        }

        let md = StreamMetadata::new("frames")
            .with_subsize(args.subsize)
            .with_y_axis(0.0, 1.0, Units::Time);
        let samples: Vec<f64> = (0..elements).map(|e| (i as usize * elements + e) as f64).collect();

        let mut events: Vec<StreamEvent> = Vec::new();
        let emitted = engine.process(DataPacket::new(md, samples, i), &mut events)?;

        println!("packet {} -> {} outputs", i, emitted);
        for event in &events {
            println!("{}", describe(event));
        }
    }

    let mut events: Vec<StreamEvent> = Vec::new();
    let closed = engine.flush(args.packets, &mut events)?;
    println!("final flush -> {} streams closed", closed);
    for event in &events {
        println!("{}", describe(event));
    }

    let stats = engine.stats();
    info!(
        "{} packets in, {} out, {} streams opened, {} flushes, {} warnings",
        stats.packets_in, stats.packets_out, stats.streams_opened, stats.flushes, stats.warnings
    );

    Ok(())
}
