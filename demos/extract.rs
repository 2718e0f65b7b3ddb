//! Decode a payload resource and extract it, printing what was found.
//!
//! Usage:
//!   cargo run --release --example extract -- payload.bin output_dir/

use omaha_payload::{extract_resource, ExtractOptions, TarOutput};
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: extract <payload.bin> <output_dir>");
        eprintln!("  extract ./102.bin ./out/");
        std::process::exit(1);
    }

    let options = ExtractOptions {
        output_dir: PathBuf::from(&args[2]),
        ..ExtractOptions::default()
    };
    let report = extract_resource(&args[1], &options)?;

    let [main, call, jump, rc] = report.header.stream_sizes;
    println!("Original size: {} bytes", report.header.original_size);
    println!("Streams: main {}, CALL {}, JMP {}, RC {}", main, call, jump, rc);
    if let Some(mismatch) = &report.size_mismatch {
        println!("Warning: {}", mismatch);
    }
    if let Some(exhausted) = &report.exhausted {
        println!("Partial decode: {}", exhausted);
        println!("  {}", report.positions);
    }

    if let TarOutput::Extracted(summary) = &report.tar {
        println!(
            "Extracted {} file(s), {} dir(s), {} bytes to {}",
            summary.files,
            summary.directories,
            summary.bytes_written,
            options.output_dir.display()
        );
        println!("Stopped at {}", summary.stop);
    }

    Ok(())
}
