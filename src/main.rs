use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use glb_compress::prelude::{Options, optimize};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Compress the meshes of a glb file with Draco.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Input glb file
    input: PathBuf,

    /// Output glb file
    output: PathBuf,

    /// Draco compression level (0-10)
    #[arg(long, default_value_t = 6, value_parser = clap::value_parser!(u8).range(0..=10))]
    compression_level: u8,

    /// Position quantization bits
    #[arg(long, default_value_t = 14, value_parser = clap::value_parser!(u8).range(1..=30))]
    position_bits: u8,

    /// Normal quantization bits
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u8).range(2..=30))]
    normal_bits: u8,

    /// Texture coordinate quantization bits
    #[arg(long, default_value_t = 12, value_parser = clap::value_parser!(u8).range(1..=30))]
    texcoord_bits: u8,

    /// Drop animations
    #[arg(long)]
    no_animations: bool,

    /// Drop morph targets
    #[arg(long)]
    no_morph_targets: bool,

    /// Drop skins and joint/weight attributes
    #[arg(long)]
    no_skins: bool,

    /// Downscale embedded textures whose longest side exceeds this many pixels
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    max_texture_size: Option<u32>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn options(&self) -> Options {
        Options {
            compression_level: self.compression_level,
            position_bits: self.position_bits,
            normal_bits: self.normal_bits,
            texcoord_bits: self.texcoord_bits,
            preserve_animations: !self.no_animations,
            preserve_morph_targets: !self.no_morph_targets,
            preserve_skins: !self.no_skins,
            max_texture_size: self.max_texture_size,
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    println!(
        "Compressing {} -> {}",
        cli.input.display(),
        cli.output.display()
    );

    let file = File::open(&cli.input)
        .with_context(|| format!("Failed to open {}", cli.input.display()))?;
    let mut reader = BufReader::new(file);

    let (result, report) = optimize(&mut reader, &cli.options())
        .with_context(|| format!("Failed to compress {}", cli.input.display()))?;

    let output = File::create(&cli.output)
        .with_context(|| format!("Failed to create {}", cli.output.display()))?;
    let mut writer = BufWriter::new(output);
    writer
        .write_all(&result)
        .and_then(|_| writer.flush())
        .with_context(|| format!("Failed to write {}", cli.output.display()))?;

    println!(
        "Compressed {} primitives, left {} as they were",
        report.primitives_compressed, report.primitives_skipped
    );
    if report.images_resized > 0 {
        println!("Resized {} textures", report.images_resized);
    }
    if report.kept_original {
        println!("Output would have been larger, wrote the input unchanged");
    }
    println!("Compression complete!");
    println!("{report}");

    Ok(())
}
