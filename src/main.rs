// src/main.rs
// ============================================================================
// VRMA-CONVERT CLI
// ============================================================================
//
// Uso simple:
//   vrma-convert motion.zip -o motion.vrma
//
// Lote (en paralelo):
//   vrma-convert out/*.zip --out-dir ./vrma --fps 20 --strict-translation
//
// ============================================================================

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use memmap2::Mmap;
use rayon::prelude::*;

use vrma_convert::{ArchiveStrategy, TranscodeOptions, TranscodeStats, Transcoder, TranslationPolicy};

#[derive(Parser, Debug)]
#[command(name = "vrma-convert")]
#[command(about = "Convert motion archives (rot6d .npy in zip) to VRM animation files")]
#[command(version)]
struct Args {
    /// Input archives
    #[arg(value_name = "ARCHIVE", required = true)]
    archives: Vec<PathBuf>,

    /// Output file (single input only)
    #[arg(short, long, conflicts_with = "out_dir")]
    output: Option<PathBuf>,

    /// Output directory (default: next to each input)
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Animation name (default: archive text, then "motion")
    #[arg(short, long)]
    label: Option<String>,

    /// Frame rate assumed when the archive has no duration
    #[arg(long)]
    fps: Option<f32>,

    /// Offset added to the hips height
    #[arg(long, allow_hyphen_values = true)]
    vertical_offset: Option<f32>,

    /// Fail when translation and rotation frame counts differ
    #[arg(long)]
    strict_translation: bool,

    /// Zip reading strategy: auto, central, walk
    #[arg(long)]
    strategy: Option<String>,

    /// Skip CRC-32 verification of archive entries
    #[arg(long)]
    no_crc: bool,

    /// JSON options file (flags override it)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Resultado de un archivo del lote
struct JobOutcome {
    input: PathBuf,
    output: PathBuf,
    result: Result<TranscodeStats>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let start = Instant::now();

    if args.output.is_some() && args.archives.len() > 1 {
        anyhow::bail!("--output accepts a single archive; use --out-dir for batches");
    }

    let options = resolve_options(&args)?;
    let transcoder = Transcoder::new(options.clone()).context("Invalid options")?;

    println!("═══════════════════════════════════════════════════════════════");
    println!("  VRMA CONVERTER v{}", env!("CARGO_PKG_VERSION"));
    println!("═══════════════════════════════════════════════════════════════");
    println!("  Archives:     {}", args.archives.len());
    println!("  Nominal fps:  {}", options.nominal_fps);
    println!("  Hips offset:  {:+.3}", options.vertical_offset);
    println!("  Translation:  {:?}", options.translation_policy);
    println!("  Strategy:     {:?}", options.strategy);
    println!("  CRC check:    {}", if options.verify_crc { "ON" } else { "OFF" });
    println!("═══════════════════════════════════════════════════════════════");

    if let Some(dir) = &args.out_dir {
        std::fs::create_dir_all(dir).with_context(|| format!("Cannot create {}", dir.display()))?;
    }

    let label = args.label.as_deref().unwrap_or("");
    let jobs: Vec<(PathBuf, PathBuf)> = args
        .archives
        .iter()
        .map(|input| (input.clone(), output_path(&args, input)))
        .collect();

    // ══════════════════════════════════════════════════════════════════════
    // TRANSCODE
    // ══════════════════════════════════════════════════════════════════════

    let outcomes: Vec<JobOutcome> = if jobs.len() == 1 {
        jobs.iter()
            .map(|(input, output)| run_job(&transcoder, input, output, label))
            .collect()
    } else {
        let bar = ProgressBar::new(jobs.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("  [{elapsed_precise}] {bar:40} {pos}/{len} {msg}")?,
        );
        let outcomes = jobs
            .par_iter()
            .progress_with(bar.clone())
            .map(|(input, output)| run_job(&transcoder, input, output, label))
            .collect();
        bar.finish_and_clear();
        outcomes
    };

    // ══════════════════════════════════════════════════════════════════════
    // SUMMARY
    // ══════════════════════════════════════════════════════════════════════

    let mut failed = 0usize;
    let mut total_bytes = 0usize;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(stats) => {
                total_bytes += stats.container_bytes;
                println!("\n[OK] {} → {}", outcome.input.display(), outcome.output.display());
                println!(
                    "  ✓ {} frames, {} tracks, {:.2}s, {} bytes ({})",
                    stats.frames, stats.tracks, stats.duration_seconds, stats.container_bytes, stats.backend
                );
                if stats.translation_dropped {
                    println!("  ⚠ Translation dropped (frame count mismatch)");
                }
            }
            Err(e) => {
                failed += 1;
                println!("\n[FAIL] {}", outcome.input.display());
                println!("  ✗ {:#}", e);
            }
        }
    }

    let elapsed = start.elapsed();
    println!("\n═══════════════════════════════════════════════════════════════");
    println!("  CONVERSION COMPLETE");
    println!("═══════════════════════════════════════════════════════════════");
    println!("  Time:       {:.2}s", elapsed.as_secs_f64());
    println!("  Converted:  {}/{}", outcomes.len() - failed, outcomes.len());
    println!("  Size:       {:.1} KB", total_bytes as f64 / 1024.0);
    println!("═══════════════════════════════════════════════════════════════");

    if failed > 0 {
        anyhow::bail!("{} of {} archives failed", failed, outcomes.len());
    }
    Ok(())
}

/// Opciones: archivo JSON (si hay) + flags
fn resolve_options(args: &Args) -> Result<TranscodeOptions> {
    let mut options = match &args.config {
        Some(path) => TranscodeOptions::from_json_file(path)
            .with_context(|| format!("Cannot load options from {}", path.display()))?,
        None => TranscodeOptions::default(),
    };

    if let Some(fps) = args.fps {
        options.nominal_fps = fps;
    }
    if let Some(offset) = args.vertical_offset {
        options.vertical_offset = offset;
    }
    if args.strict_translation {
        options.translation_policy = TranslationPolicy::Strict;
    }
    if let Some(strategy) = &args.strategy {
        options.strategy = ArchiveStrategy::from_str(strategy)
            .ok_or_else(|| anyhow::anyhow!("Invalid strategy: {}", strategy))?;
    }
    if args.no_crc {
        options.verify_crc = false;
    }
    Ok(options)
}

fn output_path(args: &Args, input: &Path) -> PathBuf {
    if let Some(output) = &args.output {
        return output.clone();
    }
    let file_name = input.with_extension("vrma");
    let file_name = file_name.file_name().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("motion.vrma"));
    match &args.out_dir {
        Some(dir) => dir.join(file_name),
        None => input.with_extension("vrma"),
    }
}

fn run_job(transcoder: &Transcoder, input: &Path, output: &Path, label: &str) -> JobOutcome {
    JobOutcome {
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        result: transcode_file(transcoder, input, output, label),
    }
}

fn transcode_file(transcoder: &Transcoder, input: &Path, output: &Path, label: &str) -> Result<TranscodeStats> {
    let file = File::open(input).with_context(|| format!("Cannot open {}", input.display()))?;
    let mmap = unsafe { Mmap::map(&file)? };

    let transcoded = transcoder
        .transcode(&mmap, label)
        .with_context(|| format!("Failed to transcode {}", input.display()))?;
    transcoded
        .container
        .save(output)
        .with_context(|| format!("Cannot write {}", output.display()))?;

    Ok(transcoded.stats)
}
