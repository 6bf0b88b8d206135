//! loomwatch: track physical progress on pattern orders from the command line.
//!
//! Orders are registered from a baseline image and live in a data
//! directory (stored images plus a JSON record file). Each comparison,
//! drawing, or upload is measured against the order's baseline and
//! appended to its history.
//!
//! The `measure`, `mask`, and `composite` commands run the engine directly
//! on image files without touching the data directory, which is useful for
//! checking thresholds and resize filters on real photos.
//!
//! # Usage
//!
//! ```text
//! loomwatch create-order PO-1001 pattern.png
//! loomwatch compare 1 tracing.png --mode overlay
//! loomwatch upload 1 photo.jpg
//! loomwatch history 1 --json
//! loomwatch measure pattern.png photo.jpg --mode upload_diff --runs 5
//! ```
//!
//! Logging is controlled with `RUST_LOG` (default `info`).

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use loomwatch_engine::{
    CompareRequest, ComparisonDiagnostics, Dimensions, ProgressMode, ResizeFilter, RgbaImage,
};
use loomwatch_store::{
    FsImageStore, ImageRef, ImageStore, JsonRecordStore, Order, ProgressRecord, ProgressResult,
    Tracker, TrackerConfig,
};
use serde::Serialize;

/// Progress tracking for pattern orders.
///
/// Measures how much of a reference pattern has been completed by
/// comparing tracings or photos against the order's baseline image.
#[derive(Parser)]
#[command(name = "loomwatch", version)]
struct Cli {
    /// Tracker config as a JSON file.
    ///
    /// `--data-dir` and `--resize-filter` override the corresponding
    /// fields when given.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding stored images and the record file.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Resize filter (nearest, triangle, catmull-rom, gaussian, lanczos3).
    #[arg(long, value_enum, global = true)]
    resize_filter: Option<Filter>,

    /// Output results as JSON instead of a human-readable report.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register an order from its baseline image.
    CreateOrder {
        /// Unique order number.
        order_number: String,
        /// Baseline image (PNG, JPEG, BMP, WebP).
        base_image: PathBuf,
        /// Default progress mode for the order (overlay, upload_diff).
        #[arg(long)]
        mode: Option<String>,
    },

    /// Compare an image against an order's baseline and record the result.
    Compare {
        order_id: u64,
        image: PathBuf,
        /// Progress mode (overlay, upload_diff). Defaults to the order's mode.
        #[arg(long)]
        mode: Option<String>,
    },

    /// Record a traced overlay (coverage mode, composited for display).
    Draw { order_id: u64, overlay: PathBuf },

    /// Record a photo of the work (diff mode, with a diff overlay).
    Upload { order_id: u64, photo: PathBuf },

    /// Show one order.
    Show { order_id: u64 },

    /// List all orders, most recently updated first.
    List,

    /// Show an order's progress history, newest first.
    History { order_id: u64 },

    /// Delete an order and its history.
    Delete { order_id: u64 },

    /// Write a stored image to a PNG file.
    Export {
        /// Image reference, e.g. `/uploads/merged/0123456789abcdef.png`.
        reference: String,
        output: PathBuf,
    },

    /// Measure an image against a baseline without recording anything.
    Measure {
        baseline: PathBuf,
        image: PathBuf,

        /// Progress mode (overlay, upload_diff).
        #[arg(long, default_value = "overlay")]
        mode: String,

        /// Count the baseline foreground instead of a generated mask.
        #[arg(long)]
        no_mask: bool,

        /// Write the diff overlay (upload_diff mode only).
        #[arg(long)]
        diff_overlay: Option<PathBuf>,

        /// Number of runs for averaging.
        #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
        runs: usize,
    },

    /// Generate the work-area mask for a baseline image.
    Mask { baseline: PathBuf, output: PathBuf },

    /// Composite an overlay onto a baseline for display.
    Composite {
        baseline: PathBuf,
        overlay: PathBuf,
        output: PathBuf,
    },
}

/// Resize filter selection.
#[derive(Clone, Copy, ValueEnum)]
enum Filter {
    /// Nearest-neighbor (fastest, blocky).
    Nearest,
    /// Bilinear interpolation (fast, decent quality).
    Triangle,
    /// Bicubic Catmull-Rom (moderate, good quality).
    CatmullRom,
    /// Gaussian (moderate, smooth).
    Gaussian,
    /// Lanczos with 3 lobes (slowest, sharpest).
    Lanczos3,
}

impl From<Filter> for ResizeFilter {
    fn from(filter: Filter) -> Self {
        match filter {
            Filter::Nearest => Self::Nearest,
            Filter::Triangle => Self::Triangle,
            Filter::CatmullRom => Self::CatmullRom,
            Filter::Gaussian => Self::Gaussian,
            Filter::Lanczos3 => Self::Lanczos3,
        }
    }
}

/// Build a [`TrackerConfig`] from the config file (if any) and flags.
fn config_from_cli(cli: &Cli) -> Result<TrackerConfig, String> {
    let mut config = match cli.config {
        Some(ref path) => TrackerConfig::load(path)
            .map_err(|e| format!("Error loading config {}: {e}", path.display()))?,
        None => TrackerConfig::default(),
    };
    if let Some(ref dir) = cli.data_dir {
        config.data_dir.clone_from(dir);
    }
    if let Some(filter) = cli.resize_filter {
        config.resize_filter = filter.into();
    }
    Ok(config)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::too_many_lines)]
fn run(cli: &Cli) -> Result<(), String> {
    let config = config_from_cli(cli)?;
    log::debug!("config: {config:?}");

    match cli.command {
        Command::CreateOrder {
            ref order_number,
            ref base_image,
            ref mode,
        } => {
            let tracker = open_tracker(&config)?;
            let bytes = read_file(base_image)?;
            let order = tracker
                .create_order(order_number, &bytes, mode.as_deref())
                .map_err(|e| format!("Error creating order: {e}"))?;
            emit(cli.json, &order, || order_report(&order))
        }
        Command::Compare {
            order_id,
            ref image,
            ref mode,
        } => {
            let tracker = open_tracker(&config)?;
            let bytes = read_file(image)?;
            let result = tracker
                .compare(order_id, &bytes, mode.as_deref())
                .map_err(|e| format!("Error comparing: {e}"))?;
            emit(cli.json, &result, || result_report(&result))
        }
        Command::Draw {
            order_id,
            ref overlay,
        } => {
            let tracker = open_tracker(&config)?;
            let bytes = read_file(overlay)?;
            let result = tracker
                .submit_drawing(order_id, &bytes)
                .map_err(|e| format!("Error recording drawing: {e}"))?;
            emit(cli.json, &result, || result_report(&result))
        }
        Command::Upload {
            order_id,
            ref photo,
        } => {
            let tracker = open_tracker(&config)?;
            let bytes = read_file(photo)?;
            let result = tracker
                .submit_upload(order_id, &bytes)
                .map_err(|e| format!("Error recording upload: {e}"))?;
            emit(cli.json, &result, || result_report(&result))
        }
        Command::Show { order_id } => {
            let order = open_tracker(&config)?
                .order(order_id)
                .map_err(|e| e.to_string())?;
            emit(cli.json, &order, || order_report(&order))
        }
        Command::List => {
            let orders = open_tracker(&config)?
                .orders()
                .map_err(|e| e.to_string())?;
            emit(cli.json, &orders, || {
                orders
                    .iter()
                    .map(|o| {
                        format!(
                            "#{:<4} {:<20} {:>7}%  {}",
                            o.id,
                            o.order_number,
                            o.current_progress.to_string(),
                            o.mode
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }
        Command::History { order_id } => {
            let history = open_tracker(&config)?
                .history(order_id)
                .map_err(|e| e.to_string())?;
            emit(cli.json, &history, || history_report(&history))
        }
        Command::Delete { order_id } => {
            open_tracker(&config)?
                .delete_order(order_id)
                .map_err(|e| e.to_string())?;
            eprintln!("Deleted order #{order_id}");
            Ok(())
        }
        Command::Export {
            ref reference,
            ref output,
        } => {
            let tracker = open_tracker(&config)?;
            let image = tracker
                .images()
                .load(&ImageRef::new(reference.as_str()))
                .map_err(|e| format!("Error loading {reference}: {e}"))?;
            write_png(output, &image)
        }
        Command::Measure {
            ref baseline,
            ref image,
            ref mode,
            no_mask,
            ref diff_overlay,
            runs,
        } => {
            let options = MeasureOptions {
                mode: mode
                    .parse()
                    .map_err(|e| format!("Error parsing --mode: {e}"))?,
                no_mask,
                diff_overlay: diff_overlay.as_deref(),
                runs,
                json: cli.json,
                filter: config.resize_filter,
            };
            measure(baseline, image, &options)
        }
        Command::Mask {
            ref baseline,
            ref output,
        } => {
            let baseline = read_image(baseline)?;
            let work_area = loomwatch_engine::count_work_area_pixels(&baseline);
            eprintln!(
                "Work area: {} of {} pixels",
                work_area.pixels,
                work_area.dimensions.pixel_count(),
            );
            write_png(output, &loomwatch_engine::generate_mask(&baseline))
        }
        Command::Composite {
            ref baseline,
            ref overlay,
            ref output,
        } => {
            let baseline = read_image(baseline)?;
            let overlay = read_image(overlay)?;
            let merged = loomwatch_engine::composite(&baseline, &overlay, config.resize_filter)
                .map_err(|e| format!("Error compositing: {e}"))?;
            write_png(output, &merged)
        }
    }
}

fn open_tracker(config: &TrackerConfig) -> Result<Tracker<FsImageStore, JsonRecordStore>, String> {
    Tracker::open(config).map_err(|e| {
        format!(
            "Error opening data directory {}: {e}",
            config.data_dir.display()
        )
    })
}

/// Print `value` as pretty JSON, or the human-readable report.
fn emit<T: Serialize>(json: bool, value: &T, report: impl FnOnce() -> String) -> Result<(), String> {
    if json {
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| format!("Error serializing output: {e}"))?;
        println!("{json}");
    } else {
        println!("{}", report());
    }
    Ok(())
}

fn order_report(order: &Order) -> String {
    let mut lines = vec![
        format!("Order #{} ({})", order.id, order.order_number),
        format!("  Standard size:  {}", order.standard),
        format!("  Work area:      {} pixels", order.total_pixels),
        format!("  Mode:           {}", order.mode),
        format!("  Progress:       {}%", order.current_progress),
        format!("  Baseline:       {}", order.base_image),
    ];
    if let Some(ref mask) = order.mask_image {
        lines.push(format!("  Mask:           {mask}"));
    }
    if let Some(ref image) = order.current_image {
        lines.push(format!("  Current image:  {image}"));
    }
    if let Some(ref overlay) = order.current_overlay {
        lines.push(format!("  Current overlay: {overlay}"));
    }
    lines.push(format!("  Updated:        {}", order.updated_at.to_rfc3339()));
    lines.join("\n")
}

fn result_report(result: &ProgressResult) -> String {
    let mut report = format!("Progress: {}%\nImage:    {}", result.percentage, result.image);
    if let Some(ref overlay) = result.overlay {
        report.push_str(&format!("\nOverlay:  {overlay}"));
    }
    report
}

fn history_report(history: &[ProgressRecord]) -> String {
    if history.is_empty() {
        return "No progress recorded".to_owned();
    }
    history
        .iter()
        .map(|r| {
            let overlay = r
                .overlay
                .as_ref()
                .map_or_else(String::new, |o| format!("  (overlay {o})"));
            format!(
                "{}  {:>7}%  {}{overlay}",
                r.recorded_at.format("%Y-%m-%d %H:%M:%S"),
                r.percentage.to_string(),
                r.image,
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn read_file(path: &Path) -> Result<Vec<u8>, String> {
    let bytes = std::fs::read(path).map_err(|e| format!("Error reading {}: {e}", path.display()))?;
    eprintln!("Image: {} ({} bytes)", path.display(), bytes.len());
    Ok(bytes)
}

fn read_image(path: &Path) -> Result<RgbaImage, String> {
    let bytes = read_file(path)?;
    loomwatch_engine::decode_rgba(&bytes)
        .map_err(|e| format!("Error decoding {}: {e}", path.display()))
}

fn write_png(path: &Path, image: &RgbaImage) -> Result<(), String> {
    let png = loomwatch_engine::encode_png(image).map_err(|e| format!("Error encoding PNG: {e}"))?;
    std::fs::write(path, &png).map_err(|e| format!("Error writing {}: {e}", path.display()))?;
    eprintln!(
        "PNG written to {} ({} bytes, {})",
        path.display(),
        png.len(),
        Dimensions::of(image),
    );
    Ok(())
}

struct MeasureOptions<'a> {
    mode: ProgressMode,
    no_mask: bool,
    diff_overlay: Option<&'a Path>,
    runs: usize,
    json: bool,
    filter: ResizeFilter,
}

/// Run the engine directly on two image files and print diagnostics.
fn measure(baseline: &Path, image: &Path, options: &MeasureOptions<'_>) -> Result<(), String> {
    let baseline = read_image(baseline)?;
    let image = read_image(image)?;
    let mask = (!options.no_mask).then(|| loomwatch_engine::generate_mask(&baseline));

    let request = CompareRequest {
        baseline: &baseline,
        mask: mask.as_ref(),
        comparison: &image,
        mode: options.mode,
        standard: Dimensions::of(&baseline),
        filter: options.filter,
    };
    eprintln!("Runs: {}", options.runs);
    eprintln!();

    let mut all_diagnostics = Vec::with_capacity(options.runs);

    for run in 0..options.runs {
        if options.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, options.runs);
        }

        let comparison =
            loomwatch_engine::compare(&request).map_err(|e| format!("Measure error: {e}"))?;

        if options.json {
            let json = serde_json::to_string_pretty(&comparison.diagnostics)
                .map_err(|e| format!("Error serializing diagnostics: {e}"))?;
            println!("{json}");
        } else {
            println!("{}", comparison.diagnostics.report());
        }

        // Write the diff overlay on the first run only.
        if run == 0
            && let Some(path) = options.diff_overlay
        {
            match comparison.diff_overlay {
                Some(ref overlay) => write_png(path, overlay)?,
                None => eprintln!("No diff overlay in {} mode; skipping", options.mode),
            }
        }

        all_diagnostics.push(comparison.diagnostics);

        if options.runs > 1 {
            eprintln!();
        }
    }

    if options.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }
    Ok(())
}

/// Function pointer type for extracting a stage duration from diagnostics.
type StageExtractor = fn(&ComparisonDiagnostics) -> Option<std::time::Duration>;

/// Print aggregated timings across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[ComparisonDiagnostics]) {
    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();
    if durations.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    let stage_extractors: &[(&str, StageExtractor)] = &[
        ("Normalize", |d| Some(d.normalize)),
        ("Measure", |d| Some(d.measure)),
        ("Render", |d| d.render),
    ];

    for (name, extractor) in stage_extractors {
        let stage_durations: Vec<f64> = all_diagnostics
            .iter()
            .filter_map(extractor)
            .map(|dur| dur.as_secs_f64() * 1000.0)
            .collect();

        if stage_durations.is_empty() {
            continue;
        }

        let stage_mean = stage_durations.iter().sum::<f64>() / stage_durations.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}
