//! CLI binary for quillgen.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ProjectConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use quillgen::pipeline::encode::encode_png;
use quillgen::{
    generate, generate_to_file, inspect, EdgeDetectorKind, PipelineProgressCallback,
    ProgressCallback, ProjectConfig, ProjectStats, QuantizerKind, Stage,
};
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Terminal progress callback: one bar step per pipeline stage, with a log
/// line as each stage finishes.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(Stage::ALL.len() as u64);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:30.green/238}] {pos}/{len}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        bar.set_style(style);
        bar.set_prefix("Generating");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_pipeline_start(&self, total_stages: usize) {
        self.bar.set_length(total_stages as u64);
        self.bar.reset_eta();
    }

    fn on_stage_start(&self, stage: Stage) {
        self.bar.set_message(format!("{stage}…"));
    }

    fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
        self.bar.println(format!(
            "  {} {:<16} {}",
            green("✓"),
            stage.to_string(),
            dim(&format!("{elapsed_ms}ms")),
        ));
        self.bar.inc(1);
    }

    fn on_pipeline_complete(&self, stats: &ProjectStats) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {}x{} template, {} colours, {} edge pixels",
            green("✔"),
            stats.width,
            stats.height,
            bold(&stats.colors_used.to_string()),
            stats.edge_pixels,
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Default template (400 px wide, 8 colours, Canny outlines)
  quillgen photo.jpg

  # Fewer, bolder outlines
  quillgen --colors 4 --width 300 photo.jpg

  # Write to an exact path instead of output/quilling_project_*.pdf
  quillgen photo.jpg -o my_template.pdf

  # Dark outlines on white with an adaptive palette
  quillgen --quantizer median-cut --edges laplacian photo.png

  # Save the edge map for a quick look before printing
  quillgen --preview edges.png photo.jpg

  # Image facts only
  quillgen --inspect-only photo.jpg

  # Machine-readable statistics
  quillgen --json photo.jpg > stats.json

ENVIRONMENT VARIABLES:
  Every flag has a QUILLGEN_* fallback, e.g. QUILLGEN_COLORS=6.
  RUST_LOG overrides the log filter (e.g. RUST_LOG=quillgen=debug).
"#;

/// Turn a photo into a printable paper-quilling template.
#[derive(Parser, Debug)]
#[command(
    name = "quillgen",
    version,
    about = "Turn a photo into a printable paper-quilling template",
    long_about = "Resize a PNG or JPEG photo, reduce it to a few colours, extract the \
boundaries between colour regions and write them to a one-page PDF with captions.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PNG or JPEG image.
    input: PathBuf,

    /// Write the PDF to this exact path.
    #[arg(short, long, env = "QUILLGEN_OUTPUT")]
    output: Option<PathBuf>,

    /// Directory for generated documents when --output is not given.
    #[arg(long, env = "QUILLGEN_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// Width in pixels the photo is resized to (100–800).
    #[arg(long, env = "QUILLGEN_WIDTH", default_value_t = 400,
          value_parser = clap::value_parser!(u32).range(100..=800))]
    width: u32,

    /// Number of colours kept (2–20).
    #[arg(short = 'k', long, env = "QUILLGEN_COLORS", default_value_t = 8,
          value_parser = clap::value_parser!(u32).range(2..=20))]
    colors: u32,

    /// Colour-reduction strategy.
    #[arg(long, env = "QUILLGEN_QUANTIZER", value_enum, default_value = "kmeans")]
    quantizer: QuantizerArg,

    /// Edge-extraction strategy.
    #[arg(long, env = "QUILLGEN_EDGES", value_enum, default_value = "canny")]
    edges: EdgesArg,

    /// Gaussian blur sigma before edge extraction (1.0–3.0).
    #[arg(long, env = "QUILLGEN_BLUR_SIGMA")]
    blur_sigma: Option<f32>,

    /// Canny low hysteresis threshold.
    #[arg(long, env = "QUILLGEN_LOW_THRESHOLD", default_value_t = 50.0)]
    low_threshold: f32,

    /// Canny high hysteresis threshold.
    #[arg(long, env = "QUILLGEN_HIGH_THRESHOLD", default_value_t = 150.0)]
    high_threshold: f32,

    /// Seed for k-means initialisation.
    #[arg(long, env = "QUILLGEN_SEED")]
    seed: Option<u64>,

    /// Caption above the image.
    #[arg(long, env = "QUILLGEN_TITLE")]
    title: Option<String>,

    /// Caption below the image.
    #[arg(long, env = "QUILLGEN_CAPTION")]
    caption: Option<String>,

    /// Also write the edge map to this PNG file.
    #[arg(long, env = "QUILLGEN_PREVIEW")]
    preview: Option<PathBuf>,

    /// Keep the edge map PNG next to the PDF.
    #[arg(long, env = "QUILLGEN_KEEP_INTERMEDIATE")]
    keep_intermediate: bool,

    /// Print image facts only, no generation.
    #[arg(long)]
    inspect_only: bool,

    /// Print statistics as JSON on stdout.
    #[arg(long, env = "QUILLGEN_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "QUILLGEN_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "QUILLGEN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "QUILLGEN_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum QuantizerArg {
    Kmeans,
    MedianCut,
}

impl From<QuantizerArg> for QuantizerKind {
    fn from(v: QuantizerArg) -> Self {
        match v {
            QuantizerArg::Kmeans => QuantizerKind::KMeans,
            QuantizerArg::MedianCut => QuantizerKind::MedianCut,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum EdgesArg {
    Canny,
    Laplacian,
}

impl From<EdgesArg> for EdgeDetectorKind {
    fn from(v: EdgesArg) -> Self {
        match v {
            EdgesArg::Canny => EdgeDetectorKind::Canny,
            EdgesArg::Laplacian => EdgeDetectorKind::Laplacian,
        }
    }
}

/// `--json` payload.
#[derive(Serialize)]
struct JsonReport<'a> {
    document: PathBuf,
    intermediate: Option<PathBuf>,
    stats: &'a ProjectStats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let info = inspect(&cli.input).await.context("Failed to inspect image")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&info).context("Failed to serialize image info")?
            );
        } else {
            println!("File:     {}", cli.input.display());
            println!("Format:   {}", info.format);
            println!("Size:     {}x{} px", info.width, info.height);
            println!("Bytes:    {}", info.file_size);
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn PipelineProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Run generation ───────────────────────────────────────────────────
    let output = match cli.output {
        Some(ref output_path) => generate_to_file(&cli.input, output_path, &config).await,
        None => generate(&cli.input, &config).await,
    }
    .context("Generation failed")?;
    let document = output.document.path;
    let intermediate = output.document.intermediate;
    let stats = output.stats;

    if let Some(ref preview_path) = cli.preview {
        let png = encode_png(output.edges.image())?;
        tokio::fs::write(preview_path, png)
            .await
            .with_context(|| format!("Failed to write preview {}", preview_path.display()))?;
    }

    if cli.json {
        let report = JsonReport {
            document,
            intermediate,
            stats: &stats,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise stats")?
        );
    } else if !cli.quiet {
        if !show_progress {
            eprintln!(
                "Generated {}x{} template ({} colours) in {}ms",
                stats.width, stats.height, stats.colors_used, stats.total_duration_ms
            );
        }
        eprintln!(
            "{}  {}  {}",
            cyan("→"),
            bold(&document.display().to_string()),
            dim(&format!("{} bytes, {}ms", stats.document_bytes, stats.total_duration_ms)),
        );
        if let Some(ref p) = intermediate {
            eprintln!("   {}", dim(&format!("edge map: {}", p.display())));
        }
    }

    Ok(())
}

/// Map CLI args to `ProjectConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ProjectConfig> {
    let mut builder = ProjectConfig::builder()
        .target_width(cli.width)
        .colors(cli.colors)
        .quantizer(cli.quantizer.into())
        .edge_detector(cli.edges.into())
        .thresholds(cli.low_threshold, cli.high_threshold)
        .output_dir(cli.output_dir.clone())
        .keep_intermediate(cli.keep_intermediate);

    if let Some(sigma) = cli.blur_sigma {
        builder = builder.blur_sigma(sigma);
    }
    if let Some(seed) = cli.seed {
        builder = builder.seed(seed);
    }
    if let Some(ref title) = cli.title {
        builder = builder.caption_top(title.clone());
    }
    if let Some(ref caption) = cli.caption {
        builder = builder.caption_bottom(caption.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
