//! CLI binary for imgbatch.
//!
//! A thin shim over the library crate that maps CLI flags, environment
//! variables and the settings file to `PipelineConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use imgbatch::pipeline::relocate;
use imgbatch::{
    publish_dir, run, AssetKind, BatchTag, InkscapeRasterizer, ObjectStore, PipelineConfig,
    PipelineProgressCallback, PipelineReport, ProgressCallback, PublishResult, PublishTarget,
    ResampleFilter, ScaleMode, Settings, Stage,
};
use indicatif::{ProgressBar, ProgressStyle};
use spaces_client::{SpacesClient, SpacesConfig};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar, re-armed at the start of each stage,
/// with a log line per skipped file and per upload.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Scanning…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:<10.bold} [{bar:36.green/238}] {pos:>3}/{len} files  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_style(style);
        self.bar.set_prefix(stage.to_string());
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.set_message("");
    }

    fn on_asset_done(&self, _stage: Stage, name: &str) {
        self.bar.set_message(name.to_string());
        self.bar.inc(1);
    }

    fn on_asset_skipped(&self, _stage: Stage, name: &str, reason: &str) {
        self.bar
            .println(format!("  {} {}  {}", yellow("⚠"), name, dim(reason)));
        self.bar.inc(1);
    }

    fn on_stage_complete(&self, stage: Stage, processed: usize) {
        self.bar.println(format!(
            "  {} {:<10} {}",
            green("✓"),
            stage.to_string(),
            dim(&format!("{processed} files"))
        ));
    }

    fn on_published(&self, _key: &str, url: &str) {
        self.bar.println(format!("    {} {}", cyan("↑"), url));
    }
}

impl CliProgressCallback {
    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Prepare partner logos in ./incoming, results in ./incoming/ready
  imgbatch run partner --dir ./incoming

  # Speaker portraits into a 400x400 box, exact fit, smoother filter
  imgbatch run speaker --dir ./speakers --width 400 --height 400 --scale exact --filter lanczos3

  # Prepare and upload to Spaces under 2024/team/
  imgbatch run team --dir ./team --upload --bucket assets --region fra1

  # Upload an already prepared folder
  imgbatch publish --target ./ready --kind partner --folder 2024/partner

  # Remove leftovers of a failed run
  imgbatch clean --dir ./incoming --batch 1718000000

ENVIRONMENT VARIABLES:
  IMGBATCH_DIR        Working directory (default: .)
  IMGBATCH_TARGET     Output directory (default: <dir>/ready)
  IMGBATCH_WIDTH      Target box width (default: 600)
  IMGBATCH_HEIGHT     Target box height (default: 300)
  IMGBATCH_INKSCAPE   Inkscape binary (default: inkscape on PATH)
  IMGBATCH_CONFIG     Settings file (default: <config dir>/imgbatch/config.json)
  SPACES_BUCKET       Bucket to publish into
  SPACES_REGION       Spaces region, e.g. fra1
  SPACES_KEY          Access key
  SPACES_SECRET       Secret key

SETUP:
  Inkscape 1.x must be installed to convert SVG files.
  Every file a run writes starts with the run's batch tag, e.g.
  1718000000_partner_logo.png. Only files of the current tag are processed.
"#;

/// Prepare image batches for the web: rename, rasterise, resize, relocate, publish.
#[derive(Parser, Debug)]
#[command(
    name = "imgbatch",
    version,
    about = "Prepare partner, speaker and team images: rename, rasterise, resize, relocate, publish",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Settings file with defaults and storage credentials.
    #[arg(long, global = true, env = "IMGBATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Output the run report as JSON.
    #[arg(long, global = true, env = "IMGBATCH_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "IMGBATCH_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "IMGBATCH_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "IMGBATCH_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full pipeline over a working directory.
    Run(RunArgs),
    /// Upload an already prepared directory.
    Publish(PublishArgs),
    /// Delete leftover files of one batch from the working directory.
    Clean(CleanArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Asset kind: partner, speaker, team, or any [a-z0-9_] label.
    kind: AssetKind,

    /// Working directory holding the raw images.
    #[arg(long, env = "IMGBATCH_DIR")]
    dir: Option<PathBuf>,

    /// Directory finished images are moved into.
    #[arg(long, env = "IMGBATCH_TARGET")]
    target: Option<PathBuf>,

    /// Target box width in pixels.
    #[arg(long, env = "IMGBATCH_WIDTH")]
    width: Option<u32>,

    /// Target box height in pixels.
    #[arg(long, env = "IMGBATCH_HEIGHT")]
    height: Option<u32>,

    /// Delete the untagged originals once their tagged copy is written.
    #[arg(long)]
    discard_originals: bool,

    /// Skip the resize stage; files are relocated at their current size.
    #[arg(long)]
    no_resize: bool,

    /// Scale rule: whole (integer factor) or exact (binding side hits the box).
    #[arg(long, value_enum, default_value = "whole")]
    scale: ScaleArg,

    /// Resampling filter for the resizer.
    #[arg(long, value_enum, default_value = "nearest")]
    filter: FilterArg,

    /// Inkscape binary name or path.
    #[arg(long, env = "IMGBATCH_INKSCAPE")]
    inkscape: Option<PathBuf>,

    /// Use this batch tag instead of the current time.
    #[arg(long)]
    batch: Option<BatchTag>,

    /// Upload the relocated directory when the run succeeds.
    #[arg(long)]
    upload: bool,

    #[command(flatten)]
    storage: StorageArgs,
}

#[derive(Args, Debug)]
struct PublishArgs {
    /// Directory to upload.
    #[arg(long, env = "IMGBATCH_TARGET")]
    target: Option<PathBuf>,

    /// Asset kind, used for the default remote folder.
    #[arg(long, default_value = "partner")]
    kind: AssetKind,

    #[command(flatten)]
    storage: StorageArgs,
}

#[derive(Args, Debug)]
struct CleanArgs {
    /// Working directory.
    #[arg(long, env = "IMGBATCH_DIR")]
    dir: Option<PathBuf>,

    /// Batch tag whose files should be removed.
    #[arg(long)]
    batch: BatchTag,
}

#[derive(Args, Debug)]
struct StorageArgs {
    /// Bucket to publish into.
    #[arg(long, env = "SPACES_BUCKET")]
    bucket: Option<String>,

    /// Spaces region, e.g. fra1.
    #[arg(long, env = "SPACES_REGION")]
    region: Option<String>,

    /// Access key.
    #[arg(long, env = "SPACES_KEY", hide_env_values = true)]
    key: Option<String>,

    /// Secret key.
    #[arg(long, env = "SPACES_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// Remote folder (default: <year>/<kind>).
    #[arg(long, env = "SPACES_FOLDER")]
    folder: Option<String>,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum ScaleArg {
    Whole,
    Exact,
}

impl From<ScaleArg> for ScaleMode {
    fn from(v: ScaleArg) -> Self {
        match v {
            ScaleArg::Whole => ScaleMode::WholeFactor,
            ScaleArg::Exact => ScaleMode::Exact,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum FilterArg {
    Nearest,
    Triangle,
    Lanczos3,
}

impl From<FilterArg> for ResampleFilter {
    fn from(v: FilterArg) -> Self {
        match v {
            FilterArg::Nearest => ResampleFilter::Nearest,
            FilterArg::Triangle => ResampleFilter::Triangle,
            FilterArg::Lanczos3 => ResampleFilter::Lanczos3,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
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

    // ── Settings file ────────────────────────────────────────────────────
    let settings = match cli.config {
        Some(ref path) => Settings::load(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?,
        None => Settings::load_or_default(&Settings::default_path())
            .context("Failed to read settings")?,
    };

    let progress = show_progress.then(CliProgressCallback::new);

    match cli.command {
        Command::Run(ref args) => {
            let report = run_pipeline(args, &settings, progress.clone())?;
            if let Some(ref cb) = progress {
                cb.finish();
            }
            print_report(&cli, &report)?;
        }
        Command::Publish(ref args) => {
            let dir = args
                .target
                .clone()
                .or_else(|| settings.target_dir.clone())
                .unwrap_or_else(|| PathBuf::from("ready"));
            let (store, target) = build_store(&args.storage, &settings, &args.kind)?;
            let cb = progress.clone().map(|c| c as ProgressCallback);
            let published = publish_dir(&store, &target, &dir, &cb)
                .with_context(|| format!("Failed to publish {}", dir.display()))?;
            if let Some(ref cb) = progress {
                cb.finish();
            }
            print_published(&cli, &published)?;
        }
        Command::Clean(ref args) => {
            let dir = working_dir(args.dir.as_deref(), &settings);
            let removed = relocate::clean(&dir, args.batch)
                .with_context(|| format!("Failed to clean batch {}", args.batch))?;
            if let Some(ref cb) = progress {
                cb.finish();
            }
            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&removed).context("Failed to serialise output")?
                );
            } else if !cli.quiet {
                for p in &removed {
                    eprintln!("  {} {}", dim("-"), p.display());
                }
                eprintln!(
                    "{} removed {} files of batch {}",
                    green("✔"),
                    bold(&removed.len().to_string()),
                    args.batch
                );
            }
        }
    }

    Ok(())
}

fn working_dir(flag: Option<&Path>, settings: &Settings) -> PathBuf {
    flag.map(Path::to_path_buf)
        .or_else(|| settings.base_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Map CLI args (over settings-file values) to `PipelineConfig` and run it.
fn run_pipeline(
    args: &RunArgs,
    settings: &Settings,
    progress: Option<Arc<CliProgressCallback>>,
) -> Result<PipelineReport> {
    let dir = working_dir(args.dir.as_deref(), settings);
    let target = args
        .target
        .clone()
        .or_else(|| settings.target_dir.clone())
        .unwrap_or_else(|| dir.join("ready"));
    let width = args.width.or(settings.target_width).unwrap_or(600);
    let height = args.height.or(settings.target_height).unwrap_or(300);

    let mut builder = PipelineConfig::builder(&dir, &target)
        .kind(args.kind.clone())
        .target_box(width, height)
        .keep_originals(!args.discard_originals)
        .resize(!args.no_resize)
        .scale_mode(args.scale.clone().into())
        .filter(args.filter.clone().into());

    if let Some(tag) = args.batch {
        builder = builder.batch(tag);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb as ProgressCallback);
    }

    let store = if args.upload {
        let (store, publish) = build_store(&args.storage, settings, &args.kind)?;
        builder = builder.publish(publish);
        Some(store)
    } else {
        None
    };

    let config = builder.build().context("Invalid configuration")?;

    let rasterizer = match args.inkscape.clone().or_else(|| settings.inkscape.clone()) {
        Some(p) => InkscapeRasterizer::with_program(p),
        None => InkscapeRasterizer::new(),
    };

    run(
        &config,
        &rasterizer,
        store.as_ref().map(|s| s as &dyn ObjectStore),
    )
    .with_context(|| format!("Batch run in {} failed", dir.display()))
}

/// Resolve storage flags over the settings file into a client and target.
fn build_store(
    args: &StorageArgs,
    settings: &Settings,
    kind: &AssetKind,
) -> Result<(SpacesClient, PublishTarget)> {
    let s = &settings.storage;
    let pick = |flag: &Option<String>, file: &Option<String>, name: &str| {
        flag.clone()
            .or_else(|| file.clone())
            .filter(|v| !v.trim().is_empty())
            .with_context(|| format!("Missing storage setting '{name}' (flag, env or settings file)"))
    };

    let bucket = pick(&args.bucket, &s.bucket, "bucket")?;
    let region = pick(&args.region, &s.region, "region")?;
    let key = pick(&args.key, &s.access_key, "access key")?;
    let secret = pick(&args.secret, &s.secret_key, "secret key")?;
    let folder = args
        .folder
        .clone()
        .or_else(|| s.folder.clone())
        .unwrap_or_else(|| PublishTarget::default_folder(kind));

    let mut config = SpacesConfig::new(region, key, secret);
    if let Some(ref domain) = s.domain {
        config = config.with_domain(domain.clone());
    }
    let client = SpacesClient::new(config).context("Failed to set up storage client")?;

    Ok((client, PublishTarget::new(bucket, folder)))
}

fn print_report(cli: &Cli, report: &PipelineReport) -> Result<()> {
    if cli.json {
        let json = serde_json::to_string_pretty(report).context("Failed to serialise output")?;
        println!("{json}");
        return Ok(());
    }
    if cli.quiet {
        return Ok(());
    }

    for w in &report.warnings {
        eprintln!("  {} {}", yellow("⚠"), w);
    }
    for asset in report.relocated() {
        println!("{}", asset.path.display());
    }
    for p in &report.published {
        println!("{}", p.url);
    }

    let s = &report.stats;
    eprintln!(
        "{}  batch {}  {} relocated  {} skipped  {} published  {}ms  →  {}",
        if s.skipped == 0 { green("✔") } else { yellow("⚠") },
        report.batch,
        bold(&s.relocated.to_string()),
        s.skipped,
        s.published,
        s.total_duration_ms,
        bold(&report.target_dir.display().to_string()),
    );
    Ok(())
}

fn print_published(cli: &Cli, published: &[PublishResult]) -> Result<()> {
    if cli.json {
        let json = serde_json::to_string_pretty(published).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        for p in published {
            println!("{}", p.url);
        }
        eprintln!("{} {} files published", green("✔"), bold(&published.len().to_string()));
    }
    Ok(())
}
