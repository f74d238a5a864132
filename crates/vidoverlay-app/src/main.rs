//! VideoOverlay - exports a movie with a timestamp overlay on every frame.
//!
//! Usage:
//!   vidoverlay export [OPTIONS]    Render the overlay movie to a file
//!   vidoverlay config [OPTIONS]    Print the effective configuration

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use vidoverlay_compositor::{CompositingEngine, DrawParams, TextWidget, TimestampFormat};
use vidoverlay_core::{AppConfig, FrameRate, RationalTime, SinkKind};
use vidoverlay_media::{
    sink_for, ExportJob, ExportProgressReporter, ExportSession, SyntheticMovie, VideoComposition,
};

mod logging;

#[derive(Parser)]
#[command(
    name = "vidoverlay",
    about = "Burn a timestamp overlay into every frame of a movie",
    version
)]
struct Cli {
    /// Config file (defaults to the standard location)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the overlay movie
    Export {
        #[command(flatten)]
        overrides: Overrides,

        /// Source movie width
        #[arg(long, default_value = "1280")]
        width: u32,

        /// Source movie height
        #[arg(long, default_value = "720")]
        height: u32,

        /// Source movie length in seconds (the export itself is capped by --duration)
        #[arg(long, default_value = "10.0")]
        movie_secs: f64,
    },

    /// Print the effective configuration as JSON
    Config {
        #[command(flatten)]
        overrides: Overrides,

        /// Also write it to the config file
        #[arg(long)]
        save: bool,
    },
}

/// Command-line overrides of the config file.
#[derive(Args, Debug, Default)]
struct Overrides {
    /// Output file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Maximum exported duration in seconds
    #[arg(long)]
    duration: Option<f64>,

    /// Output frame rate
    #[arg(long)]
    fps: Option<u32>,

    /// Frame sink
    #[arg(long, value_enum)]
    sink: Option<SinkArg>,

    /// TrueType font for the overlay text
    #[arg(long)]
    font: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum SinkArg {
    Raw,
    Ffmpeg,
}

impl From<SinkArg> for SinkKind {
    fn from(arg: SinkArg) -> Self {
        match arg {
            SinkArg::Raw => SinkKind::Raw,
            SinkArg::Ffmpeg => SinkKind::Ffmpeg,
        }
    }
}

impl Overrides {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(output) = &self.output {
            config.export.output = output.clone();
        }
        if let Some(duration) = self.duration {
            config.export.max_duration_secs = duration;
        }
        if let Some(fps) = self.fps {
            config.export.frame_rate = FrameRate::new(fps, 1);
        }
        if let Some(sink) = self.sink {
            config.export.sink = sink.into();
        }
        if let Some(font) = &self.font {
            config.compositor.text.font_path = Some(font.clone());
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let overrides = match &cli.command {
        Commands::Export { overrides, .. } | Commands::Config { overrides, .. } => overrides,
    };
    let config = load_config(cli.config.as_deref(), overrides, cli.verbose)?;
    logging::init_logging(&config.logging);

    match cli.command {
        Commands::Export {
            width,
            height,
            movie_secs,
            ..
        } => export(&config, (width, height), movie_secs),
        Commands::Config { save, .. } => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            if save {
                let path = cli
                    .config
                    .or_else(vidoverlay_core::config::default_path)
                    .ok_or_else(|| anyhow!("no config directory on this platform"))?;
                config.save(&path)?;
                info!(path = %path.display(), "configuration saved");
            }
            Ok(())
        }
    }
}

/// Config from `path` when given (which must load), else the standard
/// location or defaults, with command-line overrides applied.
fn load_config(path: Option<&Path>, overrides: &Overrides, verbose: bool) -> Result<AppConfig> {
    let mut config = match path {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => AppConfig::load_or_default(None),
    };
    overrides.apply(&mut config);
    if verbose {
        config.logging.level = "debug".into();
    }
    config.validate()?;
    Ok(config)
}

fn build_engine(config: &AppConfig) -> Result<CompositingEngine> {
    let params = DrawParams {
        timestamp: TimestampFormat::TimecodeWithSeconds(config.export.frame_rate),
        ..DrawParams::from(&config.compositor)
    };
    let text = TextWidget::new(config.compositor.text.clone())?;
    let engine = CompositingEngine::builder()
        .worker_threads(config.compositor.worker_threads)
        .draw_params(params)
        .widget(Arc::new(text))
        .build()?;
    Ok(engine)
}

fn export(config: &AppConfig, size: (u32, u32), movie_secs: f64) -> Result<()> {
    let output = &config.export.output;
    if output.exists() {
        std::fs::remove_file(output)
            .with_context(|| format!("failed to remove existing {}", output.display()))?;
        info!(path = %output.display(), "removed existing output");
    }

    let movie = Arc::new(SyntheticMovie::single_track(
        size.0,
        size.1,
        RationalTime::from_seconds_f64(movie_secs),
    ));
    let composition = VideoComposition::overlay(&movie, config.export.frame_rate)?;
    let engine = Arc::new(build_engine(config)?);
    let session = ExportSession::new(movie, composition, ExportJob::from_config(&config.export));

    let reporter = ExportProgressReporter::new(
        session.handle(),
        Duration::from_millis(config.export.report_interval_ms),
    );
    let sink = sink_for(config.export.sink, output);

    reporter.start();
    let thread = session.export_asynchronously(engine, sink, |status| {
        info!(?status, "export finished");
    })?;
    let result = thread
        .join()
        .map_err(|_| anyhow!("export thread panicked"))?;
    reporter.stop();
    info!("{}", reporter.report());

    result.with_context(|| format!("export to {} failed", output.display()))?;
    println!("{}", output.display());
    Ok(())
}
