//! dseq CLI: headless playback and WAV export of the demo song.
//!
//! Usage:
//!   dseq-cli play [--label lead] [--record out.wav]
//!   dseq-cli render out.wav [--seconds 60]

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use dseq::{demo_bank, demo_song, Controller, EngineConfig, DEMO_LABELS};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "dseq-cli")]
#[command(about = "Play or render the built-in dseq demo song")]
struct Cli {
    #[command(flatten)]
    session: SessionArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SessionArgs {
    /// Sequence loops before fading out (0 plays forever)
    #[arg(long, global = true, default_value_t = 2)]
    loops: u32,

    /// Seed for random commands
    #[arg(long, global = true, default_value_t = 0)]
    seed: u64,

    /// Mute a track (repeatable)
    #[arg(long, global = true, value_name = "TRACK")]
    mute: Vec<usize>,

    /// Linear output gain
    #[arg(long, global = true, default_value_t = 1.0)]
    volume: f32,
}

#[derive(Subcommand)]
enum Commands {
    /// Play through the default audio device
    Play {
        /// Entry point to start from
        #[arg(long)]
        label: Option<String>,

        /// Also record the output to a WAV file
        #[arg(long)]
        record: Option<PathBuf>,
    },
    /// Render offline to a WAV file
    Render {
        /// Output path
        out: PathBuf,

        /// Maximum length in seconds
        #[arg(long, default_value_t = 300)]
        seconds: u32,
    },
    /// List the demo song's entry points
    Labels,
}

impl SessionArgs {
    fn config(&self) -> Result<EngineConfig> {
        let mut config = EngineConfig {
            loops: self.loops,
            seed: self.seed,
            master_volume: self.volume,
            ..EngineConfig::default()
        };
        for &track in &self.mute {
            match config.mutes.get_mut(track) {
                Some(m) => *m = true,
                None => bail!("track {track} out of range (0-{})", config.mutes.len() - 1),
            }
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.session.config()?;
    let song = demo_song().context("failed to build demo song")?;
    let mut ctrl = Controller::new(song, demo_bank(), config);

    match cli.command {
        Commands::Play { label, record } => play(&mut ctrl, label.as_deref(), record),
        Commands::Render { out, seconds } => render(&ctrl, &out, seconds),
        Commands::Labels => {
            for label in DEMO_LABELS {
                let index = ctrl.sequence().label(label).unwrap_or_default();
                println!("{label:<8} {index}");
            }
            Ok(())
        }
    }
}

fn play(ctrl: &mut Controller, label: Option<&str>, record: Option<PathBuf>) -> Result<()> {
    match (label, record) {
        (Some(_), Some(_)) => bail!("--label and --record cannot be combined"),
        (Some(label), None) => ctrl.play_label(label).context("failed to start playback")?,
        (None, Some(path)) => ctrl
            .play_recorded(&path)
            .with_context(|| format!("failed to record to {}", path.display()))?,
        (None, None) => ctrl.play(),
    }
    tracing::info!("playing (loops: {})", ctrl.config().loops);

    while !ctrl.is_finished() {
        print!("\rframes: {:>8} | ticks: {:>6}", ctrl.frames_played(), ctrl.ticks());
        let _ = std::io::stdout().flush();
        std::thread::sleep(Duration::from_millis(50));
    }
    println!();

    ctrl.stop().context("failed to finish playback")?;
    println!("Done.");
    Ok(())
}

fn render(ctrl: &Controller, out: &Path, seconds: u32) -> Result<()> {
    tracing::info!("rendering to {} (max {seconds}s)", out.display());
    let frames = ctrl
        .render_to_file(out, seconds)
        .with_context(|| format!("failed to write {}", out.display()))?;
    println!(
        "Rendered {frames} frames ({:.1}s)",
        frames as f64 / dseq_engine::SAMPLE_RATE as f64
    );
    Ok(())
}
