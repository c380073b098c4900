mod core;
mod display;
mod emission;
mod input;
mod output;
mod source;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::display::{quantize, DisplayCode};
use crate::emission::Accumulator;
use crate::input::load_csv;
use crate::output::RecordWriter;
use crate::source::{MockSampleSource, ReplaySource, SampleFeed};

/// Persistent monitor settings
#[derive(Serialize, Deserialize)]
#[serde(default)]
struct Config {
    /// Sealed reference volume for concentration buildup (liters)
    confined_volume_l: f64,
    /// Default output log path for live capture
    output_path: PathBuf,
    /// Speed factor used for paced replay (1.0 = recorded cadence)
    replay_speed: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            confined_volume_l: 55.0,
            output_path: PathBuf::from("co2_log.csv"),
            replay_speed: 1.0,
        }
    }
}

impl Config {
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("co2-obd").join("config.json"))
    }

    fn load() -> Self {
        if let Some(path) = Self::config_path() {
            if path.exists() {
                if let Ok(contents) = fs::read_to_string(&path) {
                    if let Ok(config) = serde_json::from_str(&contents) {
                        return config;
                    }
                }
            }
        }
        Self::default()
    }

    fn save(&self) {
        if let Some(path) = Self::config_path() {
            if let Some(parent) = path.parent() {
                let _ = fs::create_dir_all(parent);
            }
            if let Ok(json) = serde_json::to_string_pretty(self) {
                let _ = fs::write(&path, json);
            }
        }
    }
}

enum Mode {
    Live {
        out: PathBuf,
    },
    Replay {
        log: PathBuf,
        out: Option<PathBuf>,
        paced: bool,
    },
}

const USAGE: &str = "Usage: co2-obd live [--out <csv>] | co2-obd replay <log.csv> [--out <csv>] [--paced]";

fn parse_args<I: Iterator<Item = String>>(mut args: I, config: &Config) -> Result<Mode> {
    match args.next().as_deref() {
        Some("live") => {
            let mut out = config.output_path.clone();
            while let Some(arg) = args.next() {
                match arg.as_str() {
                    "--out" => out = PathBuf::from(args.next().context("--out needs a path")?),
                    other => bail!("Unknown argument '{}'. {}", other, USAGE),
                }
            }
            Ok(Mode::Live { out })
        }
        Some("replay") => {
            let log = PathBuf::from(args.next().with_context(|| USAGE.to_string())?);
            let mut out = None;
            let mut paced = false;
            while let Some(arg) = args.next() {
                match arg.as_str() {
                    "--out" => {
                        out = Some(PathBuf::from(args.next().context("--out needs a path")?))
                    }
                    "--paced" => paced = true,
                    other => bail!("Unknown argument '{}'. {}", other, USAGE),
                }
            }
            Ok(Mode::Replay { log, out, paced })
        }
        _ => bail!(USAGE),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::load();
    if !Config::config_path().map_or(false, |p| p.exists()) {
        // First run: write the defaults out so the volume is discoverable.
        config.save();
    }

    match parse_args(std::env::args().skip(1), &config)? {
        Mode::Live { out } => run_live(&config, &out).await,
        Mode::Replay { log, out, paced } => run_replay(&config, &log, out.as_deref(), paced).await,
    }
}

/// Live capture: poll the source at its own pace, append every record to the
/// sink, and publish the quantized display code for the display consumer.
async fn run_live(config: &Config, out: &Path) -> Result<()> {
    let mut accumulator = Accumulator::new(config.confined_volume_l);
    let mut writer = RecordWriter::create(out)?;

    let (display_tx, display_rx) = watch::channel(DisplayCode::default());
    spawn_display_consumer(display_rx);

    let mut feed = SampleFeed::new();
    let source = Box::new(MockSampleSource::new("mock0"));
    let mut rx = feed.start(source).await.map_err(anyhow::Error::msg)?;

    info!(output = %out.display(), volume_l = config.confined_volume_l, "live capture started (ctrl-c to stop)");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("stopping capture");
                feed.stop();
                break;
            }
            sample = rx.recv() => {
                let Some(sample) = sample else { break };
                let record = accumulator.process(&sample);
                writer.append(&record)?;
                let _ = display_tx.send(quantize(record.ppm_per_sec));
                println!("{}", record.console_line());
            }
        }
    }

    info!(
        samples = feed.stats().samples_received.load(Ordering::SeqCst),
        gaps = feed.stats().gap_samples.load(Ordering::SeqCst),
        errors = feed.stats().errors.load(Ordering::SeqCst),
        total_co2_g = accumulator.cumulative_co2_g(),
        distance_km = accumulator.cumulative_distance_km(),
        "capture finished"
    );
    Ok(())
}

/// Replay a recorded log through a fresh accumulator, optionally paced to
/// the recorded cadence and optionally appending to a result log.
async fn run_replay(config: &Config, log: &Path, out: Option<&Path>, paced: bool) -> Result<()> {
    let samples = load_csv(log)?;
    info!(count = samples.len(), log = %log.display(), "replaying log");

    let mut source = ReplaySource::new("replay", samples);
    if paced {
        source.set_speed(config.replay_speed);
    }

    let mut accumulator = Accumulator::new(config.confined_volume_l);
    let mut writer = out.map(RecordWriter::create).transpose()?;

    let mut feed = SampleFeed::new();
    let mut rx = feed.start(Box::new(source)).await.map_err(anyhow::Error::msg)?;

    while let Some(sample) = rx.recv().await {
        let record = accumulator.process(&sample);
        if let Some(writer) = writer.as_mut() {
            writer.append(&record)?;
        }
        println!("{}", record.console_line());
    }

    let gaps = feed.stats().gap_samples.load(Ordering::SeqCst);
    if gaps > 0 {
        warn!(gaps, "log contained rows without a usable MAF reading");
    }
    println!(
        "Replay complete: {:.2} g CO2 over {:.3} km",
        accumulator.cumulative_co2_g(),
        accumulator.cumulative_distance_km()
    );
    Ok(())
}

/// The display consumer observes the latest quantized code at its own
/// cadence; the watch channel keeps only the newest value, the way a
/// physical two-digit readout would.
fn spawn_display_consumer(mut display_rx: watch::Receiver<DisplayCode>) {
    tokio::spawn(async move {
        while display_rx.changed().await.is_ok() {
            let code = display_rx.borrow_and_update().clone();
            match code.digits() {
                Some((tens, tenths)) => debug!("display {}{}", tens, tenths),
                None => warn!(code = %code, "display code out of range for two digits"),
            }
        }
    });
}
