//! CLI entry point for pick-sleep-background
//!
//! Without a subcommand this picks a background and prints the `i3lock`
//! command for it, which is all a lock wrapper script needs. Everything
//! else edits or inspects the history file.
//!
//! Diagnostics go to the log file, never to stdout: an empty stdout is how
//! the wrapper knows the pick failed.

use clap::builder::PossibleValuesParser;
use clap::{Args, Parser, Subcommand};
use colored::*;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

use sleep_background::core::document::SETTABLE_KEYS;
use sleep_background::core::{now_timestamp, ExclusionReason, PolicyOverrides};
use sleep_background::history::catalog::{image_exists, is_supported_image};
use sleep_background::history::{expand_path, HistoryError, HistoryStore};
use sleep_background::overlay::ImageMagick;
use sleep_background::picker::{evaluate, pick, PickRequest};

#[derive(Parser)]
#[command(name = "pick-sleep-background")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// History / configuration JSON file
    #[arg(short, long, global = true, default_value = "~/.config/i3/sleep_history.json")]
    config: PathBuf,

    /// Log file for all diagnostics
    #[arg(long, global = true, default_value = "~/.config/i3/logs/pick_sleep_background.log")]
    log_file: PathBuf,

    /// Log to stderr at debug level instead of the log file
    #[arg(long, global = true)]
    log_stderr: bool,

    /// Options for the default pick (no subcommand)
    #[command(flatten)]
    pick: PickArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create a blank history (the old one is backed up)
    Init,

    /// Adjust a top-level value in the history
    Set {
        /// Top-level key to change
        #[arg(value_parser = PossibleValuesParser::new(SETTABLE_KEYS.iter().copied()))]
        key: String,

        #[arg(allow_hyphen_values = true)]
        value: String,
    },

    /// Index images (relative to base_path), touching their last-access
    Index {
        #[arg(required = true)]
        images: Vec<String>,
    },

    /// Set individual penalty weights, as IMAGE=WEIGHT
    Penalize {
        #[arg(required = true, value_parser = parse_penalty)]
        penalties: Vec<(String, i64)>,
    },

    /// Omit (or un-omit) images from selection
    ToggleOmit {
        #[arg(required = true)]
        images: Vec<String>,
    },

    /// Validate the history and print it
    Parse {
        /// Also show the weights a pick would use
        #[arg(long)]
        with_weights: bool,
    },

    /// Pick a background and print the lock command (default)
    Pick(PickArgs),
}

#[derive(Args, Debug, Default)]
struct PickArgs {
    /// Overlay text on the image (caches a new image per unique text)
    #[arg(long)]
    overlay_text: Option<String>,

    /// Override penalty-weight-multiplier for this run only
    #[arg(long, allow_negative_numbers = true)]
    penalty_multiplier: Option<i64>,

    /// Override frequency-weight-multiplier for this run only
    #[arg(long, allow_negative_numbers = true)]
    frequency_multiplier: Option<f64>,

    /// Override new-image-weight-advantage for this run only
    #[arg(long, allow_negative_numbers = true)]
    new_image_advantage: Option<f64>,
}

impl PickArgs {
    fn is_set(&self) -> bool {
        self.overlay_text.is_some()
            || self.penalty_multiplier.is_some()
            || self.frequency_multiplier.is_some()
            || self.new_image_advantage.is_some()
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);
    tracing::info!("Starting pick-sleep-background with {:?}", cli.command);

    if let Err(err) = run(cli) {
        tracing::error!("{:#}", err);
        eprintln!("{} {:#}", "✗".red().bold(), err);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let store = HistoryStore::new(expand(&cli.config)?);

    let command = match cli.command {
        None => Commands::Pick(cli.pick),
        Some(_) if cli.pick.is_set() => {
            anyhow::bail!("Pick options before a subcommand only apply when no subcommand is given");
        }
        Some(command) => command,
    };

    match command {
        Commands::Init => init_history(&store)?,
        Commands::Set { key, value } => set_value(&store, &key, &value)?,
        Commands::Index { images } => index_images(&store, &images)?,
        Commands::Penalize { penalties } => penalize_images(&store, &penalties)?,
        Commands::ToggleOmit { images } => toggle_omit(&store, &images)?,
        Commands::Parse { with_weights } => parse_history(&store, with_weights)?,
        Commands::Pick(args) => pick_background(&store, args)?,
    }

    Ok(())
}

/// Installs the tracing subscriber (log file, or stderr when asked)
fn init_logging(cli: &Cli) {
    let default_level = if cli.log_stderr { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    if cli.log_stderr {
        builder.with_writer(std::io::stderr).init();
        return;
    }

    match open_log_file(&cli.log_file) {
        Ok(file) => builder.with_ansi(false).with_writer(Mutex::new(file)).init(),
        Err(e) => {
            builder.with_writer(std::io::stderr).init();
            tracing::warn!("Cannot open log file {}: {}", cli.log_file.display(), e);
        }
    }
}

fn open_log_file(path: &Path) -> anyhow::Result<File> {
    let path = expand(path)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

/// Expand tilde in a CLI path
fn expand(path: &Path) -> anyhow::Result<PathBuf> {
    let raw = path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid path encoding"))?;
    Ok(expand_path(raw))
}

fn parse_penalty(raw: &str) -> Result<(String, i64), String> {
    let (image, weight) = raw
        .rsplit_once('=')
        .ok_or_else(|| format!("expected IMAGE=WEIGHT, got '{}'", raw))?;
    let weight = weight
        .trim()
        .parse()
        .map_err(|_| format!("penalty weight for '{}' must be an integer", image))?;
    Ok((image.to_string(), weight))
}

fn init_history(store: &HistoryStore) -> anyhow::Result<()> {
    store.init()?;
    println!("{} Initialized blank history at {}", "✓".green(), store.path().display());
    Ok(())
}

fn set_value(store: &HistoryStore, key: &str, value: &str) -> anyhow::Result<()> {
    let mut document = store.load()?;
    let previous = document.set_policy_value(key, value).map_err(HistoryError::from)?;

    if key == "base_path" {
        tracing::warn!(
            "Overriding base_path may invalidate image paths unless all images formerly indexed at {} can be located at {}",
            previous,
            value
        );
        let indexed = document.images.keys().cloned().collect::<Vec<_>>();
        tracing::info!(
            "Current indexed images at {} are: {}",
            previous,
            if indexed.is_empty() { "N/A".to_string() } else { indexed.join(", ") }
        );
    }

    tracing::info!("Override configuration key {} (former value: {}) with new value {}", key, previous, value);
    store.save(&document)?;

    println!("{} {} → {} (was {})", "✓".green(), key.cyan(), value.bold(), previous.dimmed());
    Ok(())
}

fn index_images(store: &HistoryStore, images: &[String]) -> anyhow::Result<()> {
    let mut document = store.load()?;
    let base_path = expand_path(&document.base_path);

    for image in images {
        if !image_exists(&base_path, image) {
            return Err(HistoryError::ImageNotFound {
                image: image.clone(),
                base_path,
            }
            .into());
        }
        if !is_supported_image(Path::new(image)) {
            tracing::warn!("Indexed image '{}' is not a PNG; the lock screen may reject it", image);
        }
    }

    // Space the timestamps a second apart so argument order is recency order
    let now = now_timestamp();
    let last = images.len().saturating_sub(1);
    for (idx, image) in images.iter().enumerate() {
        let at = now - chrono::TimeDelta::seconds((last - idx) as i64);
        if document.index_image(image, at) {
            tracing::info!("Indexed NEW image '{}' at {}", image, at);
        } else {
            tracing::info!("Touched image '{}' at {}", image, at);
        }
    }

    store.save(&document)?;
    println!("{} Indexed {} image{}", "✓".green(), images.len(), if images.len() == 1 { "" } else { "s" });
    Ok(())
}

fn penalize_images(store: &HistoryStore, penalties: &[(String, i64)]) -> anyhow::Result<()> {
    let mut document = store.load()?;

    for (image, penalty) in penalties {
        let previous = document.set_penalty(image, *penalty).map_err(HistoryError::from)?;
        tracing::info!("Set penalty-weight of '{}' to {} (was {})", image, penalty, previous);
        println!("{} {} penalty {} (was {})", "✓".green(), image.cyan(), penalty, previous);
    }

    store.save(&document)?;
    Ok(())
}

fn toggle_omit(store: &HistoryStore, images: &[String]) -> anyhow::Result<()> {
    let mut document = store.load()?;

    for image in images {
        let omitted = document.toggle_omit(image).map_err(HistoryError::from)?;
        tracing::info!("Set omit of '{}' to {}", image, omitted);
        let state = if omitted { "omitted".yellow() } else { "included".green() };
        println!("{} {} {}", "✓".green(), image.cyan(), state);
    }

    store.save(&document)?;
    Ok(())
}

fn parse_history(store: &HistoryStore, with_weights: bool) -> anyhow::Result<()> {
    let document = store.load()?;
    println!("{}", serde_json::to_string_pretty(&document)?);

    if !with_weights {
        return Ok(());
    }

    let weighting = evaluate(&document, &PolicyOverrides::default())?;
    println!("\n{}", "Weights:".bold());
    for (key, weight) in &weighting.weights {
        println!("  {} {:.3}", key.cyan(), weight);
    }
    for exclusion in &weighting.excluded {
        let reason = match exclusion.reason {
            ExclusionReason::Omitted => "omitted".to_string(),
            ExclusionReason::NegativeWeight(weight) => format!("negative weight {:.3}", weight),
        };
        println!("  {} {}", exclusion.key.dimmed(), reason.yellow());
    }

    let total: f64 = weighting.weights.values().sum();
    println!("\n{} {} candidates, total weight {:.3}", "✓".green(), weighting.weights.len(), total);
    Ok(())
}

fn pick_background(store: &HistoryStore, args: PickArgs) -> anyhow::Result<()> {
    let request = PickRequest {
        overrides: PolicyOverrides {
            penalty_weight_multiplier: args.penalty_multiplier,
            frequency_weight_multiplier: args.frequency_multiplier,
            new_image_weight_advantage: args.new_image_advantage,
        },
        overlay_text: args.overlay_text,
    };

    let selection = pick(store, &request, &ImageMagick::default(), &mut rand::rng())?;
    tracing::info!("Selected '{}' -> {}", selection.key, selection.image_path.display());

    // The only stdout output of a successful pick
    println!("{}", selection.lock_command());
    Ok(())
}
