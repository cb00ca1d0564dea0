//! Accelerometer activity agent CLI.

use accel_activity_agent::{
    classifier::{build_classifier, labels::load_labels, Classifier, ClassifierKind},
    collector::{
        parse_recording, ReplayCollector, SampleSource, SyntheticCollector, SyntheticPattern,
    },
    config::{Config, SourceKind},
    core::{
        run_classification, ClassificationOutcome, ClassificationRecord, DispatchPolicy,
        ListeningSession, RecordBuilder, SampleBuffer,
    },
    stats::{create_shared_stats_with_persistence, SharedStats},
    VERSION,
};
use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "activity-sensor")]
#[command(version = VERSION)]
#[command(about = "Accelerometer activity recognition agent", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log per-reading detail
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start listening and classifying
    Start {
        /// Sample source (synthetic or replay)
        #[arg(long)]
        source: Option<SourceKind>,

        /// Recording to replay (implies --source replay)
        #[arg(long)]
        replay: Option<PathBuf>,

        /// Restart the recording when it ends
        #[arg(long)]
        loop_replay: bool,

        /// Synthetic waveform (still, walking, running, weightlifting)
        #[arg(long)]
        pattern: Option<SyntheticPattern>,

        /// Readings per second
        #[arg(long)]
        rate: Option<u32>,

        /// Dispatch policy (sync or async)
        #[arg(long)]
        policy: Option<DispatchPolicy>,

        /// Source re-registration period in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Keep the source registered while a window is classified
        #[arg(long)]
        keep_listening: bool,

        /// Stop after this many classified windows
        #[arg(long)]
        max_windows: Option<u64>,

        #[command(flatten)]
        classifier: ClassifierArgs,
    },

    /// Classify a recording offline, window by window
    Classify {
        /// Recording file (x,y,z per line)
        input: PathBuf,

        #[command(flatten)]
        classifier: ClassifierArgs,
    },

    /// Show current configuration and cumulative statistics
    Status,

    /// List classifier labels
    Labels {
        #[command(flatten)]
        classifier: ClassifierArgs,
    },

    /// Export collected classification records
    Export {
        /// Output directory for records
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Export format
        #[arg(long, value_enum, default_value = "json")]
        format: ExportFormat,
    },

    /// Show configuration
    Config,
}

/// Layout of an export file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ExportFormat {
    /// One pretty-printed JSON array
    Json,
    /// One record per line
    Jsonl,
}

impl ExportFormat {
    fn extension(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Jsonl => "jsonl",
        }
    }
}

#[derive(Args)]
struct ClassifierArgs {
    /// Classifier back-end (heuristic or linear)
    #[arg(long)]
    classifier: Option<ClassifierKind>,

    /// Model file for the linear classifier
    #[arg(long)]
    model: Option<PathBuf>,

    /// Label file, one label per line
    #[arg(long)]
    labels: Option<PathBuf>,
}

impl ClassifierArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(kind) = self.classifier {
            config.classifier.kind = kind;
        }
        if let Some(ref model) = self.model {
            config.classifier.model_path = Some(model.clone());
        }
        if let Some(ref labels) = self.labels {
            config.classifier.label_path = Some(labels.clone());
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli.config.clone().unwrap_or_else(Config::config_path);
    let config = match Config::load_from(&config_path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Could not load {}: {e}; using defaults", config_path.display());
            Config::default()
        }
    };

    let result = match cli.command {
        Commands::Start {
            source,
            replay,
            loop_replay,
            pattern,
            rate,
            policy,
            interval_ms,
            keep_listening,
            max_windows,
            classifier,
        } => {
            let mut config = config;
            classifier.apply(&mut config);
            if let Some(kind) = source {
                config.source.kind = kind;
            }
            if let Some(path) = replay {
                config.source.kind = SourceKind::Replay;
                config.source.replay_path = Some(path);
            }
            if loop_replay {
                config.source.loop_replay = true;
            }
            if let Some(rate) = rate {
                config.source.rate_hz = rate;
            }
            if let Some(policy) = policy {
                config.dispatch.policy = policy;
            }
            if let Some(ms) = interval_ms {
                config.sampling_interval = Duration::from_millis(ms);
            }
            if keep_listening {
                config.dispatch.unregister_on_full = false;
            }
            if let Some(pattern) = pattern {
                config.source.pattern = pattern;
            }
            cmd_start(config, max_windows)
        }
        Commands::Classify { input, classifier } => {
            let mut config = config;
            classifier.apply(&mut config);
            cmd_classify(&config, &input)
        }
        Commands::Status => cmd_status(&config),
        Commands::Labels { classifier } => {
            let mut config = config;
            classifier.apply(&mut config);
            cmd_labels(&config)
        }
        Commands::Export { output, format } => cmd_export(&config, output, format),
        Commands::Config => cmd_config(&config, &config_path),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

/// Install the tracing subscriber; `RUST_LOG` overrides the default level.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_classifier(config: &Config) -> Result<Arc<dyn Classifier>> {
    let classifier = build_classifier(config.classifier.kind, &config.classifier.params())
        .with_context(|| format!("initializing {} classifier", config.classifier.kind))?;
    Ok(Arc::from(classifier))
}

fn cmd_start(config: Config, max_windows: Option<u64>) -> Result<()> {
    config.validate()?;
    if let Err(e) = config.ensure_directories() {
        tracing::warn!("Could not create directories: {e}");
    }

    println!("Accel Activity Agent v{VERSION}");
    println!();
    println!("Starting session...");
    println!("  Source: {:?}", config.source.kind);
    println!("  Rate: {} Hz", config.source.rate_hz);
    println!("  Window: {} floats", config.buffer_capacity);
    println!("  Dispatch: {}", config.dispatch.policy);
    println!("  Classifier: {}", config.classifier.kind);
    println!(
        "  Duty cycle: {}ms",
        config.sampling_interval.as_millis()
    );
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let classifier = load_classifier(&config)?;
    let stats = create_shared_stats_with_persistence(config.stats_path());

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone());

    let collector_config = config.source.collector_config();
    let records = match config.source.kind {
        SourceKind::Synthetic => {
            println!("  Pattern: {}", config.source.pattern);
            let source = SyntheticCollector::new(config.source.pattern, collector_config);
            run_session(source, &config, classifier, stats.clone(), &running, max_windows)?
        }
        SourceKind::Replay => {
            let path = config
                .source
                .replay_path
                .as_deref()
                .context("replay source requires a recording")?;
            let source =
                ReplayCollector::from_path(path, collector_config, config.source.loop_replay)?;
            run_session(source, &config, classifier, stats.clone(), &running, max_windows)?
        }
    };

    if let Err(e) = stats.save() {
        tracing::warn!("Could not save statistics: {e}");
    }

    if !records.is_empty() {
        let export_path = config.export_path.join(format!(
            "session_{}.json",
            Utc::now().format("%Y%m%d_%H%M%S")
        ));
        if let Some(parent) = export_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&records)?;
        std::fs::write(&export_path, json)
            .with_context(|| format!("writing {}", export_path.display()))?;
        println!("Exported {} records to {:?}", records.len(), export_path);
    }

    println!();
    println!("{}", stats.summary());
    Ok(())
}

fn run_session<S: SampleSource>(
    source: S,
    config: &Config,
    classifier: Arc<dyn Classifier>,
    stats: SharedStats,
    running: &AtomicBool,
    max_windows: Option<u64>,
) -> Result<Vec<ClassificationRecord>> {
    let mut session = ListeningSession::new(source, classifier, config.session_config(), stats)?;
    let builder = RecordBuilder::new();
    println!("Instance ID: {}", builder.instance_id());

    let mut records = Vec::new();
    session.run(running, |outcome| {
        print_outcome(outcome);
        records.push(builder.build(outcome));
        if max_windows.is_some_and(|max| records.len() as u64 >= max) {
            running.store(false, Ordering::SeqCst);
        }
    })?;

    Ok(records)
}

fn print_outcome(outcome: &ClassificationOutcome) {
    match &outcome.result {
        Ok(prediction) => println!(
            "[{}] Window {}: {} ({:.1}%) in {:.2}ms",
            outcome.completed_at.format("%H:%M:%S"),
            outcome.sequence,
            outcome.label.as_deref().unwrap_or("no class"),
            prediction.confidence().unwrap_or(0.0) * 100.0,
            outcome.latency.as_secs_f64() * 1000.0
        ),
        Err(e) => println!(
            "[{}] Window {}: classification failed: {e}",
            outcome.completed_at.format("%H:%M:%S"),
            outcome.sequence
        ),
    }
}

fn cmd_classify(config: &Config, input: &Path) -> Result<()> {
    config.validate()?;
    let classifier = load_classifier(config)?;

    let content =
        std::fs::read_to_string(input).with_context(|| format!("reading {}", input.display()))?;
    let readings = parse_recording(&content)?;
    if readings.is_empty() {
        bail!("{} contains no readings", input.display());
    }

    let mut buffer = SampleBuffer::with_capacity(config.buffer_capacity)?;
    let mut windows = 0usize;
    for [x, y, z] in readings.iter().copied() {
        if let Some(request) = buffer.push(x, y, z) {
            print_outcome(&run_classification(classifier.as_ref(), &request));
            windows += 1;
        }
    }

    println!();
    println!(
        "{} readings, {} windows classified, {} readings left over",
        readings.len(),
        windows,
        buffer.cursor() / 3
    );
    Ok(())
}

fn cmd_status(config: &Config) -> Result<()> {
    println!("Accel Activity Agent Status");
    println!("===========================");
    println!();
    println!("Configuration:");
    println!("  Source: {:?} at {} Hz", config.source.kind, config.source.rate_hz);
    println!("  Window: {} floats", config.buffer_capacity);
    println!("  Dispatch: {}", config.dispatch.policy);
    println!("  Unregister on full: {}", config.dispatch.unregister_on_full);
    println!("  Classifier: {}", config.classifier.kind);
    println!();

    let stats_path = config.stats_path();
    if stats_path.exists() {
        let content = std::fs::read_to_string(&stats_path)?;
        let stats: serde_json::Value = serde_json::from_str(&content)?;
        println!("Cumulative Statistics:");
        for key in [
            "samples_received",
            "dispatches",
            "classifications_completed",
            "classification_failures",
            "requests_rejected",
            "results_dropped",
        ] {
            if let Some(value) = stats.get(key) {
                println!("  {}: {value}", key.replace('_', " "));
            }
        }
        if let Some(labels) = stats.get("label_counts").and_then(|l| l.as_object()) {
            for (label, count) in labels {
                println!("  {label}: {count}");
            }
        }
    } else {
        println!("No previous session data found.");
    }
    Ok(())
}

fn cmd_labels(config: &Config) -> Result<()> {
    let labels = load_labels(
        config.classifier.label_path.as_deref(),
        config.classifier.num_classes,
    )?;
    for (index, label) in labels.iter().enumerate() {
        println!("{index}: {label}");
    }
    Ok(())
}

fn cmd_export(config: &Config, output: Option<PathBuf>, format: ExportFormat) -> Result<()> {
    let export_dir = output.unwrap_or_else(|| config.export_path.clone());

    let session_files: Vec<PathBuf> = std::fs::read_dir(&export_dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| {
                    p.extension().map(|e| e == "json").unwrap_or(false)
                        && p.file_name()
                            .and_then(|n| n.to_str())
                            .map(|n| n.starts_with("session_"))
                            .unwrap_or(false)
                })
                .collect()
        })
        .unwrap_or_default();

    if session_files.is_empty() {
        println!("No session data found in {export_dir:?}");
        println!("Run 'activity-sensor start' to begin collecting data.");
        return Ok(());
    }

    println!(
        "Found {} session file(s) in {:?}",
        session_files.len(),
        export_dir
    );

    let mut all_records: Vec<ClassificationRecord> = Vec::new();
    for file in &session_files {
        let content = std::fs::read_to_string(file)?;
        match serde_json::from_str::<Vec<ClassificationRecord>>(&content) {
            Ok(records) => all_records.extend(records),
            Err(e) => tracing::warn!("Skipping {}: {e}", file.display()),
        }
    }
    println!("Total records: {}", all_records.len());

    let output_path = export_dir.join(format!(
        "export_{}.{}",
        Utc::now().format("%Y%m%d_%H%M%S"),
        format.extension()
    ));

    let body = match format {
        ExportFormat::Jsonl => all_records
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?
            .join("\n"),
        ExportFormat::Json => serde_json::to_string_pretty(&all_records)?,
    };
    std::fs::write(&output_path, body)
        .with_context(|| format!("writing {}", output_path.display()))?;
    println!("Exported to {output_path:?}");
    Ok(())
}

fn cmd_config(config: &Config, path: &Path) -> Result<()> {
    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {path:?}");
    println!();
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) {
    if let Err(e) = ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    }) {
        tracing::warn!("Could not install Ctrl+C handler: {e}");
    }
}
