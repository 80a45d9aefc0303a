use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use log::{error, info};

use portwatch::capture::{self, InterfaceCapture};
use portwatch::config::DEFAULT_REPLAY_DELAY_MS;
use portwatch::dataset::DatasetReplay;
use portwatch::report;
use portwatch::synthetic::FixedSynthetic;
use portwatch::{CsvLog, LabelMap, ModelPredictor, Monitor, MonitorConfig, Result};

/// Per-port traffic monitor feeding a pre-trained intrusion classifier
#[derive(Parser, Debug)]
#[clap(name = "portwatch")]
struct Args {
    /// Interface to capture on; lists interfaces and prompts when omitted
    #[clap(short, long, value_parser)]
    interface: Option<String>,

    /// Length of one capture window in seconds
    #[clap(short, long, value_parser, default_value_t = 5)]
    window_secs: u64,

    /// Stop after this many windows
    #[clap(short, long, value_parser)]
    cycles: Option<u64>,

    /// Clear all port counters after every window
    #[clap(long)]
    reset_each_cycle: bool,

    /// Count TCP packets only
    #[clap(long)]
    tcp_only: bool,

    #[clap(long, value_parser, default_value = "model/model.pkl")]
    model: PathBuf,

    /// Pickled list of the feature names the model was trained on
    #[clap(long, value_parser, default_value = "model/features1.pkl")]
    features: PathBuf,

    /// JSON object mapping class ids to category names
    #[clap(long, value_parser)]
    labels: Option<PathBuf>,

    /// CSV file every classified row is appended to
    #[clap(short, long, value_parser, default_value = "port_features_with_predictions.csv")]
    output: PathBuf,

    /// Use connection point 0, one flow entry and no load instead of random values
    #[clap(long)]
    fixed_synthetic: bool,

    /// Classify the records of a dataset CSV instead of capturing
    #[clap(long, value_parser)]
    replay: Option<PathBuf>,

    /// Pause between replayed records in milliseconds
    #[clap(long, value_parser, default_value_t = DEFAULT_REPLAY_DELAY_MS)]
    replay_delay_ms: u64,
}

impl From<Args> for MonitorConfig {
    fn from(args: Args) -> Self {
        MonitorConfig {
            interface: args.interface,
            window: Duration::from_secs(args.window_secs),
            cycles: args.cycles,
            reset_each_cycle: args.reset_each_cycle,
            tcp_only: args.tcp_only,
            model_path: args.model,
            features_path: args.features,
            labels_path: args.labels,
            output_path: Some(args.output),
            fixed_synthetic: args.fixed_synthetic.then(FixedSynthetic::default),
            replay_path: args.replay,
            replay_delay: Duration::from_millis(args.replay_delay_ms),
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config: MonitorConfig = Args::parse().into();
    if let Err(e) = run(config) {
        error!("{}", e);
        process::exit(1);
    }
}

fn run(config: MonitorConfig) -> Result<()> {
    config.validate()?;

    // Handle Ctrl+C gracefully
    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || {
            println!("\nCtrl+C received, stopping capture...");
            running.store(false, Ordering::SeqCst);
            io::stdout().flush().unwrap_or(());
        })?;
    }

    println!("Loading trained model...");
    let predictor = ModelPredictor::new(&config.model_path, &config.features_path)?;
    let labels = match &config.labels_path {
        Some(path) => LabelMap::from_json_file(path)?,
        None => LabelMap::default(),
    };
    println!("Model loaded successfully!");

    let mut log = match &config.output_path {
        Some(path) => Some(CsvLog::<File>::create(path)?),
        None => None,
    };

    let mut monitor = Monitor::new(predictor, labels, config.aggregator())
        .reset_each_cycle(config.reset_each_cycle);

    if let Some(path) = &config.replay_path {
        println!("Replaying {}... Press Ctrl+C to stop", path.display());
        let replay = DatasetReplay::open(path)?;
        let mut replayed = 0;
        monitor.replay(replay, config.replay_delay, &running, |row, tally| {
            replayed += 1;
            if let Some(log) = log.as_mut() {
                log.append(row)?;
            }
            if row.is_attack() {
                println!("\x1b[31m⚠️  Record {}: {}\x1b[0m", replayed, row.label);
            } else {
                println!("Record {}: {} ({})", replayed, row.label, tally.count(&row.label));
            }
            Ok(())
        })?;
        return Ok(());
    }

    let interface = match &config.interface {
        Some(name) => capture::find_interface(name)?,
        None => capture::prompt_for_interface(&mut io::stdin().lock())?,
    };
    println!("Selected interface: {}", interface.name);

    let mut source = InterfaceCapture::open(&interface, running.clone())?;
    println!(
        "Capturing on {} in {}s windows... Press Ctrl+C to stop",
        interface.name,
        config.window.as_secs()
    );

    let cycles = monitor.run(&mut source, config.window, config.cycles, &running, |cycle, tally| {
        if let Some(log) = log.as_mut() {
            for row in &cycle.rows {
                log.append(row)?;
            }
        }
        report::print_cycle(&cycle.metrics, &cycle.rows, tally);
        Ok(())
    })?;

    info!("Monitor finished after {} cycles", cycles);
    Ok(())
}
