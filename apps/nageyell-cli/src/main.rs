mod source;

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use clap::Parser;
use nageyell_events::{EventSink, LocalBus};
use nageyell_generator::ConfiguredGenerator;
use nageyell_nfc::{EmulatedTag, TagWriter};
use nageyell_ops::{init_tracing, EventLog};
use nageyell_session::{Session, SessionSettings};
use nageyell_types::{config::NageConfig, status::CommitOutcome};
use nageyell_vision::QrDetector;
use tracing::{info, warn};

use crate::source::CliCamera;

#[derive(Debug, Parser)]
#[command(name = "nageyell", about = "Scan an API key, compose a cheer, write it to an NFC tag")]
struct Args {
    /// TOML config file.
    #[arg(env = "NAGEYELL_CONFIG", default_value = "configs/dev.toml")]
    config: String,
    /// Scan a QR code rendered from this credential instead of the configured images.
    #[arg(long)]
    demo_credential: Option<String>,
    /// Message to write; left empty, one is generated from the scanned credential.
    #[arg(long)]
    message: Option<String>,
    /// Score between 1 and 1000.
    #[arg(long)]
    point: Option<i64>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args.config);
    if let Err(err) = init_tracing(&config.ops) {
        eprintln!("{err}");
    }

    let bus = LocalBus::new(256);
    let log = EventLog::new();
    let follower = log.follow(bus.subscribe());

    let camera = CliCamera::from_config(&config.camera, args.demo_credential.as_deref())?;
    let tag = EmulatedTag::new(&config.tag.output_path, config.tag.supported);
    let generator = ConfiguredGenerator::from_config(&config.generator)?;
    let sink: Arc<dyn EventSink> = Arc::new(bus.clone());
    let session = Session::new(
        SessionSettings::from_config(&config),
        camera,
        QrDetector::new(),
        tag,
        generator,
        sink,
    );

    if session.start().await {
        let wait = Duration::from_millis(config.session.scan_timeout_ms);
        // Only the wait is bounded; generation and the tag write run to completion.
        match tokio::time::timeout(wait, session.next_code()).await {
            Ok(Some(code)) => {
                report("credential", &session.on_credential_acquired(code).await)
            }
            Ok(None) => warn!("Scanner stopped before a code was found"),
            Err(_) => warn!("No QR code seen within {} ms", wait.as_millis()),
        }
    }
    if let Some(status) = session.snapshot().scan_status {
        println!("scan: {status}");
    }

    if let Some(point) = args.point {
        report("score", &session.on_score_committed(point).await);
    }
    if let Some(message) = args.message {
        report("message", &session.on_message_committed(message).await);
    }

    let state = session.snapshot();
    match &state.status {
        Some(status) => println!("status: {status}"),
        None => println!("status: -"),
    }
    session.shutdown().await;

    let readback = EmulatedTag::new(&config.tag.output_path, config.tag.supported);
    if readback.is_supported() {
        match readback.read().await.map(|message| message.first_text()) {
            Ok(Some(record)) => println!("tag [{}]:\n{}", record.language, record.text),
            Ok(None) => println!("tag: no text record"),
            Err(err) => info!("Nothing to read back from the tag: {err}"),
        }
    }

    // Let the follower drain what the bus already holds before flushing.
    tokio::task::yield_now().await;
    match log.flush_jsonl(&config.ops.telemetry_dir).await {
        Ok(path) => info!("Session events saved to {:?}", path),
        Err(err) => warn!("Failed to save session events: {err}"),
    }
    follower.abort();
    Ok(())
}

fn report(trigger: &str, outcome: &CommitOutcome) {
    match outcome {
        CommitOutcome::Rejected(reasons) => {
            info!("{trigger}: nothing written ({})", reasons.messages().join(", "))
        }
        CommitOutcome::Unsupported => warn!("{trigger}: NFC writing is not available"),
        CommitOutcome::Written => info!("{trigger}: tag written"),
        CommitOutcome::Failed(detail) => warn!("{trigger}: tag write failed: {detail}"),
    }
}

fn load_config(path: &str) -> NageConfig {
    match NageConfig::from_file(path) {
        Ok(cfg) => {
            if let Err(err) = cfg.validate() {
                eprintln!(
                    "Invalid config in '{}': {err}. Falling back to internal defaults.",
                    path
                );
                default_config()
            } else {
                cfg
            }
        }
        Err(err) => {
            eprintln!(
                "Failed to load config from '{}': {err}. Falling back to internal defaults.",
                path
            );
            default_config()
        }
    }
}

fn default_config() -> NageConfig {
    let config = NageConfig::default();
    debug_assert!(config.validate().is_ok());
    config
}
