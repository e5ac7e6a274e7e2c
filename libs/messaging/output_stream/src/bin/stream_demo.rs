//! Stream demo - runs concurrent output streams against a logging coordinator
//!
//! Usage:
//!   stream_demo --streams 4 --tokens 16
//!   stream_demo --config config/stream.toml --environment dev

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::Parser;
use messaging_actors::{ActorBehavior, ActorRegistry, ActorSystem};
use output_stream::{BookkeepingQueue, OutputStream};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;
use stream_config::StreamConfig;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::filter::LevelFilter;
use types::{Message, MessageType, Value};

#[derive(Parser, Debug)]
#[command(name = "stream_demo")]
#[command(about = "Relay concurrent output streams to an in-process coordinator")]
#[command(version)]
struct Args {
    /// Number of concurrent streams
    #[arg(short, long, default_value_t = 3)]
    streams: usize,

    /// Text deltas written per stream
    #[arg(short, long, default_value_t = 8)]
    tokens: usize,

    /// Path to a stream configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Environment overlay (environments/<name>.toml next to the config file)
    #[arg(short, long)]
    environment: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging format
    #[arg(long)]
    json_logs: bool,
}

/// Coordinator that logs what it receives and forwards finished streams
struct LoggingCoordinator {
    chunks: HashMap<String, usize>,
    ended: HashSet<String>,
    finished: mpsc::UnboundedSender<(String, Value)>,
}

impl LoggingCoordinator {
    fn new(finished: mpsc::UnboundedSender<(String, Value)>) -> Self {
        Self {
            chunks: HashMap::new(),
            ended: HashSet::new(),
            finished,
        }
    }
}

#[async_trait]
impl ActorBehavior for LoggingCoordinator {
    type Message = Message;

    async fn handle(&mut self, msg: Message) -> messaging_actors::Result<()> {
        match msg.message_type {
            MessageType::ContentStreamChunk => {
                *self.chunks.entry(msg.sender.clone()).or_default() += 1;
                debug!(sender = %msg.sender, "Chunk received");
            }
            MessageType::ContentStreamEnd => {
                self.ended.insert(msg.sender.clone());
            }
            MessageType::Content => {
                if !self.ended.remove(&msg.sender) {
                    warn!(sender = %msg.sender, "Content arrived before end of stream");
                }
                let chunks = self.chunks.remove(&msg.sender).unwrap_or(0);
                info!(sender = %msg.sender, chunks, "Stream complete");

                let content = msg.content_value().cloned().unwrap_or_default();
                if self.finished.send((msg.sender, content)).is_err() {
                    warn!("Result receiver dropped");
                }
            }
            MessageType::Errors => {
                for error in msg.error_messages() {
                    warn!(sender = %msg.sender, error, "Stream reported an error");
                }
            }
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args)?;

    let config = match &args.config {
        Some(path) => StreamConfig::load(path, args.environment.as_deref())?,
        None => StreamConfig::default(),
    };
    info!(
        coordinator = %config.coordinator_address,
        streams = args.streams,
        tokens = args.tokens,
        "Starting stream demo"
    );

    let system = ActorSystem::new();
    let registry: ActorRegistry<Message> = ActorRegistry::new();
    let (finished_tx, mut finished_rx) = mpsc::unbounded_channel();
    system
        .spawn_named(
            &registry,
            config.coordinator_address.clone(),
            LoggingCoordinator::new(finished_tx),
        )
        .await
        .context("Failed to start coordinator")?;

    let (bookkeeping, mut ledger) = BookkeepingQueue::unbounded();

    let mut producers = Vec::with_capacity(args.streams);
    for n in 0..args.streams {
        let mut stream = OutputStream::builder(format!("stream-{}", n))
            .coordinator(registry.clone())
            .config(&config)
            .bookkeeping(bookkeeping.clone())
            .build()?;
        let tokens = args.tokens;

        producers.push(tokio::spawn(async move {
            for t in 0..tokens {
                let delta = Value::map([
                    ("text", Value::from(format!("tok{} ", t))),
                    ("index", Value::from(t as i64)),
                ]);
                stream.write(delta).await;
            }
            stream.bookkeep(Value::map([("tokens", Value::from(tokens as i64))]));
            let stats = stream.relay_stats();
            let output = stream.finalize().await;
            (stream.stream_id().clone(), stats, output)
        }));
    }

    for producer in producers {
        let (stream_id, stats, output) = producer.await.context("Producer task panicked")?;
        if let Err(e) = output {
            bail!("Stream {} failed to finalize: {}", stream_id, e);
        }
        if stats.failed > 0 {
            warn!(stream_id = %stream_id, failed = stats.failed, "Some chunks were not relayed");
        }
    }

    let mut results = Vec::with_capacity(args.streams);
    while results.len() < args.streams {
        match tokio::time::timeout(Duration::from_secs(5), finished_rx.recv()).await {
            Ok(Some(result)) => results.push(result),
            Ok(None) => break,
            Err(_) => {
                warn!(received = results.len(), "Timed out waiting for coordinator");
                break;
            }
        }
    }
    results.sort_by(|a, b| a.0.cmp(&b.0));

    for (stream_id, content) in &results {
        println!("{}: {}", stream_id, serde_json::to_string(content)?);
    }
    for entry in ledger.drain() {
        println!("bookkeeping {}: {}", entry.stream_id, serde_json::to_string(&entry.data)?);
    }

    system.shutdown().await;
    info!(completed = results.len(), "Stream demo finished");
    Ok(())
}

fn init_logging(args: &Args) -> Result<()> {
    let log_level = match args.log_level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        other => bail!("Unknown log level '{}'", other),
    };

    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(log_level).into())
        .from_env_lossy();

    if args.json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    Ok(())
}
