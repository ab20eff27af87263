//! WAF Log Router entry point
//!
//! Serves the transformation endpoint, or processes a single event from the
//! command line.

use clap::{Args, Parser, Subcommand};
use std::io::Read;
use std::net::SocketAddr;
use std::sync::Arc;
use waf_log_router::contracts::*;
use waf_log_router::handler::{create_router, AppState};
use waf_log_router::telemetry::{init_tracing, LogFormat, RouterMetricsRegistry};
use waf_log_router::{
    DeliveryClient, RecordClassifier, RecordProcessor, RecordingDeliveryClient, RouterConfig,
    RouterError,
};

#[derive(Parser)]
#[command(name = "waf-log-router")]
#[command(about = "WAF Log Router - forwards BLOCK and COUNT log records to delivery streams")]
#[command(version)]
struct Cli {
    /// Log output format (json or pretty)
    #[arg(long, global = true, default_value = "json", env = "LOG_FORMAT")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    ///
    /// Delivery requests are not signed: point the delivery endpoint at a
    /// signing proxy or a local emulator rather than at AWS directly.
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080", env = "PORT")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        #[command(flatten)]
        delivery: DeliveryArgs,
    },

    /// Process one transformation event and print the response
    Transform {
        /// Path to the event JSON, or `-` for stdin
        #[arg(short, long, default_value = "-")]
        file: String,

        /// Record batches in memory instead of delivering them
        #[arg(long)]
        dry_run: bool,

        #[command(flatten)]
        delivery: DeliveryArgs,
    },

    /// Classify a single base64 payload
    Classify {
        /// Base64-encoded WAF log entry
        #[arg(short, long)]
        data: String,
    },
}

#[derive(Args)]
struct DeliveryArgs {
    /// Delivery stream for blocked requests (required unless --dry-run)
    #[arg(long, env = "BLOCK_DELIVERY_STREAM_NAME")]
    block_stream: Option<String>,

    /// Delivery stream for count-mode matches (required unless --dry-run)
    #[arg(long, env = "COUNT_DELIVERY_STREAM_NAME")]
    count_stream: Option<String>,

    /// Delivery service endpoint; requests are unsigned, so use a signing
    /// proxy or a local emulator
    #[arg(long, env = "DELIVERY_ENDPOINT_URL", default_value = "http://localhost:4566")]
    delivery_endpoint: String,

    /// Delivery request timeout in milliseconds
    #[arg(long, env = "DELIVERY_TIMEOUT_MS", default_value = "5000")]
    delivery_timeout_ms: u64,
}

impl DeliveryArgs {
    fn into_config(self) -> Result<RouterConfig, RouterError> {
        let config = self.into_unchecked_config();
        config.validate()?;
        Ok(config)
    }

    /// Dry runs never reach a delivery stream, so nothing is validated
    fn into_dry_run_config(self) -> RouterConfig {
        self.into_unchecked_config()
    }

    fn into_unchecked_config(self) -> RouterConfig {
        RouterConfig::new(ChannelConfig::new(
            self.block_stream.unwrap_or_default(),
            self.count_stream.unwrap_or_default(),
        ))
        .with_endpoint(self.delivery_endpoint)
        .with_timeout_ms(self.delivery_timeout_ms)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.log_format.parse::<LogFormat>()?)?;

    match cli.command {
        Commands::Serve {
            port,
            host,
            delivery,
        } => {
            let config = delivery.into_config()?;
            let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

            let client = config.firehose_client()?;
            let metrics = Arc::new(RouterMetricsRegistry::new()?);
            let processor = RecordProcessor::new(Arc::new(client), config.channels.clone());
            let router = create_router(Arc::new(AppState::new(processor, metrics)));

            tracing::info!(
                block_stream = %config.channels.block_stream,
                count_stream = %config.channels.count_stream,
                endpoint = %config.delivery.endpoint_url,
                "Starting WAF Log Router on {}",
                addr
            );

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }

        Commands::Transform {
            file,
            dry_run,
            delivery,
        } => {
            let (config, client): (RouterConfig, Arc<dyn DeliveryClient>) = if dry_run {
                let client: Arc<dyn DeliveryClient> = Arc::new(RecordingDeliveryClient::new());
                (delivery.into_dry_run_config(), client)
            } else {
                let config = delivery.into_config()?;
                let client: Arc<dyn DeliveryClient> = Arc::new(config.firehose_client()?);
                (config, client)
            };
            let event: TransformationEvent = serde_json::from_str(&read_input(&file)?)?;

            let processor = RecordProcessor::new(client, config.channels);
            let report = processor.process(event).await;

            tracing::info!(
                report = %serde_json::to_string(&report.digest())?,
                dry_run = dry_run,
                "processed transformation event"
            );

            println!("{}", serde_json::to_string_pretty(&report.response)?);
        }

        Commands::Classify { data } => {
            let record = InboundRecord::new("cli", data);
            let classifier = RecordClassifier::new();
            let classification = classifier.classify(&record);
            let entry = classifier.decode(&record).ok();

            println!(
                "{}",
                serde_json::json!({
                    "classification": classification,
                    "action": entry.as_ref().and_then(|e| e.action.clone()),
                    "matching_rules": entry.as_ref().map(|e| e.matching_rule_count()),
                })
            );
        }
    }

    Ok(())
}

fn read_input(path: &str) -> Result<String, RouterError> {
    if path == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        Ok(std::fs::read_to_string(path)?)
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("WAF Log Router shutting down");
}
