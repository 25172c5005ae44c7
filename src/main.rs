use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use windowlimit::config::{LimiterConfig, LogFormat, LoggingConfig};
use windowlimit::{MemoryStore, RateLimitError, RateLimiter};

/// Exercise a multi-window rate limit configuration against an in-memory store.
#[derive(Debug, Parser)]
#[command(name = "windowlimit", version, about)]
struct Cli {
    /// Path to a YAML limiter configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print decisions as JSON lines
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate requests for one or more subject keys
    Check {
        /// Subject keys to validate
        #[arg(required = true)]
        keys: Vec<String>,

        /// Number of requests per key
        #[arg(short, long, default_value_t = 1)]
        repeat: u32,
    },
    /// Print the store key of every bucket for a subject key
    Keys {
        key: String,
    },
}

#[derive(Debug, Serialize)]
struct Decision<'a> {
    key: &'a str,
    request: u32,
    allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = LimiterConfig::load(cli.config.as_deref())?;
    init_tracing(&config.logging);

    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(
        namespace = %config.namespace,
        buckets = config.buckets.len(),
        "Configuration loaded"
    );

    let limiter = RateLimiter::from_config(Arc::new(MemoryStore::new()), &config);

    match cli.command {
        Command::Check { keys, repeat } => {
            for key in &keys {
                for request in 1..=repeat {
                    let decision = match limiter.validate(key).await {
                        Ok(()) => Decision {
                            key,
                            request,
                            allowed: true,
                            reason: None,
                        },
                        Err(e @ RateLimitError::LimitReached { .. }) => Decision {
                            key,
                            request,
                            allowed: false,
                            reason: Some(e.to_string()),
                        },
                        Err(e) => return Err(e.into()),
                    };
                    print_decision(&decision, cli.json)?;
                }
            }
        }
        Command::Keys { key } => {
            for bucket in &limiter.buckets() {
                let store_key = limiter.store_key(&key, bucket.window);
                debug!(window = ?bucket.window, limit = bucket.limit, "Derived store key");
                if cli.json {
                    println!(
                        "{}",
                        serde_json::json!({
                            "window_ms": bucket.window.as_millis() as u64,
                            "limit": bucket.limit,
                            "store_key": store_key.as_str(),
                        })
                    );
                } else {
                    println!("{:>10?} {:>8} {}", bucket.window, bucket.limit, store_key);
                }
            }
        }
    }

    Ok(())
}

fn print_decision(decision: &Decision<'_>, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(decision)?);
    } else {
        match &decision.reason {
            None => println!("{} #{}: allowed", decision.key, decision.request),
            Some(reason) => println!("{} #{}: denied ({})", decision.key, decision.request, reason),
        }
    }
    Ok(())
}

/// Initialize tracing. `RUST_LOG` takes precedence over the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}
