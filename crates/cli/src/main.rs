use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use steve_api::{Connection, ConnectionConfig};
use steve_core::{SteveError, WatchDescriptor};
use steve_store::{FindOpts, Resource, StoreEvent};
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "stevectl", version, about = "Steve CLI")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// API base for relative paths, e.g. https://rancher.example/v1
    #[arg(long = "base-url", global = true, env = "STEVE_BASE_URL")]
    base_url: Option<String>,

    /// Namespace to list, watch, or restrict watches to
    #[arg(long = "ns", global = true, env = "STEVE_NAMESPACE")]
    namespace: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json, Yaml }

#[derive(Subcommand, Debug)]
enum Commands {
    /// List known types
    Schemas,
    /// List resources of a type
    Ls {
        ty: String,
        /// Label selector, e.g. "app=web,!canary"
        #[arg(long = "selector", short = 'l')]
        selector: Option<String>,
    },
    /// Fetch one resource by id (`namespace/name` for namespaced types)
    Get { ty: String, id: String },
    /// Print store changes for a type until Ctrl-C
    Watch { ty: String },
    /// Delete one resource by id
    Rm { ty: String, id: String },
}

fn init_tracing() {
    let env = std::env::var("STEVE_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("STEVE_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            warn!(addr = %addr, "invalid STEVE_METRICS_ADDR; expected host:port");
        }
    }
}

fn config_from(cli: &Cli) -> ConnectionConfig {
    let env = ConnectionConfig::from_env();
    let mut cfg = match &cli.base_url {
        Some(base) => {
            let mut c = ConnectionConfig::new(base.clone());
            c.csrf = env.csrf.clone();
            c
        }
        None => env,
    };
    if let Some(ns) = &cli.namespace {
        cfg = cfg.with_namespace(ns.clone());
    }
    cfg
}

fn print_value<T: Serialize>(out: Output, v: &T) -> Result<()> {
    match out {
        Output::Json => println!("{}", serde_json::to_string_pretty(v)?),
        Output::Yaml => print!("{}", serde_yaml::to_string(v)?),
        Output::Human => println!("{}", serde_json::to_string_pretty(v)?),
    }
    Ok(())
}

fn print_resources(out: Output, items: &[Resource]) -> Result<()> {
    if out != Output::Human {
        let raw: Vec<&serde_json::Value> = items.iter().map(Resource::data).collect();
        return print_value(out, &raw);
    }
    println!("{:<20} {:<40} {:<14} AGE", "NAMESPACE", "NAME", "STATE");
    for r in items {
        let ns = r.namespace().unwrap_or_else(|| "-".to_string());
        println!("{:<20} {:<40} {:<14} {}", ns, r.name_display(), r.state_display(), render_age(r.creation_timestamp()));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();
    let cfg = config_from(&cli);
    info!(base = %cfg.base_url, ns = ?cfg.namespace, "connecting");
    let conn = Connection::open(cfg).await.context("failed to load schemas")?;

    let res = run(&cli, &conn).await;
    conn.close().await;
    if let Err(e) = &res {
        error!(error = %e, "command failed");
    }
    res
}

async fn run(cli: &Cli, conn: &Arc<Connection>) -> Result<()> {
    let ns = cli.namespace.as_deref();
    match &cli.command {
        Commands::Schemas => {
            let schemas = conn.schemas().all();
            match cli.output {
                Output::Human => {
                    println!("{:<40} {:<10} COLLECTION", "TYPE", "SCOPE");
                    for s in schemas {
                        let scope = if s.is_namespaced() { "namespaced" } else { "cluster" };
                        println!("{:<40} {:<10} {}", s.id, scope, s.collection_link().unwrap_or("-"));
                    }
                }
                out => {
                    let all: Vec<_> = schemas.iter().map(|s| s.as_ref()).collect();
                    print_value(out, &all)?;
                }
            }
        }
        Commands::Ls { ty, selector } => {
            info!(ty = %ty, ns = ?ns, selector = ?selector, "ls invoked");
            let opts = FindOpts::default().no_watch();
            let items = match (selector, ns) {
                (Some(sel), ns) => conn.find_matching(ty, sel, ns, opts).await?,
                (None, Some(ns)) => conn.find_namespace(ty, ns, opts).await?,
                (None, None) => conn.find_all(ty, opts).await?,
            };
            print_resources(cli.output, &items)?;
        }
        Commands::Get { ty, id } => {
            let r = conn.find(ty, id, FindOpts::default().no_watch()).await?;
            match cli.output {
                Output::Human => print_resources(cli.output, std::slice::from_ref(&r))?,
                out => print_value(out, r.data())?,
            }
        }
        Commands::Watch { ty } => {
            info!(ty = %ty, ns = ?ns, "watch invoked");
            let initial = match ns {
                Some(ns) => conn.find_namespace(ty, ns, FindOpts::default()).await?,
                None => conn.find_all(ty, FindOpts::default()).await?,
            };
            for r in &initial {
                println!("+ {}", r.id().unwrap_or_default());
            }
            let mut rx = conn.store_for(ty).subscribe();
            loop {
                tokio::select! {
                    ev = rx.recv() => match ev {
                        Ok(StoreEvent::Loaded { id }) => println!("~ {}", id),
                        Ok(StoreEvent::Removed { id }) => println!("- {}", id),
                        Ok(StoreEvent::Notified { id, event }) if event == "created" => println!("+ {}", id),
                        Ok(StoreEvent::Notified { .. }) => {}
                        Ok(StoreEvent::Reset) => println!("! reset"),
                        Err(RecvError::Lagged(n)) => warn!(lost = n, "watch output lagged"),
                        Err(RecvError::Closed) => break,
                    },
                    _ = signal::ctrl_c() => {
                        info!("Ctrl-C received; stopping watch");
                        break;
                    }
                }
            }
            let mut stop = WatchDescriptor::new(ty.as_str());
            stop.namespace = ns.map(str::to_string);
            conn.unwatch(stop)?;
        }
        Commands::Rm { ty, id } => {
            let r = conn.find(ty, id, FindOpts::default().no_watch()).await?;
            match r.remove().await {
                Ok(()) => println!("removed {}", id),
                Err(SteveError::Http { status: 404, .. }) => println!("{} already gone", id),
                Err(e) => return Err(e.into()),
            }
        }
    }
    Ok(())
}

fn render_age(created: Option<DateTime<Utc>>) -> String {
    let Some(created) = created else { return "-".to_string() };
    let mut secs = (Utc::now() - created).num_seconds().max(0) as u64;
    let days = secs / 86_400; secs %= 86_400;
    let hours = secs / 3600; secs %= 3600;
    let mins = secs / 60; secs %= 60;
    if days > 0 { format!("{}d{}h", days, hours) }
    else if hours > 0 { format!("{}h{}m", hours, mins) }
    else if mins > 0 { format!("{}m", mins) }
    else { format!("{}s", secs) }
}
