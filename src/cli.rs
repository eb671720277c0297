use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use futures::future::join_all;
use http::HeaderMap;
use http::header::{COOKIE, HeaderValue};
use memsession::config::{SessionConfig, load_config};
use memsession::session::cookie::parse_cookie;
use memsession::session::{CookieSource, SessionManager};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "memsession")]
#[command(about = "memsession - in-memory HTTP session store")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a JSON config file (default: ~/.memsession/config.json)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Display version information
    Version,

    /// Print the effective configuration as JSON
    Config,

    /// Drive the store with concurrent simulated clients
    Simulate {
        /// Number of concurrent clients
        #[arg(long, default_value_t = 8)]
        clients: usize,

        /// Requests issued by each client
        #[arg(long, default_value_t = 100)]
        requests: usize,
    },
}

pub fn run(cli: Cli) {
    let result = match cli.command {
        Some(Commands::Version) => {
            print_version();
            Ok(())
        }
        Some(Commands::Config) => show_config(cli.config),
        Some(Commands::Simulate { clients, requests }) => simulate(cli.config, clients, requests),
        None => {
            // No subcommand provided - show help
            Cli::command().print_help().ok();
            println!();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        if let Some(hint) = e
            .downcast_ref::<memsession::SessionError>()
            .and_then(|err| err.suggestion())
        {
            eprintln!("Suggestion: {}", hint);
        }
        process::exit(1);
    }
}

fn print_version() {
    println!("memsession {}", env!("CARGO_PKG_VERSION"));
}

fn show_config(path: Option<PathBuf>) -> Result<()> {
    let config = load_config(path)?;
    let json = serde_json::to_string_pretty(&config).context("Failed to serialize config")?;
    println!("{}", json);
    Ok(())
}

/// Summary of a simulation run
#[derive(Debug)]
struct SimulationReport {
    sessions: usize,
    requests: usize,
    consistent_clients: usize,
}

fn simulate(path: Option<PathBuf>, clients: usize, requests: usize) -> Result<()> {
    if requests == 0 {
        anyhow::bail!("--requests must be at least 1");
    }
    let config = load_config(path)?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
    let started = Instant::now();
    let report = runtime.block_on(run_simulation(config, clients, requests))?;

    println!("clients: {}", clients);
    println!("requests: {}", report.requests);
    println!("sessions: {}", report.sessions);
    println!("consistent: {}/{}", report.consistent_clients, clients);
    println!("elapsed_ms: {}", started.elapsed().as_millis());

    if report.consistent_clients != clients {
        anyhow::bail!("some clients observed inconsistent session state");
    }
    Ok(())
}

async fn run_simulation(
    config: SessionConfig,
    clients: usize,
    requests: usize,
) -> Result<SimulationReport> {
    let manager = Arc::new(SessionManager::new(config));
    let (sweep_handle, sweep_shutdown) = manager.start_sweep_task();

    let tasks = (0..clients).map(|client| {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { simulate_client(&manager, client, requests).await })
    });

    let mut consistent_clients = 0;
    for outcome in join_all(tasks).await {
        if outcome.context("Client task panicked")?? {
            consistent_clients += 1;
        }
    }

    let sessions = manager.session_count().await;
    sweep_shutdown.send(()).await.ok();
    sweep_handle.await.context("Sweep task panicked")?;

    tracing::info!(sessions, consistent_clients, "Simulation finished");

    Ok(SimulationReport {
        sessions,
        requests: clients * requests,
        consistent_clients,
    })
}

/// One client: the first request has no cookie, the rest replay the cookie
/// the first response set. Returns whether every request resolved to the
/// same session and saw its own writes.
async fn simulate_client(manager: &SessionManager, client: usize, requests: usize) -> Result<bool> {
    let cookie_name = manager.config().cookie.name.clone();
    let mut response = HeaderMap::new();
    let first = manager.get(&HeaderMap::new(), &mut response).await;
    first.set_username(format!("client-{}", client)).await;
    first.set("hits", 1).await;

    let set_cookie = response
        .get(http::header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .context("First response carried no session cookie")?;
    let id = parse_cookie(set_cookie, &cookie_name)
        .context("Session cookie missing from Set-Cookie header")?
        .to_string();

    let mut request = HeaderMap::new();
    request.insert(
        COOKIE,
        HeaderValue::from_str(&format!("{}={}", cookie_name, id))
            .context("Session id is not a valid header value")?,
    );
    debug_assert_eq!(request.cookie(&cookie_name).as_deref(), Some(id.as_str()));

    let mut consistent = true;
    for _ in 1..requests {
        let session = manager.get(&request, &mut HeaderMap::new()).await;
        if session.id() != id {
            consistent = false;
            break;
        }
        let hits = session.get_int("hits").await;
        session.set("hits", hits + 1).await;
    }

    let last = manager.get(&request, &mut HeaderMap::new()).await;
    Ok(consistent
        && last.get_int("hits").await == requests as i64
        && last.username().await == format!("client-{}", client))
}
