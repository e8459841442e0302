use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use portal_probe::server::{self, ServerConfig};
use portal_probe::sweep::{self, SweepReport};
use portal_probe::{catalog, probe, ProbeRequest, ProbeResult};

/// portal-probe: reachability checks for the environments of an internal portal.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "portal-probe",
    version,
    about = "Reachability checks (HTTP and TCP) for the environments of an internal portal.",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Serve the portal API and static UI.
    Serve {
        /// Interface to bind.
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Port to listen on.
        #[arg(long, env = "PORT", default_value_t = 3000)]
        port: u16,

        /// Directory holding the built UI (index.html is the SPA fallback).
        #[arg(long = "static-dir", default_value = "public")]
        static_dir: PathBuf,

        /// Catalog file with projects and environments.
        #[arg(long, env = "PORTAL_DATA", default_value = "config/data.json")]
        data: PathBuf,
    },

    /// Run a single probe and print the result.
    Check {
        /// Probe protocol: http or tcp.
        #[arg(long = "type")]
        protocol: String,

        /// URL for http, host or IP for tcp.
        #[arg(long)]
        url: String,

        /// TCP port (required for tcp).
        #[arg(long)]
        port: Option<u16>,

        /// HTTP method (default HEAD).
        #[arg(long)]
        method: Option<String>,

        /// Print the result as JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Write the result as pretty JSON to this path (optional).
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Probe every environment in the catalog.
    Sweep {
        /// Catalog file with projects and environments.
        #[arg(long, env = "PORTAL_DATA", default_value = "config/data.json")]
        data: PathBuf,

        /// Only probe environments linked to this project id.
        #[arg(long)]
        project: Option<String>,

        /// Max probes in flight.
        #[arg(long, default_value_t = 32)]
        concurrency: usize,

        /// Write the report as pretty JSON to this path (optional).
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            host,
            port,
            static_dir,
            data,
        } => {
            info!(
                data = %data.display(),
                static_dir = %static_dir.display(),
                "portal-probe v{} starting",
                env!("CARGO_PKG_VERSION")
            );
            let bind = format!("{host}:{port}");
            let config = ServerConfig {
                data_path: data,
                static_dir,
            };
            tokio::select! {
                res = server::spawn_server(&bind, config) => res?,
                _ = tokio::signal::ctrl_c() => info!("shutting down"),
            }
        }

        Command::Check {
            protocol,
            url,
            port,
            method,
            json,
            output,
        } => {
            let request = ProbeRequest {
                protocol: Some(protocol),
                target: Some(url),
                port: port.map(Into::into),
                method,
            };
            let result = probe(&request).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_result(&result);
            }
            if let Some(path) = output.as_deref() {
                write_json(path, &result)?;
                info!("wrote result to {}", path.display());
            }
        }

        Command::Sweep {
            data,
            project,
            concurrency,
            output,
        } => {
            let catalog = catalog::load_catalog_from_path(&data)?;
            let entries = match project.as_deref() {
                Some(id) => catalog.for_project(id),
                None => catalog.environments,
            };
            info!(
                "sweeping {} environments (concurrency {})",
                entries.len(),
                concurrency
            );

            // Ctrl-C stops launching new probes; in-flight ones finish.
            let cancel = CancellationToken::new();
            let cancel_ctrlc = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel_ctrlc.cancel();
                }
            });

            let report = sweep::sweep_with_cancel(&entries, concurrency, cancel).await;
            print_report_table(&report);
            if let Some(path) = output.as_deref() {
                if let Err(e) = write_json(path, &report) {
                    warn!("failed to write JSON to {}: {e:#}", path.display());
                } else {
                    info!("wrote JSON report to {}", path.display());
                }
            }
        }
    }

    Ok(())
}

fn print_result(result: &ProbeResult) {
    println!("status        : {}", result.status);
    if let Some(code) = result.status_code {
        println!("status_code   : {code}");
    }
    println!("message       : {}", result.message);
    println!("response_time : {}", result.response_time());
    if let Some(err) = &result.error {
        println!("error         : {err}");
    }
}

fn print_report_table(report: &SweepReport) {
    let mut name_w = "name".len();
    let mut msg_w = "message".len();
    for e in &report.entries {
        name_w = name_w.max(e.name.chars().count().min(40));
        let msg_len = e
            .result
            .as_ref()
            .map(|r| r.message.chars().count())
            .or_else(|| e.rejected.as_ref().map(|m| m.chars().count()))
            .unwrap_or(0);
        msg_w = msg_w.max(msg_len.min(60));
    }
    let status_w = "unhealthy".len();
    let time_w = "time".len().max(7);

    println!(
        "\nhealthy: {}  warning: {}  unhealthy: {}  error: {}  rejected: {}  (done {}/{})",
        report.healthy,
        report.warning,
        report.unhealthy,
        report.error,
        report.rejected,
        report.done,
        report.total
    );
    println!(
        "{:<name_w$}  {:<status_w$}  {:>time_w$}  {:<msg_w$}",
        "name", "status", "time", "message"
    );
    println!(
        "{:-<name_w$}  {:-<status_w$}  {:-<time_w$}  {:-<msg_w$}",
        "", "", "", ""
    );
    for e in &report.entries {
        let name = clip(&e.name, 40);
        let (status, time, msg) = match (&e.result, &e.rejected) {
            (Some(r), _) => (r.status.to_string(), r.response_time(), clip(&r.message, 60)),
            (None, rejected) => (
                "rejected".to_string(),
                "-".to_string(),
                clip(rejected.as_deref().unwrap_or_default(), 60),
            ),
        };
        println!("{name:<name_w$}  {status:<status_w$}  {time:>time_w$}  {msg:<msg_w$}");
    }
}

fn clip(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(file, value)?;
    Ok(())
}
