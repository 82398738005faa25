//! monitor サブコマンド
//!
//! エンドポイント定義ファイルを読み込み、定期的にヘルスチェックを行います。
//! `--once`を指定すると1回だけチェックしてレポートを表示します。

use super::OutputFormat;
use crate::config::{load_endpoints_file, MonitorConfig};
use crate::engine::{ApiMonitor, HealthSnapshot};
use crate::events::MonitorEvent;
use crate::types::health::{HealthEntry, HealthStatus};
use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

/// レポートに表示する上位エンドポイント数
const TOP_ENDPOINTS: usize = 3;

/// monitor サブコマンドの引数
#[derive(Args, Debug, Clone)]
pub struct MonitorArgs {
    /// Endpoints file (YAML, or JSON when the extension is .json)
    #[arg(short, long)]
    pub endpoints: PathBuf,

    /// Check interval in seconds (default: APIMON_CHECK_INTERVAL_SECS)
    #[arg(short, long)]
    pub interval: Option<u64>,

    /// Run a single round of checks and exit
    #[arg(long)]
    pub once: bool,

    /// Write the final health snapshot to this file as JSON
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// monitor コマンドを実行
pub async fn execute(args: &MonitorArgs, config: MonitorConfig) -> Result<()> {
    let definitions = load_endpoints_file(&args.endpoints)
        .with_context(|| format!("Failed to load {}", args.endpoints.display()))?;
    let interval_secs = args.interval.unwrap_or(config.check_interval.as_secs());

    let monitor = ApiMonitor::new(config)?;
    for definition in definitions {
        monitor
            .register_endpoint(&definition.id, definition.request)
            .await?;
    }
    info!(
        endpoints = monitor.get_all_health().await.len(),
        "Endpoints loaded"
    );

    if args.once {
        monitor.run_health_checks_now().await;
    } else {
        let mut events = monitor.subscribe();
        monitor.start_monitoring(interval_secs).await?;
        println!(
            "Monitoring {} endpoint(s) every {}s. Press Ctrl+C to stop.",
            monitor.get_all_health().await.len(),
            interval_secs
        );

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                event = events.recv() => match event {
                    Ok(event) => print_event(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Monitor event receiver lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }

        monitor.stop_monitoring().await;
    }

    let snapshot = monitor.health_snapshot().await;
    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&snapshot)?),
        OutputFormat::Text => {
            let slow = monitor.get_slow_endpoints(None).await;
            print_report(&snapshot, &slow);
        }
    }

    if let Some(ref path) = args.output {
        write_snapshot(path, &snapshot)?;
        println!("Snapshot written to {}", path.display());
    }

    Ok(())
}

/// シャットダウンシグナルを待機
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, stopping monitor...");
        }
        _ = terminate => {
            info!("Received SIGTERM, stopping monitor...");
        }
    }
}

fn print_event(event: &MonitorEvent) {
    match event {
        MonitorEvent::CheckCompleted {
            endpoint_id,
            status,
            response_time_ms,
            http_status_code,
        } => {
            let code = http_status_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{} {:<24} {:<7} {:>4}  {}ms",
                status.symbol(),
                endpoint_id,
                status.as_str(),
                code,
                response_time_ms
            );
        }
        MonitorEvent::HealthStatusChanged {
            endpoint_id,
            old_status,
            new_status,
        } => {
            println!("  {} changed: {} -> {}", endpoint_id, old_status, new_status);
        }
        MonitorEvent::MonitoringStarted { .. } | MonitorEvent::MonitoringStopped => {}
    }
}

fn print_report(snapshot: &HealthSnapshot, slow: &[HealthEntry]) {
    let stats = &snapshot.stats;

    println!();
    println!("ENDPOINT\t\t\tSTATUS\tHTTP\tTIME");
    for entry in &snapshot.endpoints {
        println!(
            "{} {:<24}\t{}\t{}\t{}",
            entry.status.symbol(),
            entry.endpoint_id,
            entry.status,
            entry
                .last_http_status_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string()),
            entry
                .last_response_time_ms
                .map(|ms| format!("{}ms", ms))
                .unwrap_or_else(|| "-".to_string()),
        );
    }

    println!();
    println!(
        "Total: {}  Up: {}  Down: {}  Error: {}  Unknown: {}",
        stats.total, stats.up, stats.down, stats.error, stats.unknown
    );
    println!(
        "Uptime: {:.1}%  Avg response: {:.0}ms (last {} checks)",
        stats.uptime_percent, stats.avg_response_time_ms, stats.sample_size
    );

    let top = top_performing(&snapshot.endpoints);
    if !top.is_empty() {
        println!();
        println!("Top performing:");
        for entry in top {
            println!(
                "  {} {} ({}ms)",
                entry.status.symbol(),
                entry.endpoint_id,
                entry.last_response_time_ms.unwrap_or_default()
            );
        }
    }

    let attention = needs_attention(&snapshot.endpoints, slow);
    if !attention.is_empty() {
        println!();
        println!("Needs attention:");
        for (entry, reason) in attention {
            println!("  {} {} ({})", entry.status.symbol(), entry.endpoint_id, reason);
        }
    }
}

/// up状態のエンドポイントを応答時間の短い順に返す
fn top_performing(entries: &[HealthEntry]) -> Vec<&HealthEntry> {
    let mut up: Vec<&HealthEntry> = entries
        .iter()
        .filter(|e| e.status == HealthStatus::Up)
        .collect();
    up.sort_by_key(|e| e.last_response_time_ms.unwrap_or(u64::MAX));
    up.truncate(TOP_ENDPOINTS);
    up
}

/// down/error状態、または応答が遅いエンドポイントと理由
fn needs_attention<'a>(
    entries: &'a [HealthEntry],
    slow: &[HealthEntry],
) -> Vec<(&'a HealthEntry, String)> {
    entries
        .iter()
        .filter_map(|entry| {
            let reason = match entry.status {
                HealthStatus::Down => entry
                    .last_http_status_code
                    .map(|c| format!("HTTP {}", c))
                    .unwrap_or_else(|| "down".to_string()),
                HealthStatus::Error => entry
                    .last_error
                    .clone()
                    .unwrap_or_else(|| "error".to_string()),
                _ if slow.iter().any(|s| s.endpoint_id == entry.endpoint_id) => format!(
                    "slow: {}ms",
                    entry.last_response_time_ms.unwrap_or_default()
                ),
                _ => return None,
            };
            Some((entry, reason))
        })
        .collect()
}

fn write_snapshot(path: &Path, snapshot: &HealthSnapshot) -> Result<()> {
    let json = serde_json::to_string_pretty(snapshot)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
