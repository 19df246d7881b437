use crate::cli::{Commands, OutputFormat};
use crate::config::SamplerConfig;
use crate::metrics::exporter::{format_catalog, format_catalog_json};
use crate::metrics::{NodeMetrics, PrometheusExporter};
use crate::sampler::{LogErrorSink, OvsOfctl, Sampler};
use anyhow::{Context, Result};
use prometheus::Registry;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub async fn handle_command(command: Commands, config_path: Option<&Path>) -> Result<()> {
    match command {
        Commands::Run { interval, once } => {
            let mut config = load_config(config_path)?;
            if let Some(secs) = interval {
                config.interval_secs = secs;
                config.validate()?;
            }
            handle_run(config, once).await
        }
        Commands::Sample { format } => handle_sample(load_config(config_path)?, format).await,
        Commands::Catalog { format } => handle_catalog(format),
    }
}

fn load_config(path: Option<&Path>) -> Result<SamplerConfig> {
    match path {
        Some(path) => SamplerConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => {
            debug!("No config file given, using defaults");
            Ok(SamplerConfig::default())
        }
    }
}

struct Node {
    exporter: PrometheusExporter,
    sampler: Sampler,
    sink: Arc<LogErrorSink>,
}

fn build_node(config: &SamplerConfig) -> Result<Node> {
    let metrics = Arc::new(NodeMetrics::new()?);
    let exporter = PrometheusExporter::new(metrics.clone(), Registry::new());
    exporter.register().context("Failed to register node metrics")?;

    let sink = Arc::new(LogErrorSink::new());
    let sampler = Sampler::new(
        metrics,
        Arc::new(OvsOfctl::new(&config.ovs)),
        sink.clone(),
        config,
    );

    Ok(Node {
        exporter,
        sampler,
        sink,
    })
}

#[cfg(target_os = "linux")]
fn register_process_collector(registry: &Registry) {
    let collector = prometheus::process_collector::ProcessCollector::for_self();
    if let Err(e) = registry.register(Box::new(collector)) {
        warn!("Failed to register process collector: {}", e);
    }
}

#[cfg(not(target_os = "linux"))]
fn register_process_collector(_registry: &Registry) {}

async fn handle_run(config: SamplerConfig, once: bool) -> Result<()> {
    let node = build_node(&config)?;
    register_process_collector(node.exporter.registry());

    info!(
        "Sampling bridge {} every {}s",
        config.ovs.bridge, config.interval_secs
    );

    let mut ticker = tokio::time::interval(config.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
            _ = ticker.tick() => {
                let report = node.sampler.gather_periodic_metrics().await;
                let fresh = [report.ovs_flows, report.arp_cache_entries, report.pod_ips]
                    .iter()
                    .filter(|outcome| outcome.is_updated())
                    .count();
                let snapshot = node.exporter.snapshot();
                info!(
                    ovs_flows = snapshot.ovs_flows,
                    arp_cache_entries = snapshot.arp_cache_entries,
                    pod_ips = snapshot.pod_ips,
                    fresh,
                    "Sampled node metrics"
                );
                if once {
                    break;
                }
            }
        }
    }

    info!("Sampler stopped ({} errors reported)", node.sink.handled());
    Ok(())
}

async fn handle_sample(config: SamplerConfig, format: OutputFormat) -> Result<()> {
    let node = build_node(&config)?;
    let report = node.sampler.gather_periodic_metrics().await;

    match format {
        OutputFormat::Text => print!("{}", node.exporter.format_text()?),
        OutputFormat::Json => {
            let out = serde_json::json!({
                "report": report,
                "metrics": node.exporter.snapshot(),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }
    Ok(())
}

fn handle_catalog(format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => print!("{}", format_catalog()),
        OutputFormat::Json => println!("{}", format_catalog_json()?),
    }
    Ok(())
}
