use anyhow::{Context, Result, bail};
use log::info;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::analysis::bandwidth::{FlowLog, parse_flow_log};
use crate::analysis::counters::{CounterLog, parse_counter_log};
use crate::analysis::deltas::DeltaSeriesBuilder;
use crate::analysis::errors::{AnalysisWarning, Diagnostics};
use crate::analysis::formatting::{format_bits_per_sec, format_mbps, format_percent, format_window};
use crate::analysis::records::{CounterDelta, CpuCategory, CpuWindow, RX_BYTES, SourceId, TX_BYTES};
use crate::analysis::reporting::RunReport;
use crate::cli::commands::Commands;
use crate::settings::Settings;

#[derive(Serialize)]
struct FlowOutput<'a> {
    #[serde(flatten)]
    log: &'a FlowLog,
    warnings: &'a [AnalysisWarning],
}

#[derive(Serialize)]
struct CounterOutput<'a> {
    samples: &'a CounterLog,
    interface_rates: &'a BTreeMap<SourceId, Vec<CounterDelta>>,
    cpu: &'a [CpuWindow],
    warnings: &'a [AnalysisWarning],
}

/// Executes parsed commands against the loaded settings
pub struct CommandHandler {
    settings: Settings,
}

impl CommandHandler {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    pub fn handle(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Flow {
                file,
                id,
                interval,
                duration,
                json,
            } => self.handle_flow(&file, id, interval, duration, json),
            Commands::Counters {
                file,
                start_time,
                json,
            } => self.handle_counters(&file, start_time, json),
            Commands::Aggregate {
                files,
                interval,
                duration,
                json,
            } => self.handle_aggregate(&files, interval, duration, json),
            Commands::Run {
                pairs,
                flows,
                counters,
                destinations,
                interval,
                duration,
                start_time,
                json,
            } => {
                let settings = self
                    .settings
                    .clone()
                    .with_overrides(interval, duration, start_time)?;
                let flows = flows
                    .into_iter()
                    .map(|(id, path)| (SourceId::new(id), PathBuf::from(path)))
                    .collect::<Vec<_>>();
                let destinations = destinations
                    .into_iter()
                    .map(|(flow, interface)| (SourceId::new(flow), SourceId::new(interface)))
                    .collect();
                let report = build_run_report(
                    &settings,
                    pairs,
                    &flows,
                    Some(counters.as_path()),
                    &destinations,
                )?;
                print_output(&report, json, print_report)
            }
        }
    }

    fn handle_flow(
        &self,
        file: &Path,
        id: Option<String>,
        interval: Option<f64>,
        duration: Option<f64>,
        json: bool,
    ) -> Result<()> {
        let settings = self.settings.clone().with_overrides(interval, duration, None)?;
        let flow = match id {
            Some(id) => SourceId::new(id),
            None => flow_id_from_path(file)?,
        };

        let mut diagnostics = Diagnostics::new();
        let log = read_flow_log(&settings, flow, file, &mut diagnostics)?;
        let output = FlowOutput {
            log: &log,
            warnings: diagnostics.warnings(),
        };
        print_output(&output, json, |output| {
            println!("Flow {}", output.log.flow);
            println!("{}", "=".repeat(40));
            for record in output.log.series.iter() {
                println!(
                    "  {}  {:>14}",
                    format_window(record.start, record.stop),
                    format_mbps(record.value)
                );
            }
            match output.log.total_bandwidth {
                Some(total) => println!("\nTotal bandwidth: {}", format_mbps(total)),
                None => println!("\nTotal bandwidth: unavailable"),
            }
            print_warnings(output.warnings);
        })
    }

    fn handle_counters(&self, file: &Path, start_time: Option<f64>, json: bool) -> Result<()> {
        let settings = self.settings.clone().with_overrides(None, None, start_time)?;
        let mut diagnostics = Diagnostics::new();
        let log = read_counter_log(&settings, file, &mut diagnostics)?;

        let rates = DeltaSeriesBuilder::interface_rates();
        let interface_rates: BTreeMap<SourceId, Vec<CounterDelta>> = log
            .interfaces
            .iter()
            .map(|(interface, samples)| {
                (
                    interface.clone(),
                    rates.build(interface, samples, &mut diagnostics),
                )
            })
            .collect();
        let cpu: Vec<CpuWindow> = DeltaSeriesBuilder::cpu_shares()
            .build(&SourceId::cpu(), &log.cpu, &mut diagnostics)
            .iter()
            .map(CpuWindow::from_delta)
            .collect();

        let output = CounterOutput {
            samples: &log,
            interface_rates: &interface_rates,
            cpu: &cpu,
            warnings: diagnostics.warnings(),
        };
        print_output(&output, json, |output| {
            for (interface, deltas) in output.interface_rates {
                println!("Interface {}", interface);
                println!("{}", "=".repeat(40));
                for delta in deltas {
                    println!(
                        "  {}  rx {:>14}  tx {:>14}",
                        format_window(delta.start, delta.stop),
                        format_rate(delta.value(RX_BYTES)),
                        format_rate(delta.value(TX_BYTES))
                    );
                }
                println!();
            }
            print_cpu(output.cpu);
            print_warnings(output.warnings);
        })
    }

    fn handle_aggregate(
        &self,
        files: &[PathBuf],
        interval: Option<f64>,
        duration: Option<f64>,
        json: bool,
    ) -> Result<()> {
        let settings = self.settings.clone().with_overrides(interval, duration, None)?;
        let flows = files
            .iter()
            .map(|path| flow_id_from_path(path).map(|flow| (flow, path.clone())))
            .collect::<Result<Vec<_>>>()?;

        let report = build_run_report(
            &settings,
            flows.len(),
            &flows,
            None,
            &BTreeMap::new(),
        )?;
        print_output(&report, json, print_report)
    }
}

/// Parses every flow log and, when given, the counter log, then builds the report
pub fn build_run_report(
    settings: &Settings,
    pairs: usize,
    flows: &[(SourceId, PathBuf)],
    counters: Option<&Path>,
    destinations: &BTreeMap<SourceId, SourceId>,
) -> Result<RunReport> {
    let mut diagnostics = Diagnostics::new();
    let mut flow_logs = Vec::with_capacity(flows.len());
    for (flow, path) in flows {
        if flow_logs.iter().any(|log: &FlowLog| &log.flow == flow) {
            bail!("Flow '{}' given more than once", flow);
        }
        flow_logs.push(read_flow_log(settings, flow.clone(), path, &mut diagnostics)?);
    }

    let counter_log = match counters {
        Some(path) => read_counter_log(settings, path, &mut diagnostics)?,
        None => CounterLog::default(),
    };

    info!(
        "Building report for {} pairs from {} flow logs",
        pairs,
        flow_logs.len()
    );
    let report = RunReport::build(
        pairs,
        flow_logs,
        &counter_log,
        destinations,
        &settings.aligner(),
        diagnostics,
    )
    .context("Failed to analyze run")?;
    Ok(report)
}

fn read_flow_log(
    settings: &Settings,
    flow: SourceId,
    path: &Path,
    diagnostics: &mut Diagnostics,
) -> Result<FlowLog> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read bandwidth log {}", path.display()))?;
    info!("Parsing bandwidth log {} as flow '{}'", path.display(), flow);
    parse_flow_log(flow, text.lines(), &settings.bandwidth_extractor(), diagnostics)
        .with_context(|| format!("Failed to parse bandwidth log {}", path.display()))
}

fn read_counter_log(
    settings: &Settings,
    path: &Path,
    diagnostics: &mut Diagnostics,
) -> Result<CounterLog> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read counter log {}", path.display()))?;
    info!("Parsing counter log {}", path.display());
    parse_counter_log(
        text.lines(),
        &settings.counter_extractor(),
        settings.start_time,
        diagnostics,
    )
    .with_context(|| format!("Failed to parse counter log {}", path.display()))
}

/// Flow id from a file name, extension stripped
pub fn flow_id_from_path(path: &Path) -> Result<SourceId> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .map(SourceId::new)
        .with_context(|| format!("Cannot derive a flow id from {}", path.display()))
}

fn print_output<T: Serialize>(value: &T, json: bool, print_text: impl FnOnce(&T)) -> Result<()> {
    if json {
        let text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
        println!("{}", text);
    } else {
        print_text(value);
    }
    Ok(())
}

fn format_rate(bits_per_sec: Option<f64>) -> String {
    bits_per_sec
        .map(format_bits_per_sec)
        .unwrap_or_else(|| "-".to_string())
}

fn print_report(report: &RunReport) {
    println!("Run with {} pairs", report.pairs);
    println!("{}", "=".repeat(60));

    for flow in &report.flows {
        let mean = flow
            .mean_interval_bandwidth()
            .map(format_mbps)
            .unwrap_or_else(|| "-".to_string());
        let total = flow
            .total_bandwidth
            .map(format_mbps)
            .unwrap_or_else(|| "unavailable".to_string());
        print!(
            "  {:<10} {:>3} intervals  mean {:>14}  total {:>14}",
            flow.flow.as_str(),
            flow.intervals.len(),
            mean,
            total
        );
        match &flow.destination_interface {
            Some(interface) => println!("  via {}", interface),
            None => println!(),
        }
    }

    println!("\nPer-window totals");
    println!("{}", "-".repeat(60));
    for window in &report.interval_totals {
        println!(
            "  {}  total {:>14}  std dev {:>14}  flows {}",
            format_window(window.start, window.stop),
            format_mbps(window.total),
            format_mbps(window.std_deviation()),
            window.flows
        );
    }

    if let Some(rx_totals) = &report.rx_totals {
        println!("\nPer-window receive totals");
        println!("{}", "-".repeat(60));
        for window in rx_totals {
            println!(
                "  {}  total {:>14}  std dev {:>14}",
                format_window(window.start, window.stop),
                format_mbps(window.total),
                format_mbps(window.std_deviation())
            );
        }
    }

    let total = report.total_bandwidth();
    println!("\nTotal bandwidth: {}", format_mbps(total.total));
    if !total.is_complete() {
        let missing: Vec<&str> = total.unavailable.iter().map(SourceId::as_str).collect();
        println!("  (no summary for: {})", missing.join(", "));
    }
    if let Some(mean) = report.mean_flow_bandwidth() {
        println!("Mean per flow:   {}", format_mbps(mean));
    }

    if !report.cpu.is_empty() {
        println!();
        print_cpu(&report.cpu);
        println!(
            "  mean user {}  system {}  idle {}",
            format_percent(report.mean_cpu_share(CpuCategory::User)),
            format_percent(report.mean_cpu_share(CpuCategory::System)),
            format_percent(report.mean_cpu_share(CpuCategory::Idle))
        );
    }

    print_warnings(&report.warnings);
}

fn print_cpu(windows: &[CpuWindow]) {
    println!("CPU usage");
    println!("{}", "-".repeat(60));
    for window in windows {
        println!(
            "  {}  user {:>7}  system {:>7}  idle {:>7}  busy {:>7}",
            format_window(window.start, window.stop),
            format_percent(window.user),
            format_percent(window.system),
            format_percent(window.idle),
            format_percent(window.busy())
        );
    }
}

fn print_warnings(warnings: &[AnalysisWarning]) {
    if warnings.is_empty() {
        return;
    }
    println!("\n{} warning(s):", warnings.len());
    for warning in warnings {
        println!("  - {}", warning);
    }
}
