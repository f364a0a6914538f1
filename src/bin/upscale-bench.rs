//! upscale-bench - IST 后端基准工具
//!
//! 在合成信号（或指定音频文件的第一个声道）上比较各执行后端的耗时，
//! 同时核对分块结果与串行后端逐位一致。

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use chrono::Local;
use clap::{Parser, ValueEnum};
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::UTF8_FULL};
use fatllama_upscaler::audio::AudioDecoder;
use fatllama_upscaler::core::{SpectralThresholder, zero_order_hold};
use fatllama_upscaler::processing::{
    BackendKind, ExecutionBackend, NullObserver, create_backend,
};
use serde::Serialize;
use sysinfo::System;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Parser)]
#[command(name = "upscale-bench")]
#[command(about = "IST 后端基准工具 / IST backend benchmark")]
#[command(version)]
struct Cli {
    /// 使用音频文件的第一个声道（默认合成信号）
    /// Use the first channel of an audio file (synthetic signal by default)
    #[arg(long, short = 'i')]
    input: Option<PathBuf>,

    /// 合成信号长度（采样点）
    /// Synthetic signal length in samples
    #[arg(long, default_value_t = 44_100)]
    samples: usize,

    /// 插值倍数
    /// Upscale factor applied before refinement
    #[arg(long, short = 'f', default_value_t = 4)]
    factor: u32,

    /// IST迭代次数
    /// IST iterations
    #[arg(long, short = 'n', default_value_t = 20)]
    iterations: u32,

    /// 阈值
    #[arg(long, short = 't', default_value_t = 0.6)]
    threshold: f64,

    /// 分块数 / worker数
    #[arg(long, short = 'w')]
    workers: Option<usize>,

    /// 跳过整段参考路径
    /// Skip the whole-signal reference path
    #[arg(long)]
    skip_reference: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

#[derive(Debug, Serialize)]
struct BenchRow {
    path: String,
    seconds: f64,
    samples_per_second: f64,
    /// 与串行后端的最大绝对差（参考路径不参与比较）
    max_abs_diff: Option<f64>,
}

#[derive(Debug, Serialize)]
struct BenchReport {
    timestamp: String,
    host: HostInfo,
    signal: String,
    samples: usize,
    iterations: u32,
    threshold: f64,
    workers: usize,
    rows: Vec<BenchRow>,
}

#[derive(Debug, Serialize)]
struct HostInfo {
    os: String,
    cpus: usize,
    total_memory_mb: f64,
}

fn host_info() -> HostInfo {
    let system = System::new_all();
    HostInfo {
        os: format!(
            "{} {}",
            System::name().unwrap_or_else(|| "unknown".to_string()),
            System::os_version().unwrap_or_default()
        ),
        cpus: system.cpus().len(),
        total_memory_mb: system.total_memory() as f64 / 1024.0 / 1024.0,
    }
}

fn synthetic_signal(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| {
            let t = i as f32 / 44_100.0;
            0.5 * (std::f32::consts::TAU * 440.0 * t).sin()
                + 0.3 * (std::f32::consts::TAU * 1_250.0 * t).sin()
                + 0.1 * (std::f32::consts::TAU * 7_000.0 * t).sin()
        })
        .collect()
}

fn load_signal(cli: &Cli) -> Result<(String, Vec<f32>)> {
    match &cli.input {
        Some(path) => {
            let buffer = AudioDecoder::new()
                .decode(path)
                .with_context(|| format!("无法解码 / failed to decode {}", path.display()))?;
            let first = buffer
                .channels()
                .first()
                .cloned()
                .context("音频没有声道 / audio has no channels")?;
            Ok((path.display().to_string(), first))
        }
        None => Ok((
            format!("synthetic 3-tone, {} samples", cli.samples),
            synthetic_signal(cli.samples),
        )),
    }
}

fn time_backend(
    thresholder: &SpectralThresholder,
    expanded: &[f32],
    backend: &dyn ExecutionBackend,
) -> Result<(f64, Vec<f64>)> {
    let started = Instant::now();
    let values = thresholder.refine(0, expanded, backend, &NullObserver)?;
    Ok((started.elapsed().as_secs_f64(), values))
}

fn max_abs_diff(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}

fn row(path: &str, seconds: f64, samples: usize, diff: Option<f64>) -> BenchRow {
    BenchRow {
        path: path.to_string(),
        seconds,
        samples_per_second: if seconds > 0.0 {
            samples as f64 / seconds
        } else {
            0.0
        },
        max_abs_diff: diff,
    }
}

fn output_table(report: &BenchReport) {
    println!("IST Benchmark / IST 基准");
    println!("========================");
    println!("Timestamp / 时间戳: {}", report.timestamp);
    println!(
        "Host / 主机: {} ({} CPUs, {:.0} MB)",
        report.host.os, report.host.cpus, report.host.total_memory_mb
    );
    println!("Signal / 信号: {}", report.signal);
    println!(
        "Samples / 采样点: {}, iterations: {}, threshold: {}, workers: {}\n",
        report.samples, report.iterations, report.threshold, report.workers
    );

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "Path / 路径",
        "Time (s) / 时间",
        "Samples/s / 吞吐",
        "Max |Δ| vs serial",
    ]);
    for row in &report.rows {
        table.add_row(vec![
            Cell::new(&row.path),
            Cell::new(format!("{:.3}", row.seconds)).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.0}", row.samples_per_second))
                .set_alignment(CellAlignment::Right),
            Cell::new(
                row.max_abs_diff
                    .map_or_else(|| "-".to_string(), |d| format!("{d:e}")),
            )
            .set_alignment(CellAlignment::Right),
        ]);
    }
    println!("{table}");
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.factor == 0 {
        bail!("倍数必须至少为1 / factor must be >= 1");
    }

    let workers = cli
        .workers
        .unwrap_or_else(fatllama_upscaler::tools::constants::host_core_count)
        .max(1);
    let (signal, samples) = load_signal(&cli)?;
    let expanded = zero_order_hold(&samples, cli.factor);
    let thresholder = SpectralThresholder::new(cli.iterations, cli.threshold, workers);

    let serial = create_backend(BackendKind::Serial, workers)?;
    let (serial_secs, baseline) = time_backend(&thresholder, &expanded, serial.as_ref())?;
    let mut rows = vec![row("serial", serial_secs, expanded.len(), Some(0.0))];

    for kind in [BackendKind::Local, BackendKind::Distributed] {
        let backend = create_backend(kind, workers)?;
        let (secs, values) = time_backend(&thresholder, &expanded, backend.as_ref())?;
        rows.push(row(
            kind.as_str(),
            secs,
            expanded.len(),
            Some(max_abs_diff(&baseline, &values)),
        ));
    }

    if !cli.skip_reference {
        let started = Instant::now();
        thresholder.refine_reference(&expanded)?;
        rows.push(row(
            "reference (whole signal)",
            started.elapsed().as_secs_f64(),
            expanded.len(),
            None,
        ));
    }

    let report = BenchReport {
        timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        host: host_info(),
        signal,
        samples: expanded.len(),
        iterations: cli.iterations,
        threshold: cli.threshold,
        workers,
        rows,
    };

    match cli.format {
        OutputFormat::Table => output_table(&report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}
