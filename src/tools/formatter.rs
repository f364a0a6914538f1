//! 输出格式化模块
//!
//! 批处理汇总表格（终端）与文本报告（文件）。

use super::batch_state::BatchStatsSnapshot;
use super::cli::AppConfig;
use super::processor::BatchEntry;
use super::utils;
use crate::error::{UpscaleError, UpscaleResult};
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::UTF8_FULL};
use std::path::Path;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 秒数显示
#[inline]
fn format_elapsed(ms: u64) -> String {
    format!("{:.2}s", ms as f64 / 1000.0)
}

/// 构建汇总表格
pub fn build_summary_table(entries: &[BatchEntry]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "File / 文件",
        "Status / 状态",
        "Output or Error / 输出或错误",
        "Factor / 倍数",
        "Rate / 采样率",
        "Time / 耗时",
    ]);

    for entry in entries {
        let (status, detail) = if entry.is_completed() {
            ("Completed", entry.output.display().to_string())
        } else {
            ("Failed", entry.error.clone().unwrap_or_default())
        };
        table.add_row(vec![
            Cell::new(utils::extract_filename_lossy(&entry.input)),
            Cell::new(status),
            Cell::new(detail),
            Cell::new(
                entry
                    .upscale_factor
                    .map_or_else(|| "-".to_string(), |f| format!("×{f}")),
            )
            .set_alignment(CellAlignment::Right),
            Cell::new(
                entry
                    .output_sample_rate
                    .map_or_else(|| "-".to_string(), |r| format!("{r} Hz")),
            )
            .set_alignment(CellAlignment::Right),
            Cell::new(format_elapsed(entry.elapsed_ms)).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

/// 生成文本报告
pub fn create_report(
    config: &AppConfig,
    entries: &[BatchEntry],
    stats: &BatchStatsSnapshot,
) -> String {
    let mut output = String::new();
    let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");

    output.push_str("=====================================\n");
    output.push_str(&format!("   Fat Llama Upscaler v{VERSION}\n"));
    output.push_str("   批量升频报告 / Batch upscale report\n");
    output.push_str("=====================================\n");
    output.push_str(&format!("log date: {now}\n\n"));

    output.push_str(&format!(
        "目标 / target: {} @ {} kbps\n",
        config.upscale.target_format, config.upscale.target_bitrate_kbps
    ));
    output.push_str(&format!(
        "迭代 / iterations: {}, 阈值 / threshold: {}, workers: {} ({})\n",
        config.upscale.max_iterations,
        config.upscale.threshold,
        config.upscale.worker_count,
        config.backend
    ));
    output.push_str(&format!("输出目录 / output dir: {}\n\n", config.output_dir.display()));

    output.push_str("文件名\t状态\t倍数\t采样率\t耗时\t输出/错误\n");
    output.push_str("--------------------------------------------------------\n");
    for entry in entries {
        let name = utils::extract_filename_lossy(&entry.input);
        if entry.is_completed() {
            output.push_str(&format!(
                "{name}\tCompleted\t{}\t{}\t{}\t{}\n",
                entry.upscale_factor.unwrap_or_default(),
                entry.output_sample_rate.unwrap_or_default(),
                format_elapsed(entry.elapsed_ms),
                entry.output.display()
            ));
            if !entry.silent_channels.is_empty() {
                output.push_str(&format!(
                    "\t静音声道 / silent channels: {:?}\n",
                    entry.silent_channels
                ));
            }
        } else {
            output.push_str(&format!(
                "{name}\tFailed\t-\t-\t{}\t{}\n",
                format_elapsed(entry.elapsed_ms),
                entry.error.as_deref().unwrap_or_default()
            ));
        }
    }

    output.push_str(&create_stats_footer(stats));
    output
}

/// 统计信息尾部
pub fn create_stats_footer(stats: &BatchStatsSnapshot) -> String {
    let mut output = String::new();
    output.push('\n');
    output.push_str("=====================================\n");
    output.push_str("批量处理统计 / Batch statistics:\n");
    output.push_str(&format!("   总文件数 / total: {}\n", stats.total()));
    output.push_str(&format!("   成功处理 / completed: {}\n", stats.processed));
    output.push_str(&format!("   处理失败 / failed: {}\n", stats.failed));
    if stats.total() > 0 {
        output.push_str(&format!(
            "   处理成功率 / success rate: {:.1}%\n",
            stats.processed as f64 / stats.total() as f64 * 100.0
        ));
    }

    if !stats.error_stats.is_empty() {
        let mut categories: Vec<_> = stats.error_stats.iter().collect();
        categories.sort_by_key(|(category, _)| category.code());
        output.push_str("   错误分类 / failures by category:\n");
        for (category, files) in categories {
            output.push_str(&format!(
                "      {} ({}): {}\n",
                category.display_name(),
                files.len(),
                files.join(", ")
            ));
        }
    }
    output
}

/// 写出报告文件
pub fn write_report(path: &Path, content: &str) -> UpscaleResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content).map_err(UpscaleError::IoError)
}

/// 显示批量处理完成信息
pub fn show_batch_completion_info(
    entries: &[BatchEntry],
    stats: &BatchStatsSnapshot,
    report_path: Option<&Path>,
) {
    println!();
    println!("{}", build_summary_table(entries));
    println!();
    println!("📊 批量处理完成 / batch finished!");
    println!("   成功处理 / completed: {} / {}", stats.processed, stats.total());
    if stats.failed > 0 {
        println!("   失败文件 / failed: {}", stats.failed);
    }
    if let Some(path) = report_path {
        println!("   📄 报告 / report: {}", path.display());
    }
}
