//! 文件处理模块
//!
//! 单文件处理与串行批处理。单个文件的失败只记录在结果中，不会中断批处理。

use super::batch_state::{BatchStatsSnapshot, SerialBatchStats};
use super::cli::AppConfig;
use super::utils;
use crate::core::UpscaleConfig;
use crate::error::{ErrorCategory, UpscaleError};
use crate::processing::{ExecutionBackend, JobOutcome, JobSummary, PipelineObserver, UpscaleJob};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// 单个文件的处理状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Completed,
    Failed,
}

/// 批处理中单个文件的结果（同时作为worker进程的报告格式）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchEntry {
    /// 输入顺序中的位置
    pub index: usize,
    pub input: PathBuf,
    pub output: PathBuf,
    pub status: EntryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// 错误类别标识（见 `ErrorCategory::code`）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upscale_factor: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_sample_rate: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub silent_channels: Vec<usize>,
    pub elapsed_ms: u64,
}

impl BatchEntry {
    pub fn completed(index: usize, summary: &JobSummary) -> Self {
        Self {
            index,
            input: summary.input.clone(),
            output: summary.output.clone(),
            status: EntryStatus::Completed,
            error: None,
            error_category: None,
            upscale_factor: Some(summary.upscale_factor),
            output_sample_rate: Some(summary.output_sample_rate),
            silent_channels: summary.silent_channels.clone(),
            elapsed_ms: summary.elapsed.as_millis() as u64,
        }
    }

    pub fn failed(
        index: usize,
        input: &Path,
        output: &Path,
        error: &UpscaleError,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            index,
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            status: EntryStatus::Failed,
            error: Some(error.to_string()),
            error_category: Some(ErrorCategory::from_error(error).code().to_string()),
            upscale_factor: None,
            output_sample_rate: None,
            silent_channels: Vec::new(),
            elapsed_ms,
        }
    }

    #[inline]
    pub fn is_completed(&self) -> bool {
        self.status == EntryStatus::Completed
    }

    /// 失败条目的错误类别
    pub fn category(&self) -> Option<ErrorCategory> {
        self.error_category
            .as_deref()
            .map(ErrorCategory::from_code)
    }
}

/// 处理单个文件到指定输出路径
pub fn process_to_path(
    index: usize,
    input: &Path,
    output: &Path,
    config: &UpscaleConfig,
    backend: &dyn ExecutionBackend,
    observer: &dyn PipelineObserver,
) -> BatchEntry {
    let started = Instant::now();
    let job = UpscaleJob::new(input, output, config.clone());

    match job.execute(backend, observer) {
        JobOutcome::Completed(summary) => BatchEntry::completed(index, &summary),
        JobOutcome::Failed(e) => BatchEntry::failed(
            index,
            input,
            output,
            &e,
            started.elapsed().as_millis() as u64,
        ),
    }
}

/// 串行批处理
pub fn process_batch_serial(
    audio_files: &[PathBuf],
    config: &AppConfig,
    backend: &dyn ExecutionBackend,
    observer: &dyn PipelineObserver,
) -> (Vec<BatchEntry>, BatchStatsSnapshot) {
    let mut stats = SerialBatchStats::new();
    let mut entries = Vec::with_capacity(audio_files.len());
    let outputs = utils::plan_output_paths(
        audio_files,
        &config.output_dir,
        config.upscale.target_format.extension(),
    );

    for (index, (audio_file, output)) in audio_files.iter().zip(&outputs).enumerate() {
        let filename = utils::extract_filename_lossy(audio_file);
        if config.verbose {
            println!(
                "[PROCESSING] [{}/{}] 处理 / Processing: {filename}",
                index + 1,
                audio_files.len()
            );
        }

        let entry = process_to_path(index, audio_file, output, &config.upscale, backend, observer);
        record_entry(&entry, &mut stats, audio_files.len(), config.verbose);
        entries.push(entry);
    }

    (entries, stats.snapshot())
}

fn record_entry(entry: &BatchEntry, stats: &mut SerialBatchStats, total: usize, verbose: bool) {
    let filename = utils::extract_filename_lossy(&entry.input);
    match entry.category() {
        None => {
            stats.inc_processed();
            if verbose {
                println!("   [OK] 处理成功 / Processing succeeded");
            } else {
                println!("[OK] [{}/{total}] {filename}", entry.index + 1);
            }
        }
        Some(category) => {
            println!(
                "[FAIL] [{}/{total}] {filename} - [{}] {} / 处理失败",
                entry.index + 1,
                category.display_name(),
                entry.error.as_deref().unwrap_or_default()
            );
            stats.inc_failed(category, filename);
        }
    }
}

/// 汇总已有的结果条目（worker进程模式使用）
pub fn stats_from_entries(entries: &[BatchEntry]) -> BatchStatsSnapshot {
    let mut stats = SerialBatchStats::new();
    for entry in entries {
        match entry.category() {
            None => {
                stats.inc_processed();
            }
            Some(category) => {
                stats.inc_failed(category, utils::extract_filename_lossy(&entry.input));
            }
        }
    }
    stats.snapshot()
}
