//! 多文件并行处理模块
//!
//! 使用rayon实现文件级并行处理，保证输出顺序一致性。
//! 所有文件共享同一个分块执行后端。

use super::batch_state::{BatchStatsSnapshot, ParallelBatchStats};
use super::cli::AppConfig;
use super::processor::{BatchEntry, process_to_path};
use super::utils;
use crate::error::{UpscaleError, UpscaleResult};
use crate::processing::{ExecutionBackend, PipelineObserver};
use rayon::prelude::*;
use std::path::PathBuf;

/// 多文件并行处理
///
/// - 使用rayon线程池精确控制并发度
/// - 线程安全的统计信息收集
/// - 索引排序保证输出顺序
pub fn process_batch_parallel(
    audio_files: &[PathBuf],
    config: &AppConfig,
    parallel_degree: usize,
    backend: &dyn ExecutionBackend,
    observer: &dyn PipelineObserver,
) -> UpscaleResult<(Vec<BatchEntry>, BatchStatsSnapshot)> {
    println!("⚡ 启用多文件并行处理 / parallel files: {parallel_degree}");

    let stats = ParallelBatchStats::new();
    let outputs = utils::plan_output_paths(
        audio_files,
        &config.output_dir,
        config.upscale.target_format.extension(),
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(parallel_degree)
        .thread_name(|i| format!("file-worker-{i}"))
        .build()
        .map_err(|e| UpscaleError::ResourceError(format!("线程池创建失败: {e}")))?;

    let mut entries: Vec<BatchEntry> = pool.install(|| {
        audio_files
            .par_iter()
            .enumerate()
            .map(|(index, audio_file)| {
                let entry = process_to_path(
                    index,
                    audio_file,
                    &outputs[index],
                    &config.upscale,
                    backend,
                    observer,
                );

                let filename = utils::extract_filename_lossy(audio_file);
                match entry.category() {
                    None => {
                        let count = stats.inc_processed();
                        if config.verbose {
                            println!("✅ [{count}/{}] {filename}", audio_files.len());
                        }
                    }
                    Some(category) => {
                        let count = stats.inc_failed(index, category, filename.clone());
                        println!(
                            "❌ [{count}/{}] {filename} - {}",
                            audio_files.len(),
                            entry.error.as_deref().unwrap_or_default()
                        );
                    }
                }
                entry
            })
            .collect()
    });

    // 按原始顺序排序结果
    entries.sort_by_key(|e| e.index);
    Ok((entries, stats.snapshot()))
}
