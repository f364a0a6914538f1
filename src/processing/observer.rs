//! 流水线观察者
//!
//! 库内部不持有任何全局日志状态，进度与生命周期事件通过注入的观察者回调。
//! 调用点：任务开始、阶段切换、每轮迭代完成、任务完成/失败。

use crate::error::UpscaleError;
use std::path::PathBuf;
use std::time::Duration;

/// 任务开始时的描述信息
#[derive(Debug, Clone)]
pub struct JobInfo {
    pub input: PathBuf,
    pub output: PathBuf,
    pub channels: usize,
    pub frames: usize,
    pub sample_rate: u32,
    pub source_bitrate: Option<u32>,
}

/// 任务完成摘要
#[derive(Debug, Clone, PartialEq)]
pub struct JobSummary {
    pub input: PathBuf,
    pub output: PathBuf,
    pub upscale_factor: u32,
    pub output_sample_rate: u32,
    pub output_frames: usize,
    /// 全静音声道（归一化时原样透传）
    pub silent_channels: Vec<usize>,
    pub elapsed: Duration,
}

/// 流水线阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Decoding,
    FactorResolved { factor: u32, output_sample_rate: u32 },
    Interpolating { channel: usize },
    Refining { channel: usize },
    Rescaling,
    Normalizing,
    Encoding,
}

/// 观察者接口（所有方法均有空默认实现）
pub trait PipelineObserver: Send + Sync {
    fn on_job_start(&self, _info: &JobInfo) {}

    fn on_stage(&self, _stage: PipelineStage) {}

    /// `iteration` 从1开始计数
    fn on_iteration(&self, _channel: usize, _iteration: u32, _total: u32) {}

    fn on_job_complete(&self, _summary: &JobSummary) {}

    fn on_job_failed(&self, _input: &std::path::Path, _error: &UpscaleError) {}
}

/// 丢弃所有事件
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl PipelineObserver for NullObserver {}

/// 将事件转发到 `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn on_job_start(&self, info: &JobInfo) {
        tracing::info!(
            input = %info.input.display(),
            channels = info.channels,
            frames = info.frames,
            sample_rate = info.sample_rate,
            "开始升频 / starting upscale"
        );
        match info.source_bitrate {
            Some(bps) => tracing::info!("原始码率 / source bitrate: {:.2} kbps", bps as f64 / 1000.0),
            None => tracing::info!("原始码率未知 / source bitrate unknown"),
        }
    }

    fn on_stage(&self, stage: PipelineStage) {
        match stage {
            PipelineStage::Decoding => tracing::info!("加载音频 / loading audio"),
            PipelineStage::FactorResolved {
                factor,
                output_sample_rate,
            } => tracing::info!(
                factor,
                output_sample_rate,
                "升频倍数已确定 / upscale factor set"
            ),
            PipelineStage::Interpolating { channel } => {
                tracing::info!(channel, "插值 / interpolating")
            }
            PipelineStage::Refining { channel } => tracing::info!(channel, "执行IST / performing IST"),
            PipelineStage::Rescaling => {
                tracing::info!("按原始音频缩放幅度 / auto-scaling amplitudes")
            }
            PipelineStage::Normalizing => tracing::info!("归一化 / normalizing"),
            PipelineStage::Encoding => tracing::info!("写出音频 / encoding output"),
        }
    }

    fn on_iteration(&self, channel: usize, iteration: u32, total: u32) {
        tracing::debug!(channel, "IST迭代 / IST iteration {iteration}/{total}");
    }

    fn on_job_complete(&self, summary: &JobSummary) {
        if !summary.silent_channels.is_empty() {
            tracing::warn!(
                channels = ?summary.silent_channels,
                "静音声道原样透传 / silent channels passed through"
            );
        }
        tracing::info!(
            output = %summary.output.display(),
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "已保存 / saved"
        );
    }

    fn on_job_failed(&self, input: &std::path::Path, error: &UpscaleError) {
        tracing::error!(input = %input.display(), "任务失败 / job failed: {error}");
    }
}
