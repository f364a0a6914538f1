//! 升频流水线
//!
//! ```text
//! AudioBuffer ─▶ 倍数计算 ─▶ 每声道 [插值 ─▶ IST(backend) ─▶ expanded + ist_changes]
//!                                                 │
//!                              UpscaledAudio ◀─ 两遍归一化
//! ```
//!
//! 声道之间互不共享缓冲区，按声道顺序依次处理；并行只发生在单声道的分块层面。

use super::backend::ExecutionBackend;
use super::observer::{PipelineObserver, PipelineStage};
use crate::audio::{AudioBuffer, UpscaledAudio};
use crate::core::{
    AmplitudeNormalizer, SpectralThresholder, UpscaleConfig, peak_abs, upscale_factor,
    zero_order_hold,
};
use crate::error::{UpscaleError, UpscaleResult};

/// 单声道处理：插值 + IST精炼
#[derive(Debug, Clone, Copy)]
pub struct ChannelPipeline {
    factor: u32,
    thresholder: SpectralThresholder,
}

impl ChannelPipeline {
    pub fn new(factor: u32, thresholder: SpectralThresholder) -> Self {
        Self {
            factor,
            thresholder,
        }
    }

    /// 返回重建后的声道：`expanded[i] + ist_changes[i]`
    pub fn process(
        &self,
        channel: usize,
        samples: &[f32],
        backend: &dyn ExecutionBackend,
        observer: &dyn PipelineObserver,
    ) -> UpscaleResult<Vec<f64>> {
        observer.on_stage(PipelineStage::Interpolating { channel });
        let expanded = zero_order_hold(samples, self.factor);

        observer.on_stage(PipelineStage::Refining { channel });
        let mut changes = self
            .thresholder
            .refine(channel, &expanded, backend, observer)?;

        debug_assert_eq!(changes.len(), expanded.len());
        for (change, &base) in changes.iter_mut().zip(&expanded) {
            *change += base as f64;
        }
        Ok(changes)
    }
}

/// 整个缓冲区的升频流水线
#[derive(Debug, Clone)]
pub struct UpscalePipeline {
    config: UpscaleConfig,
}

impl UpscalePipeline {
    pub fn new(config: UpscaleConfig) -> Self {
        Self { config }
    }

    #[inline]
    pub fn config(&self) -> &UpscaleConfig {
        &self.config
    }

    /// 解析倍数与输出采样率
    ///
    /// # 错误
    ///
    /// * `ConfigError` - 目标码率越界，或输出采样率/长度溢出
    pub fn resolve_factor(&self, buffer: &AudioBuffer) -> UpscaleResult<(u32, u32)> {
        let factor = upscale_factor(
            buffer.source_bitrate(),
            self.config.target_bitrate_kbps,
            self.config.target_format,
        )?;
        let output_rate = buffer.sample_rate().checked_mul(factor).ok_or_else(|| {
            UpscaleError::ConfigError(format!(
                "输出采样率溢出 / output sample rate overflow: {} × {factor}",
                buffer.sample_rate()
            ))
        })?;
        if buffer.frames().checked_mul(factor as usize).is_none() {
            return Err(UpscaleError::ConfigError(format!(
                "输出长度溢出 / output length overflow: {} × {factor}",
                buffer.frames()
            )));
        }
        Ok((factor, output_rate))
    }

    /// 执行升频：插值 → IST → 缩放 → 归一化
    pub fn run(
        &self,
        buffer: &AudioBuffer,
        backend: &dyn ExecutionBackend,
        observer: &dyn PipelineObserver,
    ) -> UpscaleResult<UpscaledAudio> {
        self.config.validate()?;

        let (factor, output_sample_rate) = self.resolve_factor(buffer)?;
        observer.on_stage(PipelineStage::FactorResolved {
            factor,
            output_sample_rate,
        });

        let channel_pipeline =
            ChannelPipeline::new(factor, SpectralThresholder::from_config(&self.config));

        let mut reconstructed = Vec::with_capacity(buffer.channel_count());
        let mut original_peaks = Vec::with_capacity(buffer.channel_count());
        for (channel, samples) in buffer.channels().iter().enumerate() {
            original_peaks.push(peak_abs(samples));
            reconstructed.push(channel_pipeline.process(channel, samples, backend, observer)?);
        }

        let mut normalizer = AmplitudeNormalizer::new();
        observer.on_stage(PipelineStage::Rescaling);
        normalizer.rescale_all(&mut reconstructed, &original_peaks);
        observer.on_stage(PipelineStage::Normalizing);
        normalizer.normalize_all(&mut reconstructed);

        Ok(UpscaledAudio {
            channels: reconstructed,
            sample_rate: output_sample_rate,
            upscale_factor: factor,
            silent_channels: normalizer.into_silent_channels(),
        })
    }
}
