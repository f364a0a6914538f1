//! 单文件升频任务
//!
//! 生命周期：校验配置 → 解码 → 流水线 → 编码写出。
//! 配置在解码之前校验，配置错误不会触碰输入文件。

use super::backend::ExecutionBackend;
use super::observer::{JobInfo, JobSummary, PipelineObserver, PipelineStage};
use super::pipeline::UpscalePipeline;
use crate::audio::{AudioDecoder, AudioEncoder};
use crate::core::UpscaleConfig;
use crate::error::{UpscaleError, UpscaleResult};
use std::path::PathBuf;
use std::time::Instant;

/// 任务终态
#[derive(Debug)]
pub enum JobOutcome {
    Completed(JobSummary),
    Failed(UpscaleError),
}

/// 升频任务描述
#[derive(Debug, Clone)]
pub struct UpscaleJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub config: UpscaleConfig,
}

impl UpscaleJob {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, config: UpscaleConfig) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            config,
        }
    }

    /// 执行任务并返回终态（失败时通知观察者）
    pub fn execute(
        &self,
        backend: &dyn ExecutionBackend,
        observer: &dyn PipelineObserver,
    ) -> JobOutcome {
        match self.run(backend, observer) {
            Ok(summary) => JobOutcome::Completed(summary),
            Err(e) => {
                observer.on_job_failed(&self.input, &e);
                JobOutcome::Failed(e)
            }
        }
    }

    /// 执行任务
    ///
    /// # 错误
    ///
    /// * `ConfigError` - 配置非法（在解码前返回）
    /// * `InputError` - 输入缺失或无法解码
    /// * `AlgorithmError` - 分块长度为0
    /// * `EncodeError` / `IoError` - 写出失败（输出路径上不会留下文件）
    pub fn run(
        &self,
        backend: &dyn ExecutionBackend,
        observer: &dyn PipelineObserver,
    ) -> UpscaleResult<JobSummary> {
        self.config.validate()?;
        let started = Instant::now();

        observer.on_stage(PipelineStage::Decoding);
        let buffer = AudioDecoder::new().decode(&self.input)?;
        observer.on_job_start(&JobInfo {
            input: self.input.clone(),
            output: self.output.clone(),
            channels: buffer.channel_count(),
            frames: buffer.frames(),
            sample_rate: buffer.sample_rate(),
            source_bitrate: buffer.source_bitrate(),
        });

        let upscaled = UpscalePipeline::new(self.config.clone()).run(&buffer, backend, observer)?;

        observer.on_stage(PipelineStage::Encoding);
        AudioEncoder::new(self.config.target_format).write(&upscaled, &self.output)?;

        let summary = JobSummary {
            input: self.input.clone(),
            output: self.output.clone(),
            upscale_factor: upscaled.upscale_factor,
            output_sample_rate: upscaled.sample_rate,
            output_frames: upscaled.frames(),
            silent_channels: upscaled.silent_channels,
            elapsed: started.elapsed(),
        };
        observer.on_job_complete(&summary);
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TargetFormat;
    use crate::processing::backend::SerialBackend;
    use crate::processing::observer::testing::RecordingObserver;
    use std::path::Path;

    fn config() -> UpscaleConfig {
        UpscaleConfig {
            max_iterations: 10,
            threshold: 0.6,
            target_bitrate_kbps: 1411,
            target_format: TargetFormat::Wav,
            worker_count: 2,
        }
    }

    fn write_fixture(path: &Path) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..400 {
            writer
                .write_sample(((i as f32 * 0.1).sin() * 12000.0) as i16)
                .unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_job_completes_and_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.wav");
        let output = dir.path().join("out").join("in.wav");
        write_fixture(&input);

        let observer = RecordingObserver::default();
        let summary = UpscaleJob::new(&input, &output, config())
            .run(&SerialBackend, &observer)
            .unwrap();

        // 8000 × 1 × 16 = 128 kbps → round(1411000 / 128000) = 11
        assert_eq!(summary.upscale_factor, 11);
        assert_eq!(summary.output_sample_rate, 88_000);
        assert_eq!(summary.output_frames, 4400);
        assert!(output.exists());
        assert_eq!(*observer.started.lock().unwrap(), 1);
        assert_eq!(*observer.completed.lock().unwrap(), 1);
    }

    #[test]
    fn test_config_error_before_decode() {
        let mut cfg = config();
        cfg.target_bitrate_kbps = 9000;
        let observer = RecordingObserver::default();
        let outcome = UpscaleJob::new("/no/such/file.wav", "/tmp/never.wav", cfg)
            .execute(&SerialBackend, &observer);

        assert!(matches!(
            outcome,
            JobOutcome::Failed(UpscaleError::ConfigError(_))
        ));
        assert!(observer.stages.lock().unwrap().is_empty());
        assert_eq!(*observer.failed.lock().unwrap(), 1);
    }

    #[test]
    fn test_missing_input_is_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.wav");
        let outcome = UpscaleJob::new(dir.path().join("missing.wav"), &output, config())
            .execute(&SerialBackend, &RecordingObserver::default());
        assert!(matches!(
            outcome,
            JobOutcome::Failed(UpscaleError::InputError(_))
        ));
        assert!(!output.exists());
    }
}
