//! 升频任务配置
//!
//! `UpscaleConfig` 在单个任务期间不可变，进入流水线前统一校验。

use crate::error::{UpscaleError, UpscaleResult};
use crate::tools::constants::{defaults, limits, upscale};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 目标输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    Flac,
    Wav,
}

impl TargetFormat {
    /// 该格式允许的目标码率范围（kbps，闭区间）
    pub fn bitrate_range_kbps(&self) -> (u32, u32) {
        match self {
            TargetFormat::Flac => upscale::FLAC_BITRATE_RANGE_KBPS,
            TargetFormat::Wav => upscale::WAV_BITRATE_RANGE_KBPS,
        }
    }

    /// 输出文件扩展名
    pub fn extension(&self) -> &'static str {
        match self {
            TargetFormat::Flac => "flac",
            TargetFormat::Wav => "wav",
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for TargetFormat {
    type Err = UpscaleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "flac" => Ok(TargetFormat::Flac),
            "wav" => Ok(TargetFormat::Wav),
            other => Err(UpscaleError::ConfigError(format!(
                "不支持的目标格式 / unsupported target format: {other}"
            ))),
        }
    }
}

/// 升频任务配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpscaleConfig {
    /// IST迭代次数，范围 [10, 1000]
    pub max_iterations: u32,
    /// 频谱阈值，范围 (0.1, 1.0]
    pub threshold: f64,
    /// 目标码率（kbps），范围取决于目标格式
    pub target_bitrate_kbps: u32,
    pub target_format: TargetFormat,
    /// 每个声道的分块数（同时决定本地线程池大小），至少为1
    pub worker_count: usize,
}

impl Default for UpscaleConfig {
    fn default() -> Self {
        Self {
            max_iterations: defaults::MAX_ITERATIONS,
            threshold: defaults::THRESHOLD,
            target_bitrate_kbps: defaults::TARGET_BITRATE_KBPS,
            target_format: TargetFormat::Flac,
            worker_count: crate::tools::constants::host_core_count(),
        }
    }
}

impl UpscaleConfig {
    /// 从原始字符串格式构建配置（格式非法时立即失败，早于任何解码工作）
    pub fn from_parts(
        max_iterations: u32,
        threshold: f64,
        target_bitrate_kbps: u32,
        target_format: &str,
        worker_count: usize,
    ) -> UpscaleResult<Self> {
        let config = Self {
            max_iterations,
            threshold,
            target_bitrate_kbps,
            target_format: target_format.parse()?,
            worker_count,
        };
        config.validate()?;
        Ok(config)
    }

    /// 校验全部配置项
    pub fn validate(&self) -> UpscaleResult<()> {
        if !(limits::MIN_ITERATIONS..=limits::MAX_ITERATIONS).contains(&self.max_iterations) {
            return Err(UpscaleError::ConfigError(format!(
                "迭代次数必须在 {} 到 {} 之间 / iterations must be between {} and {}: {}",
                limits::MIN_ITERATIONS,
                limits::MAX_ITERATIONS,
                limits::MIN_ITERATIONS,
                limits::MAX_ITERATIONS,
                self.max_iterations
            )));
        }

        if !self.threshold.is_finite()
            || self.threshold <= limits::MIN_THRESHOLD_EXCLUSIVE
            || self.threshold > limits::MAX_THRESHOLD
        {
            return Err(UpscaleError::ConfigError(format!(
                "阈值必须在 (0.1, 1.0] 范围内 / threshold must be in (0.1, 1.0]: {}",
                self.threshold
            )));
        }

        if self.worker_count < limits::MIN_WORKERS {
            return Err(UpscaleError::ConfigError(
                "worker数量必须至少为1 / worker_count must be >= 1".to_string(),
            ));
        }

        super::upscale_factor::validate_target_bitrate(
            self.target_format,
            self.target_bitrate_kbps,
        )
    }
}
