//! 音频缓冲区
//!
//! 解码后以声道为单位（planar）存放样本，声道之间不共享任何状态。

use crate::error::{UpscaleError, UpscaleResult};
use crate::tools::constants::upscale::OUTPUT_BITS_PER_SAMPLE;

/// 解码后的PCM音频
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
    /// 源码率（bits/s），精确值或估算值；未知时为 `None`
    source_bitrate: Option<u32>,
}

impl AudioBuffer {
    /// 从声道数据创建缓冲区
    ///
    /// # 错误
    ///
    /// * 无声道、采样率为0、各声道长度不一致时返回 `InputError`
    pub fn new(
        channels: Vec<Vec<f32>>,
        sample_rate: u32,
        source_bitrate: Option<u32>,
    ) -> UpscaleResult<Self> {
        if channels.is_empty() {
            return Err(UpscaleError::InputError("声道数不能为0".to_string()));
        }
        if sample_rate == 0 {
            return Err(UpscaleError::InputError("采样率不能为0".to_string()));
        }
        let frames = channels[0].len();
        if let Some(bad) = channels.iter().position(|ch| ch.len() != frames) {
            return Err(UpscaleError::InputError(format!(
                "声道长度不一致: 声道0={frames}, 声道{bad}={}",
                channels[bad].len()
            )));
        }
        Ok(Self {
            channels,
            sample_rate,
            source_bitrate,
        })
    }

    /// 从交错样本拆分声道
    pub fn from_interleaved(
        interleaved: &[f32],
        channel_count: usize,
        sample_rate: u32,
        source_bitrate: Option<u32>,
    ) -> UpscaleResult<Self> {
        if channel_count == 0 {
            return Err(UpscaleError::InputError("声道数不能为0".to_string()));
        }
        if interleaved.len() % channel_count != 0 {
            return Err(UpscaleError::InputError(format!(
                "交错样本数 {} 不是声道数 {channel_count} 的整数倍",
                interleaved.len()
            )));
        }
        let frames = interleaved.len() / channel_count;
        let mut channels = vec![Vec::with_capacity(frames); channel_count];
        for frame in interleaved.chunks_exact(channel_count) {
            for (ch, &sample) in frame.iter().enumerate() {
                channels[ch].push(sample);
            }
        }
        Self::new(channels, sample_rate, source_bitrate)
    }

    #[inline]
    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    #[inline]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// 每声道样本数
    #[inline]
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn source_bitrate(&self) -> Option<u32> {
        self.source_bitrate
    }
}

/// 升频结果（已归一化）
#[derive(Debug, Clone, PartialEq)]
pub struct UpscaledAudio {
    pub channels: Vec<Vec<f64>>,
    pub sample_rate: u32,
    pub upscale_factor: u32,
    /// 静音声道索引（原样透传）
    pub silent_channels: Vec<usize>,
}

impl UpscaledAudio {
    #[inline]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    #[inline]
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    /// 转换为交错的24位整数样本（超出 [-1, 1] 的值先截断）
    pub fn to_interleaved_i24(&self) -> Vec<i32> {
        let scale = ((1i32 << (OUTPUT_BITS_PER_SAMPLE - 1)) - 1) as f64;
        let frames = self.frames();
        let mut out = Vec::with_capacity(frames * self.channel_count());
        for frame in 0..frames {
            for channel in &self.channels {
                out.push((channel[frame].clamp(-1.0, 1.0) * scale).round() as i32);
            }
        }
        out
    }
}
