//! 幅度归一化
//!
//! 两遍处理：
//! 1. 按原始（插值前）峰值缩放重建信号
//! 2. 除以新峰值，使幅度落在 [-1, 1]
//!
//! 峰值为0的声道原样透传并报告为静音声道。

/// 单声道峰值（绝对值最大）
#[inline]
pub fn peak_abs<T: Copy + Into<f64>>(samples: &[T]) -> f64 {
    samples
        .iter()
        .fold(0.0f64, |acc, &s| acc.max(s.into().abs()))
}

/// 两遍归一化器
#[derive(Debug, Default, Clone)]
pub struct AmplitudeNormalizer {
    silent_channels: Vec<usize>,
}

impl AmplitudeNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 第一遍：`x / reconstructed_peak * original_peak`
    pub fn rescale(&mut self, channel: usize, samples: &mut [f64], original_peak: f64) {
        let peak = peak_abs(samples);
        if peak == 0.0 {
            self.mark_silent(channel);
            return;
        }
        let gain = original_peak / peak;
        samples.iter_mut().for_each(|s| *s *= gain);
        if original_peak == 0.0 {
            self.mark_silent(channel);
        }
    }

    /// 第二遍：`x / peak`
    pub fn normalize(&mut self, channel: usize, samples: &mut [f64]) {
        let peak = peak_abs(samples);
        if peak == 0.0 {
            self.mark_silent(channel);
            return;
        }
        samples.iter_mut().for_each(|s| *s /= peak);
    }

    /// 对全部声道执行第一遍
    pub fn rescale_all(&mut self, channels: &mut [Vec<f64>], original_peaks: &[f64]) {
        debug_assert_eq!(channels.len(), original_peaks.len());
        for (index, (samples, &original)) in channels.iter_mut().zip(original_peaks).enumerate() {
            self.rescale(index, samples, original);
        }
    }

    /// 对全部声道执行第二遍
    pub fn normalize_all(&mut self, channels: &mut [Vec<f64>]) {
        for (index, samples) in channels.iter_mut().enumerate() {
            self.normalize(index, samples);
        }
    }

    fn mark_silent(&mut self, channel: usize) {
        if !self.silent_channels.contains(&channel) {
            self.silent_channels.push(channel);
            self.silent_channels.sort_unstable();
        }
    }

    /// 静音声道索引（升序）
    pub fn silent_channels(&self) -> &[usize] {
        &self.silent_channels
    }

    pub fn into_silent_channels(self) -> Vec<usize> {
        self.silent_channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peak_abs() {
        assert_eq!(peak_abs(&[0.2f32, -0.5, 0.4]), 0.5f32 as f64);
        assert_eq!(peak_abs::<f64>(&[]), 0.0);
    }

    #[test]
    fn test_two_pass_unit_peak() {
        let mut channels = vec![vec![0.1, -3.0, 1.5], vec![2.0, 0.5, -0.25]];
        let mut normalizer = AmplitudeNormalizer::new();
        normalizer.rescale_all(&mut channels, &[0.5, 0.8]);
        normalizer.normalize_all(&mut channels);

        for ch in &channels {
            assert!((peak_abs(ch) - 1.0).abs() < 1e-12);
            assert!(ch.iter().all(|s| (-1.0..=1.0).contains(s)));
        }
        assert!(normalizer.silent_channels().is_empty());
        // 比例关系保持不变
        assert!((channels[0][2] / channels[0][1] - (1.5 / -3.0)).abs() < 1e-12);
    }

    #[test]
    fn test_rescale_uses_original_peak() {
        let mut samples = vec![4.0, -2.0];
        let mut normalizer = AmplitudeNormalizer::new();
        normalizer.rescale(0, &mut samples, 0.5);
        assert_eq!(samples, vec![0.5, -0.25]);
    }

    #[test]
    fn test_silent_channel_passes_through() {
        let mut channels = vec![vec![0.0; 8], vec![0.3, -0.6]];
        let mut normalizer = AmplitudeNormalizer::new();
        normalizer.rescale_all(&mut channels, &[0.0, 0.6]);
        normalizer.normalize_all(&mut channels);

        assert_eq!(channels[0], vec![0.0; 8]);
        assert!(channels[0].iter().all(|s| s.is_finite()));
        assert_eq!(normalizer.silent_channels(), &[0]);
    }

    #[test]
    fn test_silent_original_zeroes_channel() {
        // 原始信号全零但重建信号非零：第一遍缩放为0，按静音处理
        let mut channels = vec![vec![0.2, -0.1]];
        let mut normalizer = AmplitudeNormalizer::new();
        normalizer.rescale_all(&mut channels, &[0.0]);
        normalizer.normalize_all(&mut channels);
        assert!(channels[0].iter().all(|&s| s == 0.0));
        assert_eq!(normalizer.into_silent_channels(), vec![0]);
    }
}
