//! 核心算法模块
//!
//! 升频倍数计算、零阶保持插值、IST频谱阈值与幅度归一化。

pub mod config;
pub mod interpolator;
pub mod normalizer;
pub mod spectral;
pub mod upscale_factor;

// 重新导出公共接口
pub use config::{TargetFormat, UpscaleConfig};
pub use interpolator::zero_order_hold;
pub use normalizer::{AmplitudeNormalizer, peak_abs};
pub use spectral::{IterationState, SpectralKernel, SpectralThresholder};
pub use upscale_factor::{upscale_factor, validate_target_bitrate};
