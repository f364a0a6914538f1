//! Fat Llama 音频升频工具
//!
//! 零阶保持插值 + 迭代频谱阈值（IST）精炼 + 两遍幅度归一化。
//!
//! ## 核心特性
//! - 升频倍数：round(目标码率 / 源码率)，源码率未知时为4
//! - IST：每轮对各分块做 FFT → 频域硬阈值 → IFFT，固定迭代次数
//! - 分块并行：共享内存线程池或常驻worker（消息传递），结果按分块索引重组
//! - 24位 FLAC / WAV 输出，失败时不留下不完整文件

pub mod audio;
pub mod core;
pub mod error;
pub mod processing;
pub mod tools;

// 重新导出核心类型
pub use audio::{AudioBuffer, AudioDecoder, AudioEncoder, UpscaledAudio};
pub use core::{SpectralThresholder, TargetFormat, UpscaleConfig};
pub use error::{ErrorCategory, UpscaleError, UpscaleResult};
pub use processing::{
    BackendKind, ExecutionBackend, JobOutcome, PipelineObserver, TracingObserver, UpscaleJob,
    UpscalePipeline, create_backend,
};
