//! 常量和默认配置集中管理
//!
//! 将所有重要常量集中定义，避免"默认值漂移"和重复定义

/// 升频算法常量
pub mod upscale {
    /// 源码率缺失时的默认升频倍数
    pub const DEFAULT_UPSCALE_FACTOR: u32 = 4;

    /// FLAC目标码率范围（kbps，闭区间）
    pub const FLAC_BITRATE_RANGE_KBPS: (u32, u32) = (800, 1411);

    /// WAV目标码率范围（kbps，闭区间）
    pub const WAV_BITRATE_RANGE_KBPS: (u32, u32) = (800, 6444);

    /// 输出PCM位深（FLAC与WAV统一使用24位整数）
    pub const OUTPUT_BITS_PER_SAMPLE: u16 = 24;
}

/// 默认配置值
pub mod defaults {
    /// 默认IST迭代次数
    pub const MAX_ITERATIONS: u32 = 800;

    /// 默认频谱阈值
    pub const THRESHOLD: f64 = 0.6;

    /// 默认目标码率（kbps）
    pub const TARGET_BITRATE_KBPS: u32 = 1411;

    /// 默认输出格式
    pub const TARGET_FORMAT: &str = "flac";

    /// FLAC编码块大小
    pub const FLAC_BLOCK_SIZE: usize = 4096;
}

/// 配置取值边界
pub mod limits {
    /// 最小迭代次数
    pub const MIN_ITERATIONS: u32 = 10;

    /// 最大迭代次数
    pub const MAX_ITERATIONS: u32 = 1000;

    /// 阈值下界（开区间）
    pub const MIN_THRESHOLD_EXCLUSIVE: f64 = 0.1;

    /// 阈值上界（闭区间）
    pub const MAX_THRESHOLD: f64 = 1.0;

    /// 最小worker数
    pub const MIN_WORKERS: usize = 1;
}

/// 并发度限制常量
pub mod parallel_limits {
    /// 最小并发度
    pub const MIN_PARALLEL_DEGREE: usize = 1;

    /// 文件级最大并发度
    ///
    /// 每个文件内部已经按分块并行，文件级并发过高只会放大内存占用
    pub const MAX_PARALLEL_DEGREE: usize = 16;
}

/// 宿主机可用核心数（获取失败时回退为1）
pub fn host_core_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(parallel_limits::MIN_PARALLEL_DEGREE)
}
