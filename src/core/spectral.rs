//! 迭代频谱阈值（IST）引擎
//!
//! 每轮对每个分块：FFT → 保留 |X| > threshold 的频点 → IFFT 取实部。
//! 分块只在自身的局部频谱上做阈值，这是对整段变换的近似，分块边界处的
//! 重建误差是预期行为。
//!
//! ## 执行模型
//!
//! ```text
//! expanded ─┬─ chunk 0 ─┐
//!           ├─ chunk 1 ─┤  backend.execute (一轮屏障)  ─→ ChunkArena ─→ 下一轮
//!           └─ remainder┘
//! ```

use crate::error::{UpscaleError, UpscaleResult};
use crate::processing::backend::ExecutionBackend;
use crate::processing::chunk::{ChunkArena, ChunkPartition};
use crate::processing::observer::PipelineObserver;
use rustfft::FftPlanner;
use rustfft::num_complex::Complex;
use std::cell::RefCell;

/// 硬阈值初始化：|x| > threshold 保留，否则置零
///
/// 仅用于整段参考路径的起点；分块路径直接从插值信号开始第一轮。
pub fn hard_threshold(samples: &[f64], threshold: f64) -> Vec<f64> {
    samples
        .iter()
        .map(|&x| if x.abs() > threshold { x } else { 0.0 })
        .collect()
}

/// 单块FFT阈值内核
///
/// 持有FFT规划器，同一长度的变换计划会被缓存复用。
pub struct SpectralKernel {
    planner: FftPlanner<f64>,
}

impl Default for SpectralKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectralKernel {
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
        }
    }

    /// 对一个分块执行一轮 FFT → 频域阈值 → IFFT
    ///
    /// # 错误
    ///
    /// * `UpscaleError::AlgorithmError` - 分块长度为0
    pub fn refine_chunk(&mut self, samples: &[f64], threshold: f64) -> UpscaleResult<Vec<f64>> {
        let n = samples.len();
        if n == 0 {
            return Err(UpscaleError::AlgorithmError(
                "无效的变换点数 / invalid number of transform points: 0".to_string(),
            ));
        }

        let forward = self.planner.plan_fft_forward(n);
        let inverse = self.planner.plan_fft_inverse(n);

        let mut spectrum: Vec<Complex<f64>> =
            samples.iter().map(|&x| Complex::new(x, 0.0)).collect();
        forward.process(&mut spectrum);

        for bin in spectrum.iter_mut() {
            if bin.norm() <= threshold {
                *bin = Complex::new(0.0, 0.0);
            }
        }

        inverse.process(&mut spectrum);

        // rustfft 不做归一化
        let scale = 1.0 / n as f64;
        Ok(spectrum.iter().map(|c| c.re * scale).collect())
    }
}

thread_local! {
    static THREAD_KERNEL: RefCell<SpectralKernel> = RefCell::new(SpectralKernel::new());
}

/// 使用当前线程的内核处理分块（供线程池共享）
pub fn refine_chunk_on_thread(samples: &[f64], threshold: f64) -> UpscaleResult<Vec<f64>> {
    THREAD_KERNEL.with(|kernel| kernel.borrow_mut().refine_chunk(samples, threshold))
}

/// 声道的迭代状态：只有完成一整轮扇入后才被替换
#[derive(Debug, Clone, PartialEq)]
pub struct IterationState {
    values: Vec<f64>,
}

impl IterationState {
    pub fn from_samples(samples: &[f32]) -> Self {
        Self {
            values: samples.iter().map(|&s| s as f64).collect(),
        }
    }

    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    fn advance(&mut self, values: Vec<f64>) {
        debug_assert_eq!(values.len(), self.values.len());
        self.values = values;
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }
}

/// IST引擎
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralThresholder {
    max_iterations: u32,
    threshold: f64,
    chunk_count: usize,
}

impl SpectralThresholder {
    pub fn new(max_iterations: u32, threshold: f64, chunk_count: usize) -> Self {
        Self {
            max_iterations,
            threshold,
            chunk_count: chunk_count.max(1),
        }
    }

    pub fn from_config(config: &crate::core::UpscaleConfig) -> Self {
        Self::new(config.max_iterations, config.threshold, config.worker_count)
    }

    #[inline]
    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// 该声道长度下使用的分块划分（每轮相同）
    pub fn partition_for(&self, len: usize) -> ChunkPartition {
        ChunkPartition::new(len, self.chunk_count)
    }

    /// 分块并行精炼，返回 `ist_changes`
    ///
    /// 每轮都是一次完整屏障：所有分块完成第 i 轮后才开始第 i+1 轮。
    /// 任一分块失败立即终止（不重试）。`max_iterations == 0` 时原样返回输入。
    pub fn refine(
        &self,
        channel: usize,
        expanded: &[f32],
        backend: &dyn ExecutionBackend,
        observer: &dyn PipelineObserver,
    ) -> UpscaleResult<Vec<f64>> {
        let partition = self.partition_for(expanded.len());
        let mut state = IterationState::from_samples(expanded);

        for iteration in 1..=self.max_iterations {
            let jobs = partition.split(state.values(), self.threshold);
            let results = backend.execute(jobs)?;
            let values = ChunkArena::collect(partition, results)?.reassemble()?;
            state.advance(values);
            observer.on_iteration(channel, iteration, self.max_iterations);
        }

        Ok(state.into_values())
    }

    /// 整段参考路径：先硬阈值初始化，再对整个声道做变换（不分块、不并行）
    pub fn refine_reference(&self, expanded: &[f32]) -> UpscaleResult<Vec<f64>> {
        let seed: Vec<f64> = expanded.iter().map(|&s| s as f64).collect();
        let mut values = hard_threshold(&seed, self.threshold);
        let mut kernel = SpectralKernel::new();
        for _ in 0..self.max_iterations {
            values = kernel.refine_chunk(&values, self.threshold)?;
        }
        Ok(values)
    }
}
