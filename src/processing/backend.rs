//! 并行执行后端
//!
//! 一次 `execute` 调用对应一轮迭代的扇出/扇入：阻塞直到本轮全部分块完成，
//! 任一分块失败则整轮失败。结果可以乱序返回，由 `ChunkArena` 按索引重组。

use super::chunk::{ChunkJob, ChunkResult};
use super::distributed::DistributedWorkers;
use super::local_pool::LocalPool;
use crate::core::spectral::refine_chunk_on_thread;
use crate::error::{UpscaleError, UpscaleResult};
use std::fmt;
use std::str::FromStr;

/// 分块执行能力接口
pub trait ExecutionBackend: Send + Sync {
    /// 后端名称（用于日志）
    fn name(&self) -> &'static str;

    /// 实际并发度
    fn parallelism(&self) -> usize;

    /// 执行一轮分块任务并返回全部结果
    fn execute(&self, jobs: Vec<ChunkJob>) -> UpscaleResult<Vec<ChunkResult>>;
}

/// 在调用线程上逐个执行（参考实现，也用于单核环境）
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialBackend;

impl ExecutionBackend for SerialBackend {
    fn name(&self) -> &'static str {
        "serial"
    }

    fn parallelism(&self) -> usize {
        1
    }

    fn execute(&self, jobs: Vec<ChunkJob>) -> UpscaleResult<Vec<ChunkResult>> {
        jobs.into_iter().map(run_chunk_job).collect()
    }
}

/// 在当前线程执行单个分块任务
#[inline]
pub(crate) fn run_chunk_job(job: ChunkJob) -> UpscaleResult<ChunkResult> {
    let samples = refine_chunk_on_thread(&job.samples, job.threshold)?;
    Ok(ChunkResult {
        index: job.index,
        samples,
    })
}

/// 后端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// 共享内存线程池
    #[default]
    Local,
    /// 常驻worker + 消息传递的分发/收集
    Distributed,
    /// 单线程
    Serial,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Local => "local",
            BackendKind::Distributed => "distributed",
            BackendKind::Serial => "serial",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = UpscaleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" | "pool" => Ok(BackendKind::Local),
            "distributed" | "workers" => Ok(BackendKind::Distributed),
            "serial" => Ok(BackendKind::Serial),
            other => Err(UpscaleError::ConfigError(format!(
                "未知的执行后端 / unknown backend: {other}"
            ))),
        }
    }
}

/// 创建后端实例（进程内可跨多个任务复用）
pub fn create_backend(
    kind: BackendKind,
    workers: usize,
) -> UpscaleResult<Box<dyn ExecutionBackend>> {
    Ok(match kind {
        BackendKind::Local => Box::new(LocalPool::new(workers)?),
        BackendKind::Distributed => Box::new(DistributedWorkers::spawn(workers)?),
        BackendKind::Serial => Box::new(SerialBackend),
    })
}
