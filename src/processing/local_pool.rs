//! 共享内存线程池后端
//!
//! 使用rayon线程池精确控制并发度，每轮提交全部分块后等待结果。

use super::backend::{ExecutionBackend, run_chunk_job};
use super::chunk::{ChunkJob, ChunkResult};
use crate::error::{UpscaleError, UpscaleResult};
use rayon::prelude::*;

/// 有界线程池（默认大小为宿主机核心数）
pub struct LocalPool {
    pool: rayon::ThreadPool,
    threads: usize,
}

impl LocalPool {
    pub fn new(threads: usize) -> UpscaleResult<Self> {
        let threads = threads.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("ist-pool-{i}"))
            .build()
            .map_err(|e| UpscaleError::ResourceError(format!("线程池创建失败: {e}")))?;
        Ok(Self { pool, threads })
    }
}

impl ExecutionBackend for LocalPool {
    fn name(&self) -> &'static str {
        "local"
    }

    fn parallelism(&self) -> usize {
        self.threads
    }

    fn execute(&self, jobs: Vec<ChunkJob>) -> UpscaleResult<Vec<ChunkResult>> {
        let mut results = self.pool.install(|| {
            jobs.into_par_iter()
                .map(run_chunk_job)
                .collect::<UpscaleResult<Vec<_>>>()
        })?;

        // 按索引排序后交回
        results.sort_by_key(|r| r.index);
        Ok(results)
    }
}
