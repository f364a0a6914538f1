//! 分布式worker后端（分发/收集）
//!
//! 协调者把等长分块分发给常驻worker，worker之间不共享任何状态，只通过消息通道通信。
//! worker循环接收任务，直到收到显式的 `Shutdown` 消息才退出，因此可以跨多个文件复用。
//!
//! ```text
//! coordinator ──Job(idx % n)──▶ worker[k] ──Reply(idx)──▶ 本轮回复通道 ──▶ gather
//!      │                                                               │
//!      └──────────── 余数块在 gather 完成后由协调者本地处理 ◀─────────────┘
//! ```

use super::backend::{ExecutionBackend, run_chunk_job};
use super::chunk::{ChunkJob, ChunkResult};
use crate::core::spectral::SpectralKernel;
use crate::error::{UpscaleError, UpscaleResult};
use crossbeam_channel::{Receiver, Sender};
use std::thread::JoinHandle;

/// 协调者 → worker 的消息
#[derive(Debug)]
pub enum WorkerMessage {
    /// 单个分块任务，附带本轮的回复通道
    Job {
        job: ChunkJob,
        reply: Sender<WorkerReply>,
    },
    /// 显式关闭信号
    Shutdown,
}

/// worker → 协调者 的回复
#[derive(Debug)]
pub struct WorkerReply {
    pub worker_id: usize,
    pub index: usize,
    pub outcome: UpscaleResult<Vec<f64>>,
}

/// 常驻worker集合
pub struct DistributedWorkers {
    senders: Vec<Sender<WorkerMessage>>,
    handles: Vec<JoinHandle<()>>,
}

impl DistributedWorkers {
    /// 启动 `workers` 个常驻worker
    pub fn spawn(workers: usize) -> UpscaleResult<Self> {
        let workers = workers.max(1);
        let mut senders = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);

        for worker_id in 0..workers {
            let (tx, rx) = crossbeam_channel::unbounded();
            let handle = std::thread::Builder::new()
                .name(format!("ist-worker-{worker_id}"))
                .spawn(move || worker_loop(worker_id, rx))
                .map_err(|e| UpscaleError::ResourceError(format!("worker启动失败: {e}")))?;
            senders.push(tx);
            handles.push(handle);
        }

        tracing::debug!(workers, "分布式worker已启动 / distributed workers started");
        Ok(Self { senders, handles })
    }

    #[inline]
    pub fn worker_count(&self) -> usize {
        self.senders.len()
    }

    /// 向所有worker发送关闭信号并等待退出
    pub fn shutdown(mut self) {
        self.stop_workers();
    }

    fn stop_workers(&mut self) {
        for sender in &self.senders {
            // worker已退出时发送失败，忽略即可
            let _ = sender.send(WorkerMessage::Shutdown);
        }
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                tracing::warn!("worker线程异常退出 / worker thread panicked");
            }
        }
    }
}

impl Drop for DistributedWorkers {
    fn drop(&mut self) {
        self.stop_workers();
    }
}

impl ExecutionBackend for DistributedWorkers {
    fn name(&self) -> &'static str {
        "distributed"
    }

    fn parallelism(&self) -> usize {
        self.worker_count()
    }

    fn execute(&self, jobs: Vec<ChunkJob>) -> UpscaleResult<Vec<ChunkResult>> {
        let (reply_tx, reply_rx) = crossbeam_channel::unbounded();
        let mut remainder = Vec::new();
        let mut dispatched = 0usize;

        // scatter
        for job in jobs {
            if job.is_remainder {
                remainder.push(job);
                continue;
            }
            let worker_id = job.index % self.senders.len();
            self.senders[worker_id]
                .send(WorkerMessage::Job {
                    job,
                    reply: reply_tx.clone(),
                })
                .map_err(|_| {
                    UpscaleError::ResourceError(format!(
                        "worker {worker_id} 已断开 / worker disconnected"
                    ))
                })?;
            dispatched += 1;
        }
        drop(reply_tx);

        // gather：收齐本轮全部回复后再判定失败，错误取索引最小者
        let mut results = Vec::with_capacity(dispatched + remainder.len());
        let mut first_error: Option<(usize, UpscaleError)> = None;
        for _ in 0..dispatched {
            let reply = reply_rx.recv().map_err(|_| {
                UpscaleError::ResourceError(
                    "worker在迭代中途断开 / worker disconnected mid-iteration".to_string(),
                )
            })?;
            match reply.outcome {
                Ok(samples) => results.push(ChunkResult {
                    index: reply.index,
                    samples,
                }),
                Err(e) => {
                    tracing::debug!(
                        worker = reply.worker_id,
                        index = reply.index,
                        "分块失败 / chunk failed"
                    );
                    if first_error.as_ref().is_none_or(|(idx, _)| reply.index < *idx) {
                        first_error = Some((reply.index, e));
                    }
                }
            }
        }
        if let Some((_, e)) = first_error {
            return Err(e);
        }

        // 余数块由协调者本地处理
        for job in remainder {
            results.push(run_chunk_job(job)?);
        }

        Ok(results)
    }
}

/// worker主循环：收到 `Shutdown` 或通道关闭时退出
fn worker_loop(worker_id: usize, rx: Receiver<WorkerMessage>) {
    let mut kernel = SpectralKernel::new();
    while let Ok(message) = rx.recv() {
        match message {
            WorkerMessage::Job { job, reply } => {
                let outcome = kernel.refine_chunk(&job.samples, job.threshold);
                // 协调者已放弃本轮时回复失败，忽略
                let _ = reply.send(WorkerReply {
                    worker_id,
                    index: job.index,
                    outcome,
                });
            }
            WorkerMessage::Shutdown => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::backend::SerialBackend;
    use crate::processing::chunk::{ChunkArena, ChunkPartition};

    fn signal(len: usize) -> Vec<f64> {
        (0..len).map(|i| ((i as f64) * 0.021).sin() * 0.9).collect()
    }

    #[test]
    fn test_scatter_gather_matches_serial() {
        let values = signal(1003);
        let partition = ChunkPartition::new(values.len(), 4);
        let workers = DistributedWorkers::spawn(4).unwrap();

        let distributed = workers.execute(partition.split(&values, 0.6)).unwrap();
        let serial = SerialBackend.execute(partition.split(&values, 0.6)).unwrap();

        let a = ChunkArena::collect(partition, distributed).unwrap().reassemble().unwrap();
        let b = ChunkArena::collect(partition, serial).unwrap().reassemble().unwrap();
        assert_eq!(a, b);
        workers.shutdown();
    }

    #[test]
    fn test_fewer_workers_than_chunks() {
        let values = signal(800);
        let partition = ChunkPartition::new(values.len(), 8);
        let workers = DistributedWorkers::spawn(3).unwrap();
        let results = workers.execute(partition.split(&values, 0.6)).unwrap();
        assert_eq!(results.len(), 8);
    }

    #[test]
    fn test_workers_survive_across_rounds() {
        let workers = DistributedWorkers::spawn(2).unwrap();
        let partition = ChunkPartition::new(64, 2);
        let mut values = signal(64);
        for _ in 0..5 {
            let results = workers.execute(partition.split(&values, 0.3)).unwrap();
            values = ChunkArena::collect(partition, results).unwrap().reassemble().unwrap();
        }
        assert_eq!(values.len(), 64);
        assert_eq!(workers.worker_count(), 2);
    }

    #[test]
    fn test_chunk_error_is_reported_and_workers_stay_usable() {
        let workers = DistributedWorkers::spawn(2).unwrap();
        let bad = ChunkPartition::new(1, 2);
        assert!(matches!(
            workers.execute(bad.split(&[0.4], 0.6)),
            Err(UpscaleError::AlgorithmError(_))
        ));

        let good = ChunkPartition::new(16, 2);
        assert!(workers.execute(good.split(&signal(16), 0.6)).is_ok());
    }

    #[test]
    fn test_shutdown_joins_workers() {
        let workers = DistributedWorkers::spawn(3).unwrap();
        workers.shutdown();
    }
}
