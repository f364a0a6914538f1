//! 处理层
//!
//! 分块划分与重组、并行执行后端（线程池/常驻worker）、观察者、
//! 升频流水线与单文件任务。

pub mod backend;
pub mod chunk;
pub mod distributed;
pub mod job;
pub mod local_pool;
pub mod observer;
pub mod pipeline;

// 重新导出公共接口
pub use backend::{BackendKind, ExecutionBackend, SerialBackend, create_backend};
pub use chunk::{ChunkArena, ChunkJob, ChunkPartition, ChunkResult};
pub use distributed::DistributedWorkers;
pub use job::{JobOutcome, UpscaleJob};
pub use local_pool::LocalPool;
pub use observer::{
    JobInfo, JobSummary, NullObserver, PipelineObserver, PipelineStage, TracingObserver,
};
pub use pipeline::{ChannelPipeline, UpscalePipeline};
