//! 批处理状态管理模块
//!
//! 提供统一的批处理统计管理，支持串行和并行两种模式。

use crate::error::ErrorCategory;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// 批处理统计快照
///
/// 包含处理成功/失败计数和错误分类统计
#[derive(Debug, Clone, Default)]
pub struct BatchStatsSnapshot {
    /// 成功处理的文件数
    pub processed: usize,
    /// 失败的文件数
    pub failed: usize,
    /// 错误分类统计（错误类型 -> 失败文件列表）
    pub error_stats: HashMap<ErrorCategory, Vec<String>>,
    /// 第一个失败文件的错误类别（按输入顺序）
    pub first_failure: Option<ErrorCategory>,
}

impl BatchStatsSnapshot {
    #[inline]
    pub fn total(&self) -> usize {
        self.processed + self.failed
    }

    /// 全部失败时返回第一个失败类别，否则为 `None`
    pub fn all_failed_category(&self) -> Option<ErrorCategory> {
        if self.processed == 0 && self.failed > 0 {
            self.first_failure
        } else {
            None
        }
    }
}

/// 串行批处理统计（单线程安全）
#[derive(Debug, Default)]
pub struct SerialBatchStats {
    processed: usize,
    failed: usize,
    error_stats: HashMap<ErrorCategory, Vec<String>>,
    first_failure: Option<ErrorCategory>,
}

impl SerialBatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// 增加成功处理计数
    #[inline]
    pub fn inc_processed(&mut self) -> usize {
        self.processed += 1;
        self.processed
    }

    /// 增加失败计数并记录错误分类
    #[inline]
    pub fn inc_failed(&mut self, category: ErrorCategory, filename: String) -> usize {
        self.failed += 1;
        self.first_failure.get_or_insert(category);
        self.error_stats.entry(category).or_default().push(filename);
        self.failed
    }

    /// 获取统计快照
    pub fn snapshot(&self) -> BatchStatsSnapshot {
        BatchStatsSnapshot {
            processed: self.processed,
            failed: self.failed,
            error_stats: self.error_stats.clone(),
            first_failure: self.first_failure,
        }
    }
}

/// 并行批处理统计（多线程安全）
///
/// 失败记录带输入索引，快照时按索引确定"第一个"失败，与完成顺序无关。
#[derive(Debug, Clone, Default)]
pub struct ParallelBatchStats {
    processed: Arc<AtomicUsize>,
    failed: Arc<AtomicUsize>,
    failures: Arc<Mutex<Vec<(usize, ErrorCategory, String)>>>,
}

impl ParallelBatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// 增加成功处理计数（线程安全）
    #[inline]
    pub fn inc_processed(&self) -> usize {
        self.processed.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// 增加失败计数并记录错误分类（线程安全）
    pub fn inc_failed(&self, index: usize, category: ErrorCategory, filename: String) -> usize {
        let count = self.failed.fetch_add(1, Ordering::Relaxed) + 1;
        if let Ok(mut failures) = self.failures.lock() {
            failures.push((index, category, filename));
        }
        count
    }

    /// 获取统计快照（线程安全）
    pub fn snapshot(&self) -> BatchStatsSnapshot {
        let mut failures = self
            .failures
            .lock()
            .map(|f| f.clone())
            .unwrap_or_default();
        failures.sort_by_key(|(index, _, _)| *index);

        let mut error_stats: HashMap<ErrorCategory, Vec<String>> = HashMap::new();
        for (_, category, filename) in &failures {
            error_stats.entry(*category).or_default().push(filename.clone());
        }

        BatchStatsSnapshot {
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            error_stats,
            first_failure: failures.first().map(|(_, category, _)| *category),
        }
    }
}
