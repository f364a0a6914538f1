//! 分块划分与有序重组
//!
//! 同一声道在所有迭代中使用完全相同的分块边界；
//! 重组严格按分块索引排序，与完成顺序无关。

use crate::error::{UpscaleError, UpscaleResult};
use std::ops::Range;

/// 单个分块任务（一次迭代内独占自己的缓冲区）
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkJob {
    /// 分块在划分中的位置（不是样本偏移）
    pub index: usize,
    /// 是否为尾部余数块
    pub is_remainder: bool,
    pub samples: Vec<f64>,
    pub threshold: f64,
}

/// 分块任务结果
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkResult {
    pub index: usize,
    pub samples: Vec<f64>,
}

/// 声道分块划分
///
/// `chunk_count` 个等长块（`len / chunk_count`），余数样本组成尾部块单独处理。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPartition {
    total_len: usize,
    chunk_len: usize,
    full_chunks: usize,
    remainder_len: usize,
}

impl ChunkPartition {
    pub fn new(total_len: usize, chunk_count: usize) -> Self {
        let full_chunks = chunk_count.max(1);
        let chunk_len = total_len / full_chunks;
        Self {
            total_len,
            chunk_len,
            full_chunks,
            remainder_len: total_len - chunk_len * full_chunks,
        }
    }

    #[inline]
    pub fn total_len(&self) -> usize {
        self.total_len
    }

    #[inline]
    pub fn chunk_len(&self) -> usize {
        self.chunk_len
    }

    #[inline]
    pub fn remainder_len(&self) -> usize {
        self.remainder_len
    }

    /// 分块总数（含余数块）
    #[inline]
    pub fn chunk_count(&self) -> usize {
        self.full_chunks + usize::from(self.remainder_len > 0)
    }

    /// 第 `index` 块的样本范围
    pub fn range(&self, index: usize) -> Option<Range<usize>> {
        if index < self.full_chunks {
            let start = index * self.chunk_len;
            Some(start..start + self.chunk_len)
        } else if index == self.full_chunks && self.remainder_len > 0 {
            let start = self.full_chunks * self.chunk_len;
            Some(start..self.total_len)
        } else {
            None
        }
    }

    /// 按划分切出本轮的分块任务（拷贝，保证每块独占缓冲区）
    pub fn split(&self, values: &[f64], threshold: f64) -> Vec<ChunkJob> {
        debug_assert_eq!(values.len(), self.total_len);
        (0..self.chunk_count())
            .filter_map(|index| {
                self.range(index).map(|range| ChunkJob {
                    index,
                    is_remainder: index >= self.full_chunks,
                    samples: values[range].to_vec(),
                    threshold,
                })
            })
            .collect()
    }
}

/// 按索引存放分块结果的容器（arena + index）
#[derive(Debug)]
pub struct ChunkArena {
    partition: ChunkPartition,
    slots: Vec<Option<Vec<f64>>>,
}

impl ChunkArena {
    pub fn new(partition: ChunkPartition) -> Self {
        Self {
            partition,
            slots: vec![None; partition.chunk_count()],
        }
    }

    /// 一次性收集一轮的全部结果
    pub fn collect(
        partition: ChunkPartition,
        results: impl IntoIterator<Item = ChunkResult>,
    ) -> UpscaleResult<Self> {
        let mut arena = Self::new(partition);
        for result in results {
            arena.insert(result)?;
        }
        Ok(arena)
    }

    /// 放入单个结果，拒绝未知索引、重复索引和长度不符的块
    pub fn insert(&mut self, result: ChunkResult) -> UpscaleResult<()> {
        let expected = self.partition.range(result.index).ok_or_else(|| {
            UpscaleError::ResourceError(format!("未知的分块索引 / unknown chunk index {}", result.index))
        })?;

        if result.samples.len() != expected.len() {
            return Err(UpscaleError::ResourceError(format!(
                "分块 {} 长度不符 / chunk length mismatch: expected {}, got {}",
                result.index,
                expected.len(),
                result.samples.len()
            )));
        }

        let slot = &mut self.slots[result.index];
        if slot.is_some() {
            return Err(UpscaleError::ResourceError(format!(
                "分块 {} 重复提交 / duplicate chunk result",
                result.index
            )));
        }
        *slot = Some(result.samples);
        Ok(())
    }

    /// 按索引顺序拼接为完整声道
    pub fn reassemble(self) -> UpscaleResult<Vec<f64>> {
        let mut values = Vec::with_capacity(self.partition.total_len());
        for (index, slot) in self.slots.into_iter().enumerate() {
            let samples = slot.ok_or_else(|| {
                UpscaleError::ResourceError(format!("分块 {index} 缺失 / missing chunk result"))
            })?;
            values.extend_from_slice(&samples);
        }
        Ok(values)
    }
}
