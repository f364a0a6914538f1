//! 零阶保持插值
//!
//! 每个输入样本原样重复 `factor` 次，不做任何带限滤波。
//! 新增的高频成分交给后续的频谱阈值阶段塑形。

/// 零阶保持扩展单个声道
///
/// 输出长度严格等于 `samples.len() * factor`。
pub fn zero_order_hold(samples: &[f32], factor: u32) -> Vec<f32> {
    let factor = factor as usize;
    let mut expanded = Vec::with_capacity(samples.len() * factor);
    for &sample in samples {
        expanded.extend(std::iter::repeat_n(sample, factor));
    }
    expanded
}
