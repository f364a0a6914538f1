//! 升频倍数计算
//!
//! factor = round(target_kbps·1000 / source_bps)，源码率未知时为4。
//! 舍入采用"四舍六入五成双"，结果至少为1。

use super::config::TargetFormat;
use crate::error::{UpscaleError, UpscaleResult};
use crate::tools::constants::upscale::DEFAULT_UPSCALE_FACTOR;

/// 校验目标码率是否落在格式的允许范围内
pub fn validate_target_bitrate(format: TargetFormat, target_bitrate_kbps: u32) -> UpscaleResult<()> {
    let (min, max) = format.bitrate_range_kbps();
    if (min..=max).contains(&target_bitrate_kbps) {
        Ok(())
    } else {
        Err(UpscaleError::ConfigError(format!(
            "{} 码率越界，请提供 {min} 到 {max} kbps 之间的值 / {} bitrate out of range, expected {min}..={max} kbps: {target_bitrate_kbps}",
            format.extension().to_uppercase(),
            format.extension().to_uppercase(),
        )))
    }
}

/// 计算升频倍数
///
/// `source_bitrate_bps` 为 `None` 或 0 时返回默认倍数4。
pub fn upscale_factor(
    source_bitrate_bps: Option<u32>,
    target_bitrate_kbps: u32,
    target_format: TargetFormat,
) -> UpscaleResult<u32> {
    validate_target_bitrate(target_format, target_bitrate_kbps)?;

    let source = match source_bitrate_bps {
        Some(bps) if bps > 0 => bps,
        _ => return Ok(DEFAULT_UPSCALE_FACTOR),
    };

    let ratio = (target_bitrate_kbps as f64 * 1000.0) / source as f64;
    let rounded = ratio.round_ties_even();

    Ok((rounded as u32).max(1))
}
