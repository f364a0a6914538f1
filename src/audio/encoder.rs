//! 音频编码适配器
//!
//! 输出24位整数PCM：FLAC使用flacenc，WAV使用hound。
//! 先写入同目录下的 `*.partial` 临时文件，成功后再重命名为最终路径；
//! 任何失败都会删除临时文件，输出路径上不会留下不完整的文件。

use super::buffer::UpscaledAudio;
use crate::core::TargetFormat;
use crate::error::{UpscaleError, UpscaleResult, encode_error};
use crate::tools::constants::{defaults, upscale::OUTPUT_BITS_PER_SAMPLE};
use flacenc::bitsink::ByteSink;
use flacenc::component::{BitRepr, Stream, StreamInfo};
use flacenc::config::Encoder as EncoderConfig;
use flacenc::constant::MIN_BLOCK_SIZE;
use flacenc::encode_fixed_size_frame;
use flacenc::error::Verify;
use flacenc::source::{Context, Fill, FrameBuf};
use std::fs;
use std::path::{Path, PathBuf};

/// 临时文件后缀
pub const PARTIAL_SUFFIX: &str = "partial";

/// 输出路径对应的临时文件路径（`song.flac` → `song.flac.partial`）
pub fn partial_path(output: &Path) -> PathBuf {
    let mut name = output.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(PARTIAL_SUFFIX);
    output.with_file_name(name)
}

/// 文件编码器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioEncoder {
    format: TargetFormat,
}

impl AudioEncoder {
    pub fn new(format: TargetFormat) -> Self {
        Self { format }
    }

    #[inline]
    pub fn format(&self) -> TargetFormat {
        self.format
    }

    /// 编码并原子写出到 `output`
    pub fn write(&self, audio: &UpscaledAudio, output: &Path) -> UpscaleResult<()> {
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let partial = partial_path(output);
        let result = self
            .write_to(audio, &partial)
            .and_then(|()| fs::rename(&partial, output).map_err(UpscaleError::from));

        if result.is_err() && partial.exists() {
            if let Err(e) = fs::remove_file(&partial) {
                tracing::warn!(path = %partial.display(), "临时文件清理失败 / failed to remove partial file: {e}");
            }
        }
        result
    }

    fn write_to(&self, audio: &UpscaledAudio, path: &Path) -> UpscaleResult<()> {
        if audio.channel_count() == 0 {
            return Err(UpscaleError::EncodeError("没有可写出的声道".to_string()));
        }
        let samples = audio.to_interleaved_i24();
        match self.format {
            TargetFormat::Wav => write_wav(&samples, audio, path),
            TargetFormat::Flac => {
                let bytes = encode_flac(&samples, audio)?;
                fs::write(path, bytes)?;
                Ok(())
            }
        }
    }
}

fn write_wav(samples: &[i32], audio: &UpscaledAudio, path: &Path) -> UpscaleResult<()> {
    let channels = u16::try_from(audio.channel_count())
        .map_err(|_| encode_error("声道数过多", audio.channel_count()))?;
    let spec = hound::WavSpec {
        channels,
        sample_rate: audio.sample_rate,
        bits_per_sample: OUTPUT_BITS_PER_SAMPLE,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer =
        hound::WavWriter::create(path, spec).map_err(|e| encode_error("WAV写出失败", e))?;
    for &sample in samples {
        writer
            .write_sample(sample)
            .map_err(|e| encode_error("WAV写出失败", e))?;
    }
    writer
        .finalize()
        .map_err(|e| encode_error("WAV写出失败", e))
}

/// 选择FLAC固定块长
///
/// 除最后一块外所有块等长；最后一块为实际剩余长度，且不短于
/// `MIN_BLOCK_SIZE`（更短的块无法进行LPC分析）。
fn flac_block_size(total_frames: usize) -> Option<usize> {
    if total_frames < MIN_BLOCK_SIZE {
        return None;
    }
    (MIN_BLOCK_SIZE..=defaults::FLAC_BLOCK_SIZE)
        .rev()
        .find(|&size| {
            let tail = total_frames % size;
            tail == 0 || tail >= MIN_BLOCK_SIZE
        })
}

fn encode_flac(samples: &[i32], audio: &UpscaledAudio) -> UpscaleResult<Vec<u8>> {
    let channels = audio.channel_count();
    let bits = OUTPUT_BITS_PER_SAMPLE as usize;
    let total_frames = samples.len() / channels;
    let block_size = flac_block_size(total_frames).ok_or_else(|| {
        encode_error(
            "FLAC输出过短",
            format!("{total_frames} frames (min {MIN_BLOCK_SIZE})"),
        )
    })?;

    let config = EncoderConfig::default()
        .into_verified()
        .map_err(|e| encode_error("FLAC配置无效", format!("{e:?}")))?;
    let mut info = StreamInfo::new(audio.sample_rate as usize, channels, bits)
        .map_err(|e| encode_error("FLAC流信息无效", format!("{e:?}")))?;
    let mut framebuf = FrameBuf::with_size(channels, block_size)
        .map_err(|e| encode_error("FLAC块长无效", format!("{e:?}")))?;
    // 块长为1时逐帧喂入，MD5不会被补零
    let mut digest = Context::new(bits, channels, 1);

    let mut frames = Vec::with_capacity(total_frames.div_ceil(block_size));
    for (frame_number, block) in samples.chunks(block_size * channels).enumerate() {
        let len = block.len() / channels;
        if len != framebuf.size() {
            framebuf.resize(len);
        }
        framebuf
            .fill_interleaved(block)
            .map_err(|e| encode_error("FLAC填充失败", format!("{e:?}")))?;
        for interleaved in block.chunks(channels) {
            digest
                .fill_interleaved(interleaved)
                .map_err(|e| encode_error("FLAC校验失败", format!("{e:?}")))?;
        }

        let frame = encode_fixed_size_frame(&config, &framebuf, frame_number, &info)
            .map_err(|e| encode_error("FLAC编码失败", format!("{e:?}")))?;
        info.update_frame_info(&frame);
        frames.push(frame);
    }

    // 流信息中的最小块长不计最后一块
    let nominal = block_size.min(total_frames);
    info.set_block_sizes(nominal, nominal)
        .map_err(|e| encode_error("FLAC流信息无效", format!("{e:?}")))?;
    info.set_md5_digest(&digest.md5_digest());
    info.set_total_samples(total_frames);

    let mut sink = ByteSink::new();
    Stream::with_stream_info(info)
        .write(&mut sink)
        .map_err(|e| encode_error("FLAC写出失败", format!("{e:?}")))?;
    for frame in &frames {
        frame
            .write(&mut sink)
            .map_err(|e| encode_error("FLAC写出失败", format!("{e:?}")))?;
    }
    Ok(sink.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio(sample_rate: u32) -> UpscaledAudio {
        let ch: Vec<f64> = (0..2048).map(|i| ((i as f64) * 0.01).sin()).collect();
        UpscaledAudio {
            channels: vec![ch.clone(), ch.iter().map(|s| -s).collect()],
            sample_rate,
            upscale_factor: 2,
            silent_channels: vec![],
        }
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("/tmp/out/song.flac")),
            PathBuf::from("/tmp/out/song.flac.partial")
        );
    }

    #[test]
    fn test_flac_block_size_keeps_tail_encodable() {
        assert_eq!(flac_block_size(8192), Some(4096));
        assert_eq!(flac_block_size(4400), Some(4096));
        assert_eq!(flac_block_size(300), Some(4096));
        // 4097 % 4096 = 1 太短，退到 4033 → 余 64
        assert_eq!(flac_block_size(4097), Some(4033));
        assert_eq!(flac_block_size(MIN_BLOCK_SIZE - 1), None);
    }

    #[test]
    fn test_wav_output_is_24_bit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.wav");
        let audio = audio(88200);
        AudioEncoder::new(TargetFormat::Wav).write(&audio, &path).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.bits_per_sample, 24);
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 88200);
        assert_eq!(reader.len() as usize, 2048 * 2);
        assert!(!partial_path(&path).exists());
    }

    #[test]
    fn test_flac_output_has_stream_marker() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.flac");
        AudioEncoder::new(TargetFormat::Flac)
            .write(&audio(88200), &path)
            .unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..4], b"fLaC");
        assert!(!partial_path(&path).exists());
    }

    /// 长度不是块长整数倍时，解码后的帧数与写入一致（末块不补零）
    #[test]
    fn test_flac_decoded_length_matches_written_frames() {
        let dir = tempfile::tempdir().unwrap();
        for (frames, channels) in [(4400usize, 1usize), (5000, 2), (700, 2), (4097, 1)] {
            let tone: Vec<f64> = (0..frames).map(|i| ((i as f64) * 0.03).sin()).collect();
            let upscaled = UpscaledAudio {
                channels: vec![tone; channels],
                sample_rate: 48000,
                upscale_factor: 1,
                silent_channels: vec![],
            };
            let path = dir.path().join(format!("tail_{frames}_{channels}.flac"));
            AudioEncoder::new(TargetFormat::Flac)
                .write(&upscaled, &path)
                .unwrap();

            let decoded = crate::audio::AudioDecoder::new().decode(&path).unwrap();
            assert_eq!(decoded.frames(), frames, "{frames} 帧 × {channels} 声道");
            assert_eq!(decoded.channel_count(), channels);
            let last = decoded.channels()[0][frames - 1] as f64;
            let expected = ((frames - 1) as f64 * 0.03).sin();
            assert!((last - expected).abs() < 1e-4);
        }
    }

    #[test]
    fn test_too_short_flac_is_encode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.flac");
        let short = UpscaledAudio {
            channels: vec![vec![0.25; MIN_BLOCK_SIZE - 1]],
            sample_rate: 44100,
            upscale_factor: 1,
            silent_channels: vec![],
        };
        let result = AudioEncoder::new(TargetFormat::Flac).write(&short, &path);
        assert!(matches!(result, Err(UpscaleError::EncodeError(_))));
        assert!(!path.exists());
    }

    #[test]
    fn test_failed_write_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        let empty = UpscaledAudio {
            channels: vec![],
            sample_rate: 44100,
            upscale_factor: 1,
            silent_channels: vec![],
        };
        let result = AudioEncoder::new(TargetFormat::Wav).write(&empty, &path);
        assert!(matches!(result, Err(UpscaleError::EncodeError(_))));
        assert!(!path.exists());
        assert!(!partial_path(&path).exists());
    }
}
