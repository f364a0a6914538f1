//! 音频解码适配器
//!
//! WAV优先使用hound（更快），其余格式（以及hound失败的WAV）使用symphonia。
//! 同时给出源码率：PCM按 `采样率 × 声道 × 位深` 计算，其他格式按
//! `文件字节数 × 8 / 时长` 估算，时长未知时为 `None`。

use super::buffer::AudioBuffer;
use crate::error::{UpscaleError, UpscaleResult, input_error};
use std::path::Path;

/// 支持的输入扩展名
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "flac", "m4a", "aiff", "aif"];

/// 判断扩展名是否受支持（不区分大小写）
pub fn is_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

/// 文件解码器
#[derive(Debug, Default, Clone, Copy)]
pub struct AudioDecoder;

impl AudioDecoder {
    pub fn new() -> Self {
        Self
    }

    /// 完整解码文件
    ///
    /// # 错误
    ///
    /// * 文件不存在、无法识别或解码不到任何样本时返回 `InputError`
    pub fn decode(&self, path: &Path) -> UpscaleResult<AudioBuffer> {
        if !path.is_file() {
            return Err(UpscaleError::InputError(format!(
                "输入文件不存在 / input file not found: {}",
                path.display()
            )));
        }

        let is_wav = path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));
        if is_wav {
            match self.decode_with_hound(path) {
                Ok(buffer) => return Ok(buffer),
                Err(e) => {
                    tracing::debug!("hound解码失败，回退到symphonia / hound failed: {e}");
                }
            }
        }

        self.decode_with_symphonia(path)
    }

    /// 使用hound解码WAV
    fn decode_with_hound(&self, path: &Path) -> UpscaleResult<AudioBuffer> {
        let mut reader = hound::WavReader::open(path)?;
        let spec = reader.spec();

        let samples: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
            (hound::SampleFormat::Float, 32) => {
                reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?
            }
            (hound::SampleFormat::Int, 8) => reader
                .samples::<i8>()
                .map(|s| s.map(|v| v as f32 / 128.0))
                .collect::<Result<Vec<_>, _>>()?,
            (hound::SampleFormat::Int, 16) => reader
                .samples::<i16>()
                .map(|s| s.map(|v| v as f32 / 32768.0))
                .collect::<Result<Vec<_>, _>>()?,
            (hound::SampleFormat::Int, 24) => reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / 8_388_608.0))
                .collect::<Result<Vec<_>, _>>()?,
            (hound::SampleFormat::Int, 32) => reader
                .samples::<i32>()
                .map(|s| s.map(|v| (v as f64 / 2_147_483_648.0) as f32))
                .collect::<Result<Vec<_>, _>>()?,
            (format, bits) => {
                return Err(UpscaleError::InputError(format!(
                    "不支持的WAV样本格式: {format:?} {bits}位"
                )));
            }
        };

        let bitrate = pcm_bitrate(spec.sample_rate, spec.channels, spec.bits_per_sample);
        AudioBuffer::from_interleaved(
            &samples,
            spec.channels as usize,
            spec.sample_rate,
            Some(bitrate),
        )
    }

    /// 使用symphonia通用解码
    fn decode_with_symphonia(&self, path: &Path) -> UpscaleResult<AudioBuffer> {
        use symphonia::core::audio::SampleBuffer;
        use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
        use symphonia::core::errors::Error as SymphoniaError;
        use symphonia::core::formats::FormatOptions;
        use symphonia::core::io::MediaSourceStream;
        use symphonia::core::meta::MetadataOptions;
        use symphonia::core::probe::Hint;

        let file = std::fs::File::open(path).map_err(|e| input_error("无法打开文件", e))?;
        let file_bytes = file.metadata().map(|m| m.len()).unwrap_or(0);
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = path.extension() {
            hint.with_extension(&extension.to_string_lossy());
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| input_error("格式探测失败", e))?;
        let mut format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| UpscaleError::InputError("未找到音频轨道".to_string()))?;
        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| input_error("创建解码器失败", e))?;

        let mut sample_rate = codec_params.sample_rate.unwrap_or(0);
        let mut channel_count = codec_params.channels.map_or(0, |ch| ch.count());
        let mut interleaved: Vec<f32> = Vec::new();
        let mut sample_buf: Option<SampleBuffer<f32>> = None;

        loop {
            let packet = match format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    continue;
                }
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => return Err(input_error("读取包失败", e)),
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    sample_rate = spec.rate;
                    channel_count = spec.channels.count();
                    let buf = sample_buf.get_or_insert_with(|| {
                        SampleBuffer::<f32>::new(decoded.capacity() as u64, spec)
                    });
                    if buf.capacity() < decoded.capacity() * channel_count {
                        *buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                    }
                    buf.copy_interleaved_ref(decoded);
                    interleaved.extend_from_slice(buf.samples());
                }
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                // 损坏的包跳过
                Err(SymphoniaError::DecodeError(_)) => continue,
                Err(e) => return Err(input_error("解码失败", e)),
            }
        }

        if interleaved.is_empty() || channel_count == 0 {
            return Err(UpscaleError::InputError(format!(
                "未解码到任何样本 / no samples decoded: {}",
                path.display()
            )));
        }

        let frames = (interleaved.len() / channel_count) as u64;
        let bitrate = match codec_params.bits_per_sample {
            Some(bits) if is_pcm_codec(codec_params.codec) => {
                Some(pcm_bitrate(sample_rate, channel_count as u16, bits as u16))
            }
            _ => estimated_bitrate(file_bytes, frames, sample_rate),
        };

        AudioBuffer::from_interleaved(&interleaved, channel_count, sample_rate, bitrate)
    }
}

fn is_pcm_codec(codec: symphonia::core::codecs::CodecType) -> bool {
    use symphonia::core::codecs::*;
    matches!(
        codec,
        CODEC_TYPE_PCM_S16LE
            | CODEC_TYPE_PCM_S16BE
            | CODEC_TYPE_PCM_S24LE
            | CODEC_TYPE_PCM_S24BE
            | CODEC_TYPE_PCM_S32LE
            | CODEC_TYPE_PCM_S32BE
            | CODEC_TYPE_PCM_F32LE
            | CODEC_TYPE_PCM_F32BE
    )
}

/// PCM码率：采样率 × 声道 × 位深
#[inline]
pub fn pcm_bitrate(sample_rate: u32, channels: u16, bits_per_sample: u16) -> u32 {
    let bps = sample_rate as u64 * channels as u64 * bits_per_sample as u64;
    bps.min(u32::MAX as u64) as u32
}

/// 压缩格式码率估算：`文件字节数 × 8 / 时长`
pub fn estimated_bitrate(file_bytes: u64, frames: u64, sample_rate: u32) -> Option<u32> {
    if file_bytes == 0 || frames == 0 || sample_rate == 0 {
        return None;
    }
    let duration = frames as f64 / sample_rate as f64;
    let bps = (file_bytes as f64 * 8.0 / duration).round();
    (bps >= 1.0).then(|| bps.min(u32::MAX as f64) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_pcm_bitrate() {
        assert_eq!(pcm_bitrate(44100, 2, 16), 1_411_200);
        assert_eq!(pcm_bitrate(48000, 1, 24), 1_152_000);
    }

    #[test]
    fn test_estimated_bitrate() {
        // 1秒、40000字节 → 320 kbps
        assert_eq!(estimated_bitrate(40_000, 44_100, 44_100), Some(320_000));
        assert_eq!(estimated_bitrate(40_000, 0, 44_100), None);
        assert_eq!(estimated_bitrate(0, 100, 44_100), None);
    }

    #[test]
    fn test_supported_extensions() {
        assert!(is_supported_extension(&PathBuf::from("a/b/song.MP3")));
        assert!(is_supported_extension(&PathBuf::from("x.flac")));
        assert!(!is_supported_extension(&PathBuf::from("cover.jpg")));
        assert!(!is_supported_extension(&PathBuf::from("README")));
    }

    #[test]
    fn test_missing_file_is_input_error() {
        let result = AudioDecoder::new().decode(Path::new("/definitely/not/here.wav"));
        assert!(matches!(result, Err(UpscaleError::InputError(_))));
    }

    #[test]
    fn test_decode_wav_with_hound() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 22050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for i in 0..100i16 {
            writer.write_sample(i * 100).unwrap();
            writer.write_sample(-i * 100).unwrap();
        }
        writer.finalize().unwrap();

        let buffer = AudioDecoder::new().decode(&path).unwrap();
        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.frames(), 100);
        assert_eq!(buffer.sample_rate(), 22050);
        assert_eq!(buffer.source_bitrate(), Some(22050 * 2 * 16));
        assert_eq!(buffer.channels()[0][1], 100.0 / 32768.0);
        assert_eq!(buffer.channels()[1][1], -100.0 / 32768.0);
    }

    #[test]
    fn test_garbage_file_is_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.mp3");
        std::fs::write(&path, b"not really audio").unwrap();
        assert!(matches!(
            AudioDecoder::new().decode(&path),
            Err(UpscaleError::InputError(_))
        ));
    }
}
