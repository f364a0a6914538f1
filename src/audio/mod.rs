//! 音频编解码模块
//!
//! 解码（hound + symphonia）、声道缓冲区、24位FLAC/WAV编码。

pub mod buffer;
pub mod decoder;
pub mod encoder;

pub use buffer::{AudioBuffer, UpscaledAudio};
pub use decoder::{AudioDecoder, SUPPORTED_EXTENSIONS, is_supported_extension};
pub use encoder::{AudioEncoder, partial_path};
