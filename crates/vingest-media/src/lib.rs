//! yt-dlp / FFmpeg wrappers for media extraction.
//!
//! This crate provides:
//! - Caption download with a language preference chain and WebVTT parsing
//! - Audio download as MP3
//! - Stream URL resolution, FFprobe inspection and periodic frame capture
//! - The per-video working area and its cleanup
//! - The [`MediaExtractor`] trait the pipeline depends on

pub mod audio;
pub mod captions;
pub mod command;
pub mod cookies;
pub mod error;
pub mod extractor;
pub mod frames;
pub mod probe;
pub mod stream;
pub mod workdir;

pub use command::{check_tools, FfmpegCommand, Tool, ToolCommand, ToolOptions};
pub use error::{MediaError, MediaResult};
pub use extractor::{MediaExtractor, YtDlpExtractor};
pub use probe::{probe_stream, StreamInfo};
pub use workdir::{move_file, WorkArea};
