//! Conversion of arbitrary audio into the device's 8 kHz mono G.711 A-law
//! format, delegated to an external `ffmpeg`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{info, warn};

/// Largest file the device accepts for a custom sound.
pub const DEFAULT_MAX_BYTES: u64 = 128 * 1024;
/// A-law at 8 kHz mono is one byte per sample.
const BYTES_PER_SECOND: u64 = 8000;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("{0} not found; install ffmpeg or set the program path")]
    MissingProgram(String),
    #[error("converter exited with {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },
    #[error("converter produced no output at {0}")]
    NoOutput(PathBuf),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Produces an upload-ready file from an arbitrary input file.
#[async_trait]
pub trait AudioConverter: Send + Sync {
    async fn convert(&self, input: &Path) -> Result<PathBuf, ConvertError>;
}

#[derive(Debug, Clone)]
pub struct FfmpegConverter {
    output_dir: PathBuf,
    max_bytes: u64,
    program: String,
}

impl FfmpegConverter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            max_bytes: DEFAULT_MAX_BYTES,
            program: "ffmpeg".into(),
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// `<stem>_<YYYYmmdd_HHMMSS>.g711` inside the output directory.
    pub fn output_path(&self, input: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".into());
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        self.output_dir.join(format!("{}_{}.g711", stem, stamp))
    }

    /// Duration cap keeps the encoded size near `max_bytes`; the file is
    /// truncated afterwards in case the container adds a few bytes.
    pub fn ffmpeg_args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let max_seconds = self.max_bytes as f64 / BYTES_PER_SECOND as f64;
        vec![
            "-i".into(),
            input.as_os_str().to_owned(),
            "-t".into(),
            max_seconds.to_string().into(),
            "-acodec".into(),
            "pcm_alaw".into(),
            "-ar".into(),
            "8000".into(),
            "-ac".into(),
            "1".into(),
            "-f".into(),
            "alaw".into(),
            "-y".into(),
            output.as_os_str().to_owned(),
        ]
    }

    async fn cap_size(&self, output: &Path) -> Result<u64, ConvertError> {
        let size = match tokio::fs::metadata(output).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConvertError::NoOutput(output.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };
        if size <= self.max_bytes {
            return Ok(size);
        }
        let file = tokio::fs::OpenOptions::new().write(true).open(output).await?;
        file.set_len(self.max_bytes).await?;
        warn!(path = %output.display(), from = size, to = self.max_bytes, "converted audio truncated");
        Ok(self.max_bytes)
    }
}

#[async_trait]
impl AudioConverter for FfmpegConverter {
    async fn convert(&self, input: &Path) -> Result<PathBuf, ConvertError> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let output = self.output_path(input);
        let result = Command::new(&self.program)
            .args(self.ffmpeg_args(input, &output))
            .output()
            .await;
        let result = match result {
            Ok(result) => result,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConvertError::MissingProgram(self.program.clone()))
            }
            Err(e) => return Err(e.into()),
        };
        if !result.status.success() {
            return Err(ConvertError::Failed {
                code: result.status.code(),
                stderr: String::from_utf8_lossy(&result.stderr).into_owned(),
            });
        }
        let size = self.cap_size(&output).await?;
        info!(path = %output.display(), bytes = size, "audio converted");
        Ok(output)
    }
}
