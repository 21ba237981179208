//! Media classification, image-header probing and video frame extraction.

use std::{
   ffi::OsStr,
   path::{Path, PathBuf},
   process::Stdio,
};

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::MediaError;

/// Suffix appended to an asset's path to name its video thumbnail.
pub const THUMBNAIL_SUFFIX: &str = "-thumbnail.jpg";

const VIDEO_EXTENSIONS: &[&str] = &[".mp4", ".mov"];

const MIME_TYPES: &[(&str, &str)] = &[
   (".jpg", "image/jpeg"),
   (".jpeg", "image/jpeg"),
   (".png", "image/png"),
   (".gif", "image/gif"),
   (".heic", "image/heic"),
   (".heif", "image/heif"),
   (".tif", "image/tiff"),
   (".tiff", "image/tiff"),
   (".webp", "image/webp"),
   (".bmp", "image/bmp"),
   (".mp4", "video/mp4"),
   (".mov", "video/quicktime"),
   (".m4v", "video/x-m4v"),
];

/// Lower-case extension of `filename` including the leading dot, or an empty
/// string when it has none.
pub fn filetype(filename: &str) -> String {
   Path::new(filename)
      .extension()
      .and_then(OsStr::to_str)
      .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
      .unwrap_or_default()
}

/// MIME type for a lower-case extension, empty when unknown.
pub fn mime_for(filetype: &str) -> &'static str {
   MIME_TYPES
      .iter()
      .find(|(ext, _)| *ext == filetype)
      .map_or("", |(_, mime)| *mime)
}

pub fn is_video(filetype: &str) -> bool {
   VIDEO_EXTENSIONS.contains(&filetype)
}

/// Reads pixel dimensions from the image header without decoding the image.
pub fn probe_image_dimensions(path: &Path) -> Result<(u32, u32), MediaError> {
   image::image_dimensions(path).map_err(|e| MediaError::ImageHeader {
      path:   path.to_path_buf(),
      reason: e.to_string(),
   })
}

/// Produces still frames from video files.
#[async_trait]
pub trait FrameExtractor: Send + Sync {
   /// Pixel size of the first video stream.
   async fn probe(&self, video: &Path) -> Result<(u32, u32), MediaError>;

   /// Writes the first frame of `video`, scaled to `width`x`height`, as a JPEG
   /// at `output` and returns the written path.
   async fn extract_frame(
      &self,
      video: &Path,
      width: u32,
      height: u32,
      output: &Path,
   ) -> Result<PathBuf, MediaError>;
}

/// [`FrameExtractor`] backed by the `ffprobe` and `ffmpeg` binaries.
///
/// Children are killed when the future driving them is dropped, so callers
/// can bound the work with `tokio::time::timeout`.
#[derive(Debug, Clone)]
pub struct FfmpegExtractor {
   ffmpeg:  PathBuf,
   ffprobe: PathBuf,
}

impl FfmpegExtractor {
   pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
      Self { ffmpeg: ffmpeg.into(), ffprobe: ffprobe.into() }
   }

   async fn run(tool: &Path, args: &[&OsStr]) -> Result<String, MediaError> {
      let name = tool.display().to_string();
      let output = Command::new(tool)
         .args(args)
         .stdin(Stdio::null())
         .kill_on_drop(true)
         .output()
         .await
         .map_err(|source| MediaError::Spawn { tool: name.clone(), source })?;

      if !output.status.success() {
         tracing::debug!("{name} stderr: {}", String::from_utf8_lossy(&output.stderr).trim());
         return Err(MediaError::ToolFailed { tool: name, status: output.status.to_string() });
      }
      Ok(String::from_utf8_lossy(&output.stdout).into_owned())
   }
}

impl Default for FfmpegExtractor {
   fn default() -> Self {
      Self::new("ffmpeg", "ffprobe")
   }
}

#[async_trait]
impl FrameExtractor for FfmpegExtractor {
   async fn probe(&self, video: &Path) -> Result<(u32, u32), MediaError> {
      let stdout = Self::run(&self.ffprobe, &[
         OsStr::new("-v"),
         OsStr::new("error"),
         OsStr::new("-select_streams"),
         OsStr::new("v:0"),
         OsStr::new("-show_entries"),
         OsStr::new("stream=width,height"),
         OsStr::new("-of"),
         OsStr::new("csv=p=0:s=x"),
         video.as_os_str(),
      ])
      .await?;

      parse_dimensions(&stdout).ok_or_else(|| MediaError::UnexpectedOutput {
         tool:   self.ffprobe.display().to_string(),
         output: stdout.trim().to_string(),
      })
   }

   async fn extract_frame(
      &self,
      video: &Path,
      width: u32,
      height: u32,
      output: &Path,
   ) -> Result<PathBuf, MediaError> {
      let size = format!("{width}x{height}");
      Self::run(&self.ffmpeg, &[
         OsStr::new("-y"),
         OsStr::new("-v"),
         OsStr::new("error"),
         OsStr::new("-i"),
         video.as_os_str(),
         OsStr::new("-vframes"),
         OsStr::new("1"),
         OsStr::new("-s"),
         OsStr::new(&size),
         OsStr::new("-f"),
         OsStr::new("mjpeg"),
         output.as_os_str(),
      ])
      .await?;
      Ok(output.to_path_buf())
   }
}

/// Parses `WIDTHxHEIGHT` from the first non-empty line of probe output.
fn parse_dimensions(output: &str) -> Option<(u32, u32)> {
   let line = output.lines().map(str::trim).find(|l| !l.is_empty())?;
   let (width, height) = line.split_once('x')?;
   let width = width.trim().parse().ok()?;
   let height = height.trim().trim_end_matches('x').parse().ok()?;
   Some((width, height))
}
