// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input/gstreamer_input.rs - GStreamer 视频输入
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

//! # GStreamer 视频输入模块
//!
//! 解码视频文件并逐帧输出 RGB 或灰度像素。每帧直接映射 appsink 缓冲区，
//! 保留 GStreamer 给出的行跨度，由输入张量打包时再按跨度拷贝。
//!
//! ## 系统依赖
//!
//! **Ubuntu/Debian:**
//! ```bash
//! sudo apt-get install libgstreamer1.0-dev libgstreamer-plugins-base1.0-dev
//! ```
//!
//! ## 基本用法
//!
//! ```no_run
//! use shanan_bench::{FromUrl, input::GStreamerInputBuilder};
//! use url::Url;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let url = Url::parse("gst://file/data/street.mp4?width=320")?;
//! let input = GStreamerInputBuilder::from_url(&url)?.build()?;
//!
//! for frame in input {
//!     println!("第 {} 帧: {}x{}", frame.index(), frame.width(), frame.height());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! 只给出宽或高时，由 `videoscale` 按原视频宽高比协商另一维。

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{Frame, FrameData, FrameError, PixelFormat},
  input::query_size,
};

/// 等待管道进入播放状态的最长时间
const STATE_CHANGE_TIMEOUT_SECS: u64 = 10;

/// GStreamer 输入错误类型
#[derive(Error, Debug)]
pub enum GStreamerInputError {
  /// URI scheme 不匹配（期望 "gst://file/..."）
  #[error("URI scheme mismatch")]
  SchemeMismatch,
  /// GStreamer 库错误
  #[error("GStreamer error: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  /// GStreamer 布尔操作错误
  #[error("GStreamer boolean error: {0}")]
  GStreamerBoolError(#[from] gst::glib::BoolError),
  /// 无法获取 appsink 元素
  #[error("Failed to get appsink element")]
  AppSinkNotFound,
  /// 无法转换元素为 appsink
  #[error("Failed to convert element to appsink")]
  AppSinkConversionFailed,
  /// 无法从 caps 获取视频信息
  #[error("Failed to get video info from caps")]
  VideoInfoError,
  /// 管道错误
  #[error("Pipeline error: {0}")]
  PipelineError(String),
  /// 帧布局错误
  #[error("Frame error: {0}")]
  FrameError(#[from] FrameError),
  /// 状态改变错误
  #[error("State change error: {0}")]
  StateChangeError(#[from] gst::StateChangeError),
}

pub struct GStreamerInputBuilder {
  path: String,
  width: u32,
  height: u32,
  format: PixelFormat,
}

impl FromUrlWithScheme for GStreamerInputBuilder {
  const SCHEME: &'static str = "gst";
}

impl FromUrl for GStreamerInputBuilder {
  type Error = GStreamerInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME || url.host_str() != Some("file") {
      return Err(GStreamerInputError::SchemeMismatch);
    }

    let (width, height) = query_size(url);
    Ok(Self::new(url.path()).size(width, height))
  }
}

impl GStreamerInputBuilder {
  pub fn new(path: impl Into<String>) -> Self {
    Self {
      path: path.into(),
      width: 0,
      height: 0,
      format: PixelFormat::Rgb24,
    }
  }

  pub fn size(mut self, width: u32, height: u32) -> Self {
    self.width = width;
    self.height = height;
    self
  }

  pub fn pixel_format(mut self, format: PixelFormat) -> Self {
    self.format = format;
    self
  }

  fn caps(&self) -> String {
    let format = match self.format {
      PixelFormat::Rgb24 => "RGB",
      PixelFormat::Gray8 => "GRAY8",
    };
    let mut caps = format!("video/x-raw,format={}", format);
    if self.width != 0 {
      caps.push_str(&format!(",width={}", self.width));
    }
    if self.height != 0 {
      caps.push_str(&format!(",height={}", self.height));
    }
    caps
  }

  // 文件路径不进入描述字符串，由 build 设置 filesrc 的 location 属性
  fn pipeline_description(&self) -> String {
    format!(
      "filesrc name=src ! decodebin ! videoconvert ! videoscale ! {} ! appsink name=sink sync=false max-buffers=2",
      self.caps()
    )
  }

  pub fn build(self) -> Result<GStreamerInput, GStreamerInputError> {
    gst::init()?;

    let description = self.pipeline_description();
    info!("GStreamer pipeline description: {}", description);

    let pipeline = gst::parse::launch(&description)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| GStreamerInputError::PipelineError("Failed to create pipeline".to_string()))?;

    pipeline
      .by_name("src")
      .ok_or_else(|| GStreamerInputError::PipelineError("Failed to get filesrc element".to_string()))?
      .set_property("location", self.path.as_str());

    let appsink = pipeline
      .by_name("sink")
      .ok_or(GStreamerInputError::AppSinkNotFound)?
      .downcast::<gst_app::AppSink>()
      .map_err(|_| GStreamerInputError::AppSinkConversionFailed)?;

    if let Err(e) = start(&pipeline) {
      error!("无法打开视频文件 {}: {}", self.path, e);
      let _ = pipeline.set_state(gst::State::Null);
      return Err(e.into());
    }

    Ok(GStreamerInput {
      pipeline,
      appsink,
      frame_index: 0,
    })
  }
}

/// 切换到播放状态并等待完成，文件无法打开或无法解码时在这里失败
fn start(pipeline: &gst::Pipeline) -> Result<(), gst::StateChangeError> {
  pipeline.set_state(gst::State::Playing)?;
  let (result, _, _) = pipeline.state(gst::ClockTime::from_seconds(STATE_CHANGE_TIMEOUT_SECS));
  result.map(|_| ())
}

/// GStreamer 视频输入，逐帧迭代直到流结束
pub struct GStreamerInput {
  pipeline: gst::Pipeline,
  appsink: gst_app::AppSink,
  frame_index: usize,
}

impl Drop for GStreamerInput {
  fn drop(&mut self) {
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("Failed to stop GStreamer pipeline: {}", e);
    }
  }
}

impl GStreamerInput {
  fn pull_sample(&self) -> Option<gst::Sample> {
    match self.appsink.pull_sample() {
      Ok(sample) => Some(sample),
      Err(_) if self.appsink.is_eos() => {
        info!("视频流结束");
        None
      }
      Err(e) => {
        error!("Failed to pull sample: {}", e);
        None
      }
    }
  }
}

impl Iterator for GStreamerInput {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    let sample = self.pull_sample()?;
    self.frame_index += 1;
    convert_sample(sample, self.frame_index)
      .map_err(|e| {
        error!("Failed to fetch sample: {}", e);
        e
      })
      .ok()
  }
}

fn convert_sample(sample: gst::Sample, index: usize) -> Result<Frame, GStreamerInputError> {
  let caps = sample
    .caps()
    .ok_or_else(|| GStreamerInputError::PipelineError("No caps in sample".to_string()))?;
  let video_info =
    gst_video::VideoInfo::from_caps(caps).map_err(|_| GStreamerInputError::VideoInfoError)?;

  let format = match video_info.format() {
    gst_video::VideoFormat::Rgb => PixelFormat::Rgb24,
    gst_video::VideoFormat::Gray8 => PixelFormat::Gray8,
    other => panic!("不支持的像素格式: {:?}", other),
  };
  let width = video_info.width() as usize;
  let height = video_info.height() as usize;
  let stride = video_info.stride()[0] as usize;

  let buffer = sample
    .buffer_owned()
    .ok_or_else(|| GStreamerInputError::PipelineError("No buffer in sample".to_string()))?;
  let map = buffer.into_mapped_buffer_readable().map_err(|_| {
    GStreamerInputError::PipelineError("Failed to map buffer for reading".to_string())
  })?;

  Ok(Frame::new(
    index,
    width,
    height,
    format,
    stride,
    FrameData::Mapped(map),
  )?)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_from_url() {
    let url = Url::parse("gst://file/data/street.mp4?width=320").unwrap();
    let builder = GStreamerInputBuilder::from_url(&url).unwrap();
    assert_eq!(builder.path, "/data/street.mp4");
    assert_eq!(builder.caps(), "video/x-raw,format=RGB,width=320");
  }

  #[test]
  fn test_from_url_requires_file_host() {
    let url = Url::parse("gst://camera/dev/video0").unwrap();
    assert!(matches!(
      GStreamerInputBuilder::from_url(&url),
      Err(GStreamerInputError::SchemeMismatch)
    ));
  }

  #[test]
  fn test_gray_caps_with_both_dimensions() {
    let builder = GStreamerInputBuilder::new("/a.mp4")
      .size(320, 240)
      .pixel_format(PixelFormat::Gray8);
    assert_eq!(
      builder.caps(),
      "video/x-raw,format=GRAY8,width=320,height=240"
    );
    assert!(builder.pipeline_description().starts_with("filesrc name=src !"));
  }

  #[test]
  fn test_path_stays_out_of_pipeline_description() {
    let builder = GStreamerInputBuilder::new("/data/a \"quoted\" ! name.mp4");
    let description = builder.pipeline_description();
    assert!(!description.contains("quoted"));
    assert!(description.ends_with("appsink name=sink sync=false max-buffers=2"));
  }

  #[test]
  fn test_missing_file_fails_to_start() {
    let result = GStreamerInputBuilder::new("/nonexistent/\"street\".mp4").build();
    assert!(result.is_err());
  }
}
