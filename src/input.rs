// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input.rs - 视频/图像输入
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::collections::HashMap;

use thiserror::Error;

use crate::{
  FromUrl,
  frame::{Frame, PixelFormat},
};

#[cfg(feature = "read_image_file")]
mod read_image_file;
#[cfg(feature = "read_image_file")]
pub use self::read_image_file::{ImageFileInput, ImageFileInputBuilder, ImageFileInputError};

#[cfg(feature = "gstreamer_input")]
mod gstreamer_input;
#[cfg(feature = "gstreamer_input")]
pub use self::gstreamer_input::{GStreamerInput, GStreamerInputBuilder, GStreamerInputError};

/// 计算输出尺寸
///
/// 宽高都为 0 时保持原尺寸；只有一个为 0 时按原图宽高比由另一个推导。
pub fn resolve_size(src_width: u32, src_height: u32, width: u32, height: u32) -> (u32, u32) {
  match (width, height) {
    (0, 0) => (src_width, src_height),
    (0, h) => ((src_width as u64 * h as u64 / src_height as u64) as u32, h),
    (w, 0) => (w, (src_height as u64 * w as u64 / src_width as u64) as u32),
    (w, h) => (w, h),
  }
}

/// 从 URL 查询参数读取 `width` 与 `height`，缺省为 0
pub(crate) fn query_size(url: &url::Url) -> (u32, u32) {
  let query: HashMap<String, String> = url
    .query_pairs()
    .map(|(k, v)| (String::from(k), String::from(v)))
    .collect();
  let read = |key: &str| {
    query
      .get(key)
      .and_then(|v| v.parse::<u32>().ok())
      .unwrap_or(0)
  };
  (read("width"), read("height"))
}

#[derive(Error, Debug)]
pub enum InputError {
  #[cfg(feature = "read_image_file")]
  #[error("Image file input error: {0}")]
  ImageFileInputError(#[from] ImageFileInputError),
  #[cfg(feature = "gstreamer_input")]
  #[error("GStreamer input error: {0}")]
  GStreamerInputError(#[from] GStreamerInputError),
  #[error("URI scheme mismatch")]
  SchemeMismatch,
}

pub enum InputBuilder {
  #[cfg(feature = "read_image_file")]
  ReadImageFile(ImageFileInputBuilder),
  #[cfg(feature = "gstreamer_input")]
  GStreamerInput(GStreamerInputBuilder),
}

impl FromUrl for InputBuilder {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "gstreamer_input")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == GStreamerInputBuilder::SCHEME {
        let builder = GStreamerInputBuilder::from_url(url)?;
        return Ok(InputBuilder::GStreamerInput(builder));
      }
    }
    #[cfg(feature = "read_image_file")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == ImageFileInputBuilder::SCHEME {
        let builder = ImageFileInputBuilder::from_url(url)?;
        return Ok(InputBuilder::ReadImageFile(builder));
      }
    }
    Err(InputError::SchemeMismatch)
  }
}

impl InputBuilder {
  /// 输出尺寸，0 表示由另一维按宽高比推导
  pub fn size(self, width: u32, height: u32) -> Self {
    match self {
      #[cfg(feature = "read_image_file")]
      InputBuilder::ReadImageFile(builder) => {
        InputBuilder::ReadImageFile(builder.size(width, height))
      }
      #[cfg(feature = "gstreamer_input")]
      InputBuilder::GStreamerInput(builder) => {
        InputBuilder::GStreamerInput(builder.size(width, height))
      }
    }
  }

  pub fn pixel_format(self, format: PixelFormat) -> Self {
    match self {
      #[cfg(feature = "read_image_file")]
      InputBuilder::ReadImageFile(builder) => {
        InputBuilder::ReadImageFile(builder.pixel_format(format))
      }
      #[cfg(feature = "gstreamer_input")]
      InputBuilder::GStreamerInput(builder) => {
        InputBuilder::GStreamerInput(builder.pixel_format(format))
      }
    }
  }

  /// 视频源逐帧输出，图像源只有一帧
  pub fn is_stream(&self) -> bool {
    match self {
      #[cfg(feature = "read_image_file")]
      InputBuilder::ReadImageFile(_) => false,
      #[cfg(feature = "gstreamer_input")]
      InputBuilder::GStreamerInput(_) => true,
    }
  }

  pub fn build(self) -> Result<InputWrapper, InputError> {
    match self {
      #[cfg(feature = "read_image_file")]
      InputBuilder::ReadImageFile(builder) => Ok(InputWrapper::ReadImageFile(builder.build()?)),
      #[cfg(feature = "gstreamer_input")]
      InputBuilder::GStreamerInput(builder) => Ok(InputWrapper::GStreamerInput(builder.build()?)),
    }
  }
}

pub enum InputWrapper {
  #[cfg(feature = "read_image_file")]
  ReadImageFile(ImageFileInput),
  #[cfg(feature = "gstreamer_input")]
  GStreamerInput(GStreamerInput),
}

impl Iterator for InputWrapper {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      #[cfg(feature = "read_image_file")]
      InputWrapper::ReadImageFile(input) => input.next(),
      #[cfg(feature = "gstreamer_input")]
      InputWrapper::GStreamerInput(input) => input.next(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_resolve_size_derives_width() {
    assert_eq!(resolve_size(300, 100, 0, 50), (150, 50));
  }

  #[test]
  fn test_resolve_size_derives_height() {
    assert_eq!(resolve_size(300, 100, 150, 0), (150, 50));
  }

  #[test]
  fn test_resolve_size_keeps_or_forces() {
    assert_eq!(resolve_size(300, 100, 0, 0), (300, 100));
    assert_eq!(resolve_size(300, 100, 64, 64), (64, 64));
  }

  #[test]
  fn test_resolve_size_truncates() {
    assert_eq!(resolve_size(640, 480, 320, 0), (320, 240));
    assert_eq!(resolve_size(1000, 333, 100, 0), (100, 33));
  }

  #[test]
  fn test_query_size() {
    let url = url::Url::parse("image:///tmp/a.jpg?width=320").unwrap();
    assert_eq!(query_size(&url), (320, 0));
    let url = url::Url::parse("gst://file/tmp/a.mp4?height=240&width=bad").unwrap();
    assert_eq!(query_size(&url), (0, 240));
  }
}
