// 该文件是 Shanan （山南西风） 项目的一部分。
// src/frame.rs - 像素缓冲区与帧定义
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

use image::{GrayImage, ImageBuffer, Rgb, RgbImage};
use thiserror::Error;

/// 输入帧的像素格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
  /// RGB 交错排列，每像素 3 字节
  Rgb24,
  /// 灰度，每像素 1 字节
  Gray8,
}

impl PixelFormat {
  pub const fn channels(self) -> usize {
    match self {
      PixelFormat::Rgb24 => 3,
      PixelFormat::Gray8 => 1,
    }
  }

  /// 根据模型输入的通道数选择像素格式，只支持 3 通道和 1 通道
  pub fn from_channels(channels: usize) -> Self {
    match channels {
      3 => PixelFormat::Rgb24,
      1 => PixelFormat::Gray8,
      _ => panic!("不支持的输入通道数: {}", channels),
    }
  }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
  #[error("行跨度过小: 跨度 {stride} 字节, 行长度 {row_len} 字节")]
  StrideTooSmall { stride: usize, row_len: usize },
  #[error("缓冲区长度不足: 期望至少 {expected} 字节, 实际 {actual} 字节")]
  BufferTooSmall { expected: usize, actual: usize },
}

/// 借用的像素缓冲区视图，行之间可能带有填充
#[derive(Debug, Clone, Copy)]
pub struct PixelBuffer<'a> {
  width: usize,
  height: usize,
  format: PixelFormat,
  stride: usize,
  data: &'a [u8],
}

impl<'a> PixelBuffer<'a> {
  pub fn new(
    width: usize,
    height: usize,
    format: PixelFormat,
    stride: usize,
    data: &'a [u8],
  ) -> Result<Self, FrameError> {
    let row_len = width * format.channels();
    if stride < row_len {
      return Err(FrameError::StrideTooSmall { stride, row_len });
    }

    // 最后一行之后不要求存在填充
    let expected = match height {
      0 => 0,
      h => stride * (h - 1) + row_len,
    };
    if data.len() < expected {
      return Err(FrameError::BufferTooSmall {
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      width,
      height,
      format,
      stride,
      data,
    })
  }

  /// 紧密排列（无行填充）的缓冲区
  pub fn packed(
    width: usize,
    height: usize,
    format: PixelFormat,
    data: &'a [u8],
  ) -> Result<Self, FrameError> {
    Self::new(width, height, format, width * format.channels(), data)
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn format(&self) -> PixelFormat {
    self.format
  }

  pub fn stride(&self) -> usize {
    self.stride
  }

  pub fn channels(&self) -> usize {
    self.format.channels()
  }

  /// 一行有效像素的字节数，不含填充
  pub fn row_len(&self) -> usize {
    self.width * self.channels()
  }

  pub fn row(&self, y: usize) -> &'a [u8] {
    let start = y * self.stride;
    &self.data[start..start + self.row_len()]
  }

  pub fn rows(&self) -> impl Iterator<Item = &'a [u8]> + '_ {
    (0..self.height).map(move |y| self.row(y))
  }

  /// 拷贝为紧密排列的 RGB 图像，灰度像素扩展到三个通道
  pub fn to_rgb_image(&self) -> RgbImage {
    ImageBuffer::from_fn(self.width as u32, self.height as u32, |x, y| {
      let row = self.row(y as usize);
      let x = x as usize;
      match self.format {
        PixelFormat::Rgb24 => Rgb([row[x * 3], row[x * 3 + 1], row[x * 3 + 2]]),
        PixelFormat::Gray8 => Rgb([row[x], row[x], row[x]]),
      }
    })
  }
}

/// 帧数据的存储方式
pub enum FrameData {
  Owned(Vec<u8>),
  #[cfg(feature = "gstreamer_input")]
  Mapped(gstreamer::MappedBuffer<gstreamer::buffer::Readable>),
}

impl AsRef<[u8]> for FrameData {
  fn as_ref(&self) -> &[u8] {
    match self {
      FrameData::Owned(data) => data,
      #[cfg(feature = "gstreamer_input")]
      FrameData::Mapped(map) => map.as_slice(),
    }
  }
}

/// 输入源产生的一帧图像
pub struct Frame {
  index: usize,
  width: usize,
  height: usize,
  format: PixelFormat,
  stride: usize,
  data: FrameData,
}

impl Frame {
  pub fn new(
    index: usize,
    width: usize,
    height: usize,
    format: PixelFormat,
    stride: usize,
    data: FrameData,
  ) -> Result<Self, FrameError> {
    PixelBuffer::new(width, height, format, stride, data.as_ref())?;
    Ok(Self {
      index,
      width,
      height,
      format,
      stride,
      data,
    })
  }

  pub fn from_rgb_image(index: usize, image: RgbImage) -> Self {
    let (width, height) = image.dimensions();
    Self {
      index,
      width: width as usize,
      height: height as usize,
      format: PixelFormat::Rgb24,
      stride: width as usize * 3,
      data: FrameData::Owned(image.into_raw()),
    }
  }

  pub fn from_gray_image(index: usize, image: GrayImage) -> Self {
    let (width, height) = image.dimensions();
    Self {
      index,
      width: width as usize,
      height: height as usize,
      format: PixelFormat::Gray8,
      stride: width as usize,
      data: FrameData::Owned(image.into_raw()),
    }
  }

  /// 帧序号，从 1 开始
  pub fn index(&self) -> usize {
    self.index
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn format(&self) -> PixelFormat {
    self.format
  }

  pub fn pixels(&self) -> PixelBuffer<'_> {
    // 构造时已校验
    PixelBuffer {
      width: self.width,
      height: self.height,
      format: self.format,
      stride: self.stride,
      data: self.data.as_ref(),
    }
  }
}
