// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use image::{DynamicImage, ImageReader, imageops::FilterType};
use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{Frame, PixelFormat},
  input::{query_size, resolve_size},
};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
}

pub struct ImageFileInputBuilder {
  path: String,
  width: u32,
  height: u32,
  format: PixelFormat,
}

impl FromUrlWithScheme for ImageFileInputBuilder {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInputBuilder {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch);
    }

    let (width, height) = query_size(url);
    Ok(Self::new(url.path()).size(width, height))
  }
}

impl ImageFileInputBuilder {
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

  pub fn build(self) -> Result<ImageFileInput, ImageFileInputError> {
    info!("读取图像文件: {}", self.path);
    let image = ImageReader::open(&self.path)
      .inspect_err(|e| error!("无法打开图像 {}: {}", self.path, e))?
      .decode()
      .inspect_err(|e| error!("无法解码图像 {}: {}", self.path, e))?;

    let frame = self.prepare(image);
    info!("图像尺寸: {}x{}", frame.width(), frame.height());
    Ok(ImageFileInput { frame: Some(frame) })
  }

  /// 按需缩放并转换为目标像素格式
  fn prepare(&self, image: DynamicImage) -> Frame {
    let image = if self.width != 0 || self.height != 0 {
      let (width, height) = resolve_size(image.width(), image.height(), self.width, self.height);
      image.resize_exact(width, height, FilterType::Triangle)
    } else {
      image
    };

    match self.format {
      PixelFormat::Rgb24 => Frame::from_rgb_image(1, image.to_rgb8()),
      PixelFormat::Gray8 => Frame::from_gray_image(1, image.to_luma8()),
    }
  }
}

/// 只产生一帧的图像输入
pub struct ImageFileInput {
  frame: Option<Frame>,
}

impl Iterator for ImageFileInput {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    self.frame.take()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{Rgb, RgbImage};

  fn source() -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(300, 100, Rgb([10, 20, 30])))
  }

  #[test]
  fn test_from_url_reads_query_size() {
    let url = Url::parse("image:///data/dog.jpg?width=0&height=50").unwrap();
    let builder = ImageFileInputBuilder::from_url(&url).unwrap();
    assert_eq!(builder.path, "/data/dog.jpg");
    assert_eq!((builder.width, builder.height), (0, 50));
  }

  #[test]
  fn test_scheme_mismatch() {
    let url = Url::parse("gst://file/data/dog.mp4").unwrap();
    assert!(matches!(
      ImageFileInputBuilder::from_url(&url),
      Err(ImageFileInputError::SchemaMismatch)
    ));
  }

  #[test]
  fn test_prepare_keeps_aspect_ratio() {
    let frame = ImageFileInputBuilder::new("x").size(0, 50).prepare(source());
    assert_eq!((frame.width(), frame.height()), (150, 50));

    let frame = ImageFileInputBuilder::new("x").size(150, 0).prepare(source());
    assert_eq!((frame.width(), frame.height()), (150, 50));
  }

  #[test]
  fn test_prepare_without_resize() {
    let frame = ImageFileInputBuilder::new("x").prepare(source());
    assert_eq!((frame.width(), frame.height()), (300, 100));
    assert_eq!(frame.format(), PixelFormat::Rgb24);
    assert_eq!(&frame.pixels().row(0)[..3], &[10, 20, 30]);
  }

  #[test]
  fn test_prepare_gray() {
    let frame = ImageFileInputBuilder::new("x")
      .pixel_format(PixelFormat::Gray8)
      .prepare(source());
    assert_eq!(frame.format(), PixelFormat::Gray8);
    assert_eq!(frame.pixels().stride(), 300);
  }

  #[test]
  fn test_build_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("in.png");
    RgbImage::from_pixel(4, 2, Rgb([1, 2, 3])).save(&path).unwrap();

    let mut input = ImageFileInputBuilder::new(path.to_string_lossy())
      .build()
      .unwrap();
    let frame = input.next().unwrap();
    assert_eq!(frame.index(), 1);
    assert_eq!((frame.width(), frame.height()), (4, 2));
    assert!(input.next().is_none());
  }

  #[test]
  fn test_build_missing_file() {
    let result = ImageFileInputBuilder::new("/nonexistent/in.png").build();
    assert!(matches!(result, Err(ImageFileInputError::IoError(_))));
  }
}
