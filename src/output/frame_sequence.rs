// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/frame_sequence.rs - 逐帧图像序列输出
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, error};

use crate::{
  frame::Frame,
  model::DetectResult,
  output::{Render, draw::Draw},
};

#[derive(Error, Debug)]
pub enum FrameSequenceOutputError {
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 每帧写出一张 `<prefix>.<序号>.jpeg`，序号为 5 位帧号
pub struct FrameSequenceOutput {
  prefix: String,
  draw: Draw,
  record: bool,
}

impl FrameSequenceOutput {
  pub fn new(prefix: impl Into<String>, draw: Draw) -> Self {
    Self {
      prefix: prefix.into(),
      draw,
      record: false,
    }
  }

  pub fn with_record(mut self, record: bool) -> Self {
    self.record = record;
    self
  }

  pub fn frame_path(&self, index: usize) -> PathBuf {
    PathBuf::from(format!("{}.{:05}.jpeg", self.prefix, index))
  }
}

impl Render<Frame, DetectResult> for FrameSequenceOutput {
  type Error = FrameSequenceOutputError;

  fn render_result(&self, frame: &Frame, result: &DetectResult) -> Result<(), Self::Error> {
    let path = self.frame_path(frame.index());
    let image = self.draw.draw_detection(frame, result);
    image
      .save(&path)
      .inspect_err(|e| error!("无法保存第 {} 帧: {}", frame.index(), e))?;
    debug!("保存第 {} 帧到 {}", frame.index(), path.display());

    #[cfg(feature = "detection_record")]
    if self.record {
      crate::output::record::record(result, &path)?;
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::RgbImage;
  use std::time::Duration;

  #[test]
  fn test_frame_path_is_numbered() {
    let output = FrameSequenceOutput::new("out/street", Draw::default());
    assert_eq!(output.frame_path(1), PathBuf::from("out/street.00001.jpeg"));
    assert_eq!(output.frame_path(12345), PathBuf::from("out/street.12345.jpeg"));
  }

  #[test]
  fn test_writes_one_file_per_frame() {
    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("clip");
    let output = FrameSequenceOutput::new(prefix.to_string_lossy(), Draw::default());
    let result = DetectResult {
      items: Box::new([]),
      elapsed: Duration::ZERO,
    };

    for index in 1..=2 {
      let frame = Frame::from_rgb_image(index, RgbImage::new(4, 4));
      output.render_result(&frame, &result).unwrap();
    }

    assert!(dir.path().join("clip.00001.jpeg").exists());
    assert!(dir.path().join("clip.00002.jpeg").exists());
  }
}
