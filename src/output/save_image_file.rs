// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/save_image_file.rs - 保存图像文件
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

use std::path::Path;

use thiserror::Error;
use tracing::{error, info};

use crate::{
  frame::Frame,
  model::DetectResult,
  output::{Render, draw::Draw},
};

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
}

/// 把标注后的单张图像写入文件，格式由扩展名决定
pub struct SaveImageFileOutput {
  path: String,
  draw: Draw,
  record: bool,
}

impl SaveImageFileOutput {
  pub fn new(path: impl Into<String>, draw: Draw) -> Self {
    Self {
      path: path.into(),
      draw,
      record: false,
    }
  }

  /// 同时写出 JSON 检测记录
  pub fn with_record(mut self, record: bool) -> Self {
    self.record = record;
    self
  }

  fn save_image(&self, image: image::RgbImage) -> Result<(), SaveImageFileError> {
    let path = Path::new(&self.path);
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    image
      .save(path)
      .inspect_err(|e| error!("无法保存图像 {}: {}", self.path, e))?;
    info!("保存图像到文件: {}", self.path);

    Ok(())
  }
}

impl Render<Frame, DetectResult> for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_result(&self, frame: &Frame, result: &DetectResult) -> Result<(), Self::Error> {
    let image = self.draw.draw_detection(frame, result);
    self.save_image(image)?;

    #[cfg(feature = "detection_record")]
    if self.record {
      crate::output::record::record(result, Path::new(&self.path))?;
    }

    Ok(())
  }
}
