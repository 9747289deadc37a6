// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_hollow_rect_mut, draw_text_mut},
  rect::Rect,
};
use thiserror::Error;
use tracing::info;

use crate::{
  frame::Frame,
  model::{DetectItem, DetectResult},
};

const BOX_COLOR: [u8; 3] = [255, 0, 0]; // 红色
const BOX_THICKNESS: i32 = 3;
const LABEL_COLOR: [u8; 3] = [30, 255, 10]; // 绿色
const LABEL_FONT_SIZE: f32 = 14.0;
// 标签底边与检测框上边的距离
const LABEL_OFFSET: i32 = 5;

/// 未指定字体文件时依次尝试的系统字体
pub const SYSTEM_FONT_PATHS: [&str; 5] = [
  "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/TTF/DejaVuSans.ttf",
  "/usr/share/fonts/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
  "/Library/Fonts/Arial Unicode.ttf",
];

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("无法读取字体文件: {0}")]
  IoError(#[from] std::io::Error),
  #[error("字体文件无效: {0}")]
  InvalidFont(#[from] ab_glyph::InvalidFont),
  #[error("找不到可用的字体文件，请通过 --font 指定")]
  FontNotFound,
}

/// 在图像上绘制检测框与标签
///
/// `Draw::default()` 不带字体，只绘制检测框；程序入口总会加载字体。
pub struct Draw {
  font: Option<FontVec>,
  font_size: f32,
  box_color: [u8; 3],
  box_thickness: i32,
  label_color: [u8; 3],
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      font: None,
      font_size: LABEL_FONT_SIZE,
      box_color: BOX_COLOR,
      box_thickness: BOX_THICKNESS,
      label_color: LABEL_COLOR,
    }
  }
}

impl Draw {
  pub fn with_font_file(mut self, path: impl AsRef<Path>) -> Result<Self, DrawError> {
    let data = std::fs::read(path.as_ref())?;
    self.font = Some(FontVec::try_from_vec(data)?);
    info!("加载标签字体: {}", path.as_ref().display());
    Ok(self)
  }

  /// 使用候选列表中第一个存在的字体文件
  pub fn with_first_font<P: AsRef<Path>>(self, candidates: &[P]) -> Result<Self, DrawError> {
    let path = candidates
      .iter()
      .map(|path| -> &Path { path.as_ref() })
      .find(|path| path.is_file())
      .ok_or(DrawError::FontNotFound)?;
    self.with_font_file(path)
  }

  pub fn with_system_font(self) -> Result<Self, DrawError> {
    self.with_first_font(&SYSTEM_FONT_PATHS)
  }

  pub fn has_font(&self) -> bool {
    self.font.is_some()
  }

  /// 拷贝帧并绘制检测结果
  pub fn draw_detection(&self, frame: &Frame, result: &DetectResult) -> RgbImage {
    let mut image = frame.pixels().to_rgb_image();
    self.draw_detections_on_image(&mut image, result);
    image
  }

  pub fn draw_detections_on_image(&self, image: &mut RgbImage, result: &DetectResult) {
    for item in result.items.iter() {
      self.draw_bbox(image, item);
      if let Some(font) = &self.font {
        self.draw_label(image, item, font);
      }
    }
  }

  // 越界部分由 imageproc 裁剪
  fn draw_bbox(&self, image: &mut RgbImage, item: &DetectItem) {
    let [x0, y0, x1, y1] = item.bbox;
    let (x_min, x_max) = (x0.min(x1), x0.max(x1));
    let (y_min, y_max) = (y0.min(y1), y0.max(y1));

    let half = self.box_thickness / 2;
    for offset in -half..=(self.box_thickness - 1 - half) {
      let width = (x_max - x_min + 2 * offset + 1).max(1) as u32;
      let height = (y_max - y_min + 2 * offset + 1).max(1) as u32;
      let rect = Rect::at(x_min - offset, y_min - offset).of_size(width, height);
      draw_hollow_rect_mut(image, rect, Rgb(self.box_color));
    }
  }

  fn draw_label(&self, image: &mut RgbImage, item: &DetectItem, font: &FontVec) {
    let label = format!("{} {:.2}", item.label, item.score);
    let x = item.bbox[0].min(item.bbox[2]);
    let y = item.bbox[1].min(item.bbox[3]) - LABEL_OFFSET - self.font_size as i32;
    draw_text_mut(
      image,
      Rgb(self.label_color),
      x,
      y,
      PxScale::from(self.font_size),
      font,
      &label,
    );
  }
}
