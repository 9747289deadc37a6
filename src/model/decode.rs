// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/decode.rs - 检测结果解码
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use tracing::{debug, warn};

use crate::model::{DetectItem, LabelTable, RawDetections};

pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.5;

/// 检测结果解码器
///
/// 检测按置信度降序排列，遇到第一个低于阈值的置信度即停止扫描；
/// 类别 0 为背景，跳过但不停止。
#[derive(Debug, Clone, Copy)]
pub struct Decoder {
  threshold: f32,
}

impl Default for Decoder {
  fn default() -> Self {
    Self {
      threshold: DEFAULT_SCORE_THRESHOLD,
    }
  }
}

impl Decoder {
  pub fn with_threshold(threshold: f32) -> Self {
    Self { threshold }
  }

  pub fn threshold(&self) -> f32 {
    self.threshold
  }

  /// 解码为目标图像（`width` x `height`）像素坐标下的检测结果
  pub fn decode(
    &self,
    raw: &RawDetections,
    labels: &LabelTable,
    width: usize,
    height: usize,
  ) -> Box<[DetectItem]> {
    // 截断而非四舍五入
    let declared = raw.num_detections as usize;
    let available = raw
      .scores
      .len()
      .min(raw.classes.len())
      .min(raw.boxes.len() / 4);
    if declared > available {
      warn!(
        "模型声明 {} 个检测结果，但输出只包含 {} 个",
        declared, available
      );
    }

    let (w, h) = (width as f32, height as f32);
    let mut items = Vec::new();

    for i in 0..declared.min(available) {
      let score = raw.scores[i];
      if score < self.threshold {
        break;
      }

      let class_id = raw.classes[i] as i64;
      if class_id == 0 {
        continue;
      }
      let label = labels.label(class_id);

      let bbox = &raw.boxes[4 * i..4 * i + 4];
      let y_min = (bbox[0] * h) as i32;
      let x_min = (bbox[1] * w) as i32;
      let y_max = (bbox[2] * h) as i32;
      let x_max = (bbox[3] * w) as i32;

      debug!(
        "检测到 {} 置信度 {:.3} @[{},{}:{},{}]",
        label, score, x_min, y_min, x_max, y_max
      );

      items.push(DetectItem {
        class_id: class_id as u32,
        label: label.to_string(),
        score,
        bbox: [x_min, y_min, x_max, y_max],
      });
    }

    items.into_boxed_slice()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn labels() -> LabelTable {
    (1..=10).map(|i| format!("class-{}", i)).collect()
  }

  fn raw(classes: &[f32], scores: &[f32]) -> RawDetections {
    RawDetections {
      num_detections: scores.len() as f32,
      classes: classes.to_vec(),
      scores: scores.to_vec(),
      boxes: (0..scores.len())
        .flat_map(|i| {
          let v = i as f32 / 10.0;
          [v, v, v + 0.1, v + 0.1]
        })
        .collect(),
    }
  }

  #[test]
  fn test_stops_at_first_low_score() {
    let raw = raw(&[1.0, 2.0, 3.0, 4.0], &[0.9, 0.7, 0.4, 0.95]);
    let items = Decoder::default().decode(&raw, &labels(), 100, 100);
    let scores: Vec<f32> = items.iter().map(|item| item.score).collect();
    assert_eq!(scores, vec![0.9, 0.7]);
  }

  #[test]
  fn test_skips_background_without_stopping() {
    let raw = raw(&[0.0, 3.0, 5.0], &[0.9, 0.8, 0.7]);
    let items = Decoder::default().decode(&raw, &labels(), 100, 100);
    let classes: Vec<u32> = items.iter().map(|item| item.class_id).collect();
    assert_eq!(classes, vec![3, 5]);
    assert_eq!(items[0].label, "class-3");
    assert_eq!(items[1].label, "class-5");
    // 第 1、2 个检测框
    assert_eq!(items[0].bbox, [10, 10, 20, 20]);
  }

  #[test]
  fn test_box_denormalization() {
    let raw = RawDetections {
      num_detections: 1.0,
      classes: vec![1.0],
      scores: vec![0.8],
      boxes: vec![0.1, 0.2, 0.5, 0.8],
    };
    let items = Decoder::default().decode(&raw, &labels(), 200, 100);
    // [x_min, y_min, x_max, y_max]
    assert_eq!(items[0].bbox, [40, 10, 160, 50]);
  }

  #[test]
  fn test_count_and_class_are_truncated() {
    let mut raw = raw(&[2.9, 1.0, 1.0], &[0.9, 0.9, 0.9]);
    raw.num_detections = 2.99;
    let items = Decoder::default().decode(&raw, &labels(), 10, 10);
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].class_id, 2);
  }

  #[test]
  fn test_score_equal_to_threshold_is_kept() {
    let raw = raw(&[1.0], &[0.5]);
    assert_eq!(Decoder::default().decode(&raw, &labels(), 10, 10).len(), 1);
  }

  #[test]
  fn test_declared_count_beyond_outputs_is_clamped() {
    let mut raw = raw(&[1.0], &[0.9]);
    raw.num_detections = 100.0;
    assert_eq!(Decoder::default().decode(&raw, &labels(), 10, 10).len(), 1);
  }

  #[test]
  fn test_custom_threshold() {
    let raw = raw(&[1.0, 2.0], &[0.9, 0.6]);
    let items = Decoder::with_threshold(0.75).decode(&raw, &labels(), 10, 10);
    assert_eq!(items.len(), 1);
  }

  #[test]
  #[should_panic]
  fn test_label_mismatch_is_fatal() {
    let raw = raw(&[42.0], &[0.9]);
    Decoder::default().decode(&raw, &labels(), 10, 10);
  }
}
