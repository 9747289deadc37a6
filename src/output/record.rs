// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/record.rs - 检测结果记录
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::Path;

use serde_json::{Value, json};

use crate::model::DetectResult;

pub fn to_json(result: &DetectResult) -> Value {
  let detections: Vec<Value> = result
    .items
    .iter()
    .map(|item| {
      json!({
        "label": item.label,
        "class_id": item.class_id,
        "score": item.score,
        "bbox": item.bbox,
      })
    })
    .collect();

  json!({
    "elapsed_ms": result.elapsed.as_millis() as u64,
    "detections": detections,
  })
}

/// 在图像旁写出同名的 `.json` 记录
pub fn record(result: &DetectResult, path: &Path) -> Result<(), std::io::Error> {
  let content = serde_json::to_string_pretty(&to_json(result))?;
  std::fs::write(path.with_extension("json"), content)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::DetectItem;
  use std::time::Duration;

  #[test]
  fn test_record_beside_image() {
    let dir = tempfile::tempdir().unwrap();
    let result = DetectResult {
      items: vec![DetectItem {
        class_id: 18,
        label: "dog".to_string(),
        score: 0.75,
        bbox: [1, 2, 3, 4],
      }]
      .into_boxed_slice(),
      elapsed: Duration::from_millis(12),
    };

    record(&result, &dir.path().join("out.00003.jpeg")).unwrap();

    let content = std::fs::read_to_string(dir.path().join("out.00003.json")).unwrap();
    let value: Value = serde_json::from_str(&content).unwrap();
    assert_eq!(value["elapsed_ms"], 12);
    assert_eq!(value["detections"][0]["label"], "dog");
    assert_eq!(value["detections"][0]["bbox"], json!([1, 2, 3, 4]));
  }
}
