// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/label.rs - 标签表
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::{
  fs::File,
  io::{BufRead, BufReader},
  path::Path,
};

use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum LabelError {
  #[error("无法读取标签文件 {path}: {source}")]
  IoError {
    path: String,
    source: std::io::Error,
  },
}

/// 标签表，第 i 行对应类别编号 i + 1
#[derive(Debug, Clone, Default)]
pub struct LabelTable {
  labels: Box<[String]>,
}

impl LabelTable {
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LabelError> {
    let path = path.as_ref();
    let io_error = |source| LabelError::IoError {
      path: path.display().to_string(),
      source,
    };

    let file = File::open(path).map_err(io_error)?;
    let table = Self::from_reader(BufReader::new(file)).map_err(io_error)?;
    info!("从 {} 读取 {} 个标签", path.display(), table.len());
    Ok(table)
  }

  pub fn from_reader<R: BufRead>(reader: R) -> std::io::Result<Self> {
    reader.lines().collect::<Result<Vec<_>, _>>().map(|labels| Self {
      labels: labels.into_boxed_slice(),
    })
  }

  pub fn len(&self) -> usize {
    self.labels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }

  /// 按类别编号查找标签
  ///
  /// 编号超出范围说明标签文件与模型不匹配，直接终止。
  pub fn label(&self, class_id: i64) -> &str {
    usize::try_from(class_id - 1)
      .ok()
      .and_then(|index| self.labels.get(index))
      .unwrap_or_else(|| {
        panic!(
          "类别编号 {} 超出标签表范围（共 {} 个标签），标签文件与模型不匹配",
          class_id,
          self.labels.len()
        )
      })
  }
}

impl<S: Into<String>> FromIterator<S> for LabelTable {
  fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
    Self {
      labels: iter.into_iter().map(Into::into).collect(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  #[test]
  fn test_labels_are_one_indexed() {
    let table = LabelTable::from_reader("person\nbicycle\ncar\n".as_bytes()).unwrap();
    assert_eq!(table.len(), 3);
    assert_eq!(table.label(1), "person");
    assert_eq!(table.label(3), "car");
  }

  #[test]
  fn test_crlf_lines() {
    let table = LabelTable::from_reader("person\r\ncar".as_bytes()).unwrap();
    assert_eq!(table.label(2), "car");
  }

  #[test]
  #[should_panic]
  fn test_out_of_range_class_is_fatal() {
    let table: LabelTable = ["person"].into_iter().collect();
    table.label(2);
  }

  #[test]
  #[should_panic]
  fn test_negative_class_is_fatal() {
    let table: LabelTable = ["person"].into_iter().collect();
    table.label(-1);
  }

  #[test]
  fn test_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "???").unwrap();
    writeln!(file, "person").unwrap();
    let table = LabelTable::from_file(file.path()).unwrap();
    assert_eq!(table.label(2), "person");
  }

  #[test]
  fn test_missing_file_is_reported() {
    let err = LabelTable::from_file("/nonexistent/labels.txt").unwrap_err();
    assert!(matches!(err, LabelError::IoError { .. }));
  }
}
