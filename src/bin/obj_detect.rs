// 该文件是 Shanan （山南西风） 项目的一部分。
// src/bin/obj_detect.rs - 目标检测基准程序
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use shanan_bench::{
  FromUrl,
  input::InputBuilder,
  model::{Decoder, Detector, LabelTable, OnnxModelBuilder},
  output::{FrameSequenceOutput, OutputWrapper, SaveImageFileOutput, draw::Draw},
  task::{ContinuousTask, OneShotTask, Task},
};

/// 目标检测基准程序参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型地址，例如 onnx:///models/ssd_mobilenet.onnx
  #[arg(long, value_name = "MODEL")]
  pub model: Url,

  /// 标签文件，每行一个标签，第 i 行对应类别编号 i+1
  #[arg(long, value_name = "FILE")]
  pub labels: PathBuf,

  /// 输入来源
  /// - 图片: image:///path/to/image.jpg
  /// - 视频: gst://file/path/to/video.mp4
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 缩放宽度，0 表示按高度与宽高比推导
  #[arg(long, default_value = "320", value_name = "WIDTH")]
  pub width: u32,

  /// 缩放高度，0 表示按宽度与宽高比推导
  #[arg(long, default_value = "0", value_name = "HEIGHT")]
  pub height: u32,

  /// 输出路径；视频输入时作为帧序列前缀
  #[arg(long, value_name = "OUTPUT")]
  pub output: String,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.5", value_name = "THRESHOLD")]
  pub confidence: f32,

  /// 同时写出 JSON 检测记录
  #[arg(long)]
  pub record: bool,

  /// 标签字体文件 (TTF/OTF)，缺省时使用系统字体
  #[arg(long, value_name = "FONT")]
  pub font: Option<PathBuf>,

  /// 最大处理帧数（仅对视频有效）
  #[arg(long, value_name = "COUNT")]
  pub max_frames: Option<usize>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型地址: {}", args.model);
  info!("标签文件: {}", args.labels.display());
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);
  info!("置信度阈值: {}", args.confidence);

  let engine = OnnxModelBuilder::from_url(&args.model)?.build()?;
  let labels = LabelTable::from_file(&args.labels)?;
  info!("加载 {} 个标签", labels.len());
  let detector =
    Detector::new(engine, labels).with_decoder(Decoder::with_threshold(args.confidence));

  // URL 查询参数中的尺寸优先于命令行参数
  let mut builder = InputBuilder::from_url(&args.input)?;
  if !has_query_size(&args.input) {
    builder = builder.size(args.width, args.height);
  }
  let builder = builder.pixel_format(detector.pixel_format());
  let is_stream = builder.is_stream();
  let input = builder.build()?;

  let draw = match &args.font {
    Some(path) => Draw::default().with_font_file(path)?,
    None => Draw::default().with_system_font()?,
  };

  let summary = if is_stream {
    let output = OutputWrapper::FrameSequenceOutput(
      FrameSequenceOutput::new(args.output.clone(), draw).with_record(args.record),
    );
    ContinuousTask::new(args.output.clone())
      .with_frame_number(args.max_frames)
      .run_task(input, detector, output)?
  } else {
    let output = OutputWrapper::SaveImageFileOutput(
      SaveImageFileOutput::new(args.output.clone(), draw).with_record(args.record),
    );
    OneShotTask::new(args.output.clone()).run_task(input, detector, output)?
  };

  println!("{}", summary);

  Ok(())
}

fn has_query_size(url: &Url) -> bool {
  url
    .query_pairs()
    .any(|(key, _)| key == "width" || key == "height")
}

#[cfg(test)]
mod tests {
  use super::*;
  use clap::CommandFactory;

  #[test]
  fn test_args_are_consistent() {
    Args::command().debug_assert();
  }

  #[test]
  fn test_labels_help_maps_line_to_class_id() {
    let command = Args::command();
    let labels = command
      .get_arguments()
      .find(|arg| arg.get_id() == "labels")
      .unwrap();
    let help = labels.get_help().unwrap().to_string();
    assert!(help.contains("第 i 行对应类别编号 i+1"));
    assert!(!help.contains("背景"));
  }

  #[test]
  fn test_default_size_and_threshold() {
    let args = Args::try_parse_from([
      "obj-detect",
      "--model",
      "onnx:///m.onnx",
      "--labels",
      "labels.txt",
      "--input",
      "image:///a.jpg",
      "--output",
      "out.jpg",
    ])
    .unwrap();
    assert_eq!((args.width, args.height), (320, 0));
    assert_eq!(args.confidence, 0.5);
    assert!(args.font.is_none());
  }
}
