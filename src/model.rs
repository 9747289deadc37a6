// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model.rs - 模型
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::time::{Duration, Instant};

use tracing::debug;

use crate::{
  frame::{Frame, PixelFormat},
  tensor::{ElementType, InputTensor, TensorCache, pack},
};

/// 检测数量输出节点
pub const NUM_DETECTIONS: &str = "num_detections";
/// 类别编号输出节点
pub const DETECTION_CLASSES: &str = "detection_classes";
/// 置信度输出节点
pub const DETECTION_SCORES: &str = "detection_scores";
/// 检测框输出节点，每个检测框为 [y_min, x_min, y_max, x_max]
pub const DETECTION_BOXES: &str = "detection_boxes";

pub const DETECTION_OUTPUT_NAMES: [&str; 4] = [
  NUM_DETECTIONS,
  DETECTION_CLASSES,
  DETECTION_SCORES,
  DETECTION_BOXES,
];

/// 输入形状未声明通道数时的默认值
pub const DEFAULT_INPUT_CHANNELS: usize = 3;

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 模型输入节点的描述，在模型加载时确定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSpec {
  pub name: String,
  pub element_type: ElementType,
  pub channels: usize,
}

impl InputSpec {
  pub fn pixel_format(&self) -> PixelFormat {
    PixelFormat::from_channels(self.channels)
  }
}

/// 推理引擎返回的四个原始输出
#[derive(Debug, Clone, Default)]
pub struct RawDetections {
  pub num_detections: f32,
  pub classes: Vec<f32>,
  pub scores: Vec<f32>,
  pub boxes: Vec<f32>,
}

/// 推理引擎：接收打包好的输入张量，返回四个命名输出
pub trait InferenceEngine {
  type Error;

  fn input_spec(&self) -> &InputSpec;
  fn run(&mut self, input: &InputTensor) -> Result<RawDetections, Self::Error>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectItem {
  pub class_id: u32,
  pub label: String,
  pub score: f32,
  pub bbox: [i32; 4], // [x_min, y_min, x_max, y_max]，原图像素坐标
}

#[derive(Debug, Clone)]
pub struct DetectResult {
  pub items: Box<[DetectItem]>,
  /// 打包与推理耗时
  pub elapsed: Duration,
}

impl DetectResult {
  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }
}

mod decode;
mod label;
pub use self::decode::{DEFAULT_SCORE_THRESHOLD, Decoder};
pub use self::label::{LabelError, LabelTable};

#[cfg(feature = "onnx_runtime")]
mod onnx;
#[cfg(feature = "onnx_runtime")]
pub use self::onnx::{OnnxModel, OnnxModelBuilder, OnnxModelError};

/// 检测器：张量缓存、推理引擎、解码器与标签表的组合
pub struct Detector<E> {
  engine: E,
  labels: LabelTable,
  cache: TensorCache,
  decoder: Decoder,
}

impl<E: InferenceEngine> Detector<E> {
  pub fn new(engine: E, labels: LabelTable) -> Self {
    let spec = engine.input_spec();
    let cache = TensorCache::new(spec.element_type, spec.channels);
    Self {
      engine,
      labels,
      cache,
      decoder: Decoder::default(),
    }
  }

  pub fn with_decoder(mut self, decoder: Decoder) -> Self {
    self.decoder = decoder;
    self
  }

  /// 输入源应当产生的像素格式
  pub fn pixel_format(&self) -> PixelFormat {
    self.engine.input_spec().pixel_format()
  }

  pub fn cache(&self) -> &TensorCache {
    &self.cache
  }
}

impl<E: InferenceEngine> Model for Detector<E> {
  type Input = Frame;
  type Output = DetectResult;
  type Error = E::Error;

  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let (width, height) = (input.width(), input.height());

    let now = Instant::now();
    debug!("打包输入张量: {}x{}", width, height);
    let tensor = self.cache.ensure(width, height);
    pack(&input.pixels(), tensor);

    debug!("执行模型推理");
    let raw = self.engine.run(tensor)?;
    let elapsed = now.elapsed();

    let items = self.decoder.decode(&raw, &self.labels, width, height);
    debug!("检测到 {} 个物体", items.len());

    Ok(DetectResult { items, elapsed })
  }
}
