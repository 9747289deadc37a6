// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/onnx.rs - ONNX Runtime 推理引擎
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use ort::{session::Session, tensor::TensorElementType, value::TensorRef};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{
    DEFAULT_INPUT_CHANNELS, DETECTION_BOXES, DETECTION_CLASSES, DETECTION_OUTPUT_NAMES,
    DETECTION_SCORES, InferenceEngine, InputSpec, NUM_DETECTIONS, RawDetections,
  },
  tensor::{ElementType, InputTensor, TensorData},
};

#[derive(Error, Debug)]
pub enum OnnxModelError {
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] std::io::Error),
  #[error("创建推理会话失败: {0}")]
  SessionError(String),
  #[error("ONNX Runtime 错误: {0}")]
  OrtError(#[from] ort::Error),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("模型没有输入节点")]
  NoInput,
  #[error("输入节点 {0} 没有声明元素类型")]
  InputWithoutType(String),
  #[error("模型缺少输出节点 {0}")]
  MissingOutput(&'static str),
}

impl OnnxModelError {
  fn session(e: impl std::fmt::Display) -> Self {
    OnnxModelError::SessionError(e.to_string())
  }
}

pub struct OnnxModelBuilder {
  model_path: String,
  intra_threads: usize,
  inter_threads: usize,
}

impl FromUrlWithScheme for OnnxModelBuilder {
  const SCHEME: &'static str = "onnx";
}

impl FromUrl for OnnxModelBuilder {
  type Error = OnnxModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(OnnxModelError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    Ok(Self::new(url.path()))
  }
}

impl OnnxModelBuilder {
  /// 默认单线程执行，保证每帧耗时可比
  pub fn new(model_path: impl Into<String>) -> Self {
    Self {
      model_path: model_path.into(),
      intra_threads: 1,
      inter_threads: 1,
    }
  }

  pub fn threads(mut self, intra_threads: usize, inter_threads: usize) -> Self {
    self.intra_threads = intra_threads;
    self.inter_threads = inter_threads;
    self
  }

  pub fn build(self) -> Result<OnnxModel, OnnxModelError> {
    info!("加载模型文件: {}", self.model_path);
    let model_data = std::fs::read(&self.model_path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      model_data.len() as f64 / (1024.0 * 1024.0)
    );

    info!(
      "创建 ONNX Runtime 推理会话 (intra={}, inter={})",
      self.intra_threads, self.inter_threads
    );
    let session = Session::builder()
      .map_err(OnnxModelError::session)?
      .with_intra_threads(self.intra_threads)
      .map_err(OnnxModelError::session)?
      .with_inter_threads(self.inter_threads)
      .map_err(OnnxModelError::session)?
      .commit_from_memory(&model_data)
      .map_err(OnnxModelError::session)?;

    let input_spec = resolve_input(&session)?;
    info!(
      "使用输入节点: {} ({:?}, {} 通道)",
      input_spec.name, input_spec.element_type, input_spec.channels
    );

    for name in DETECTION_OUTPUT_NAMES {
      if !session.outputs.iter().any(|output| output.name == name) {
        error!("模型缺少输出节点: {}", name);
        return Err(OnnxModelError::MissingOutput(name));
      }
    }
    info!("模型加载完成");

    Ok(OnnxModel {
      session,
      input_spec,
    })
  }
}

/// 取第一个输入节点，解析元素类型与通道数
fn resolve_input(session: &Session) -> Result<InputSpec, OnnxModelError> {
  let input = session.inputs.first().ok_or_else(|| {
    error!("模型没有输入节点");
    OnnxModelError::NoInput
  })?;
  if session.inputs.len() > 1 {
    warn!(
      "模型有 {} 个输入节点，使用第一个: {}",
      session.inputs.len(),
      input.name
    );
  }

  let ty = input.input_type.tensor_type().ok_or_else(|| {
    error!("输入节点 {} 没有声明元素类型", input.name);
    OnnxModelError::InputWithoutType(input.name.clone())
  })?;
  let element_type = match ty {
    TensorElementType::Float32 => ElementType::Float32,
    TensorElementType::Uint8 => ElementType::UInt8,
    other => panic!("不支持的输入元素类型: {:?}", other),
  };

  // NHWC 形状的第 4 维为通道数，未声明或为动态维度时使用默认值
  let channels = input
    .input_type
    .tensor_shape()
    .and_then(|shape| shape.get(3).copied())
    .filter(|&channels| channels > 0)
    .map(|channels| channels as usize)
    .unwrap_or(DEFAULT_INPUT_CHANNELS);

  Ok(InputSpec {
    name: input.name.clone(),
    element_type,
    channels,
  })
}

pub struct OnnxModel {
  session: Session,
  input_spec: InputSpec,
}

impl InferenceEngine for OnnxModel {
  type Error = OnnxModelError;

  fn input_spec(&self) -> &InputSpec {
    &self.input_spec
  }

  fn run(&mut self, input: &InputTensor) -> Result<RawDetections, Self::Error> {
    let shape: Vec<i64> = input.shape().iter().map(|&d| d as i64).collect();
    let name = self.input_spec.name.as_str();

    let outputs = match input.data() {
      TensorData::Float32(data) => {
        let tensor = TensorRef::from_array_view((shape, &data[..]))?;
        self.session.run(ort::inputs![name => tensor])?
      }
      TensorData::UInt8(data) => {
        let tensor = TensorRef::from_array_view((shape, &data[..]))?;
        self.session.run(ort::inputs![name => tensor])?
      }
    };

    let extract = |name: &'static str| -> Result<Vec<f32>, OnnxModelError> {
      let value = outputs
        .get(name)
        .ok_or(OnnxModelError::MissingOutput(name))?;
      let (_, data) = value.try_extract_tensor::<f32>()?;
      Ok(data.to_vec())
    };

    Ok(RawDetections {
      num_detections: extract(NUM_DETECTIONS)?.first().copied().unwrap_or(0.0),
      classes: extract(DETECTION_CLASSES)?,
      scores: extract(DETECTION_SCORES)?,
      boxes: extract(DETECTION_BOXES)?,
    })
  }
}
