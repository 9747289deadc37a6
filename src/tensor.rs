// 该文件是 Shanan （山南西风） 项目的一部分。
// src/tensor.rs - NHWC 输入张量与形状缓存
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

use tracing::debug;

mod pack;
pub use self::pack::pack;

/// 浮点输入的归一化常数，结果落在 [0, 1) 区间
pub const NORMALIZATION: f32 = 256.0;

/// 模型输入支持的元素类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
  Float32,
  UInt8,
}

/// 输入张量元素，每种元素类型对应一个字节转换函数
pub trait Element: Copy + Default {
  const ELEMENT_TYPE: ElementType;

  fn from_byte(byte: u8) -> Self;

  fn pack_row(src: &[u8], dst: &mut [Self]) {
    for (d, &s) in dst.iter_mut().zip(src) {
      *d = Self::from_byte(s);
    }
  }
}

impl Element for f32 {
  const ELEMENT_TYPE: ElementType = ElementType::Float32;

  fn from_byte(byte: u8) -> Self {
    byte as f32 / NORMALIZATION
  }
}

impl Element for u8 {
  const ELEMENT_TYPE: ElementType = ElementType::UInt8;

  fn from_byte(byte: u8) -> Self {
    byte
  }

  fn pack_row(src: &[u8], dst: &mut [Self]) {
    dst.copy_from_slice(src);
  }
}

#[derive(Debug, Clone)]
pub enum TensorData {
  Float32(Box<[f32]>),
  UInt8(Box<[u8]>),
}

/// 形状为 (1, H, W, C) 的输入张量
#[derive(Debug, Clone)]
pub struct InputTensor {
  height: usize,
  width: usize,
  channels: usize,
  data: TensorData,
}

impl InputTensor {
  pub fn zeros(element_type: ElementType, height: usize, width: usize, channels: usize) -> Self {
    let size = height * width * channels;
    let data = match element_type {
      ElementType::Float32 => TensorData::Float32(vec![0f32; size].into_boxed_slice()),
      ElementType::UInt8 => TensorData::UInt8(vec![0u8; size].into_boxed_slice()),
    };
    Self {
      height,
      width,
      channels,
      data,
    }
  }

  pub fn shape(&self) -> [usize; 4] {
    [1, self.height, self.width, self.channels]
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn channels(&self) -> usize {
    self.channels
  }

  pub fn element_type(&self) -> ElementType {
    match self.data {
      TensorData::Float32(_) => ElementType::Float32,
      TensorData::UInt8(_) => ElementType::UInt8,
    }
  }

  pub fn data(&self) -> &TensorData {
    &self.data
  }

  pub fn data_mut(&mut self) -> &mut TensorData {
    &mut self.data
  }

  pub fn as_f32(&self) -> Option<&[f32]> {
    match &self.data {
      TensorData::Float32(data) => Some(data),
      TensorData::UInt8(_) => None,
    }
  }

  pub fn as_u8(&self) -> Option<&[u8]> {
    match &self.data {
      TensorData::UInt8(data) => Some(data),
      TensorData::Float32(_) => None,
    }
  }
}

/// 输入张量缓存
///
/// 元素类型与通道数在模型加载时确定，只有当请求的宽高发生变化时才重新分配张量，
/// 视频流中每帧尺寸相同，因此整个流只分配一次。
#[derive(Debug)]
pub struct TensorCache {
  element_type: ElementType,
  channels: usize,
  tensor: Option<InputTensor>,
  allocations: usize,
}

impl TensorCache {
  pub fn new(element_type: ElementType, channels: usize) -> Self {
    Self {
      element_type,
      channels,
      tensor: None,
      allocations: 0,
    }
  }

  pub fn element_type(&self) -> ElementType {
    self.element_type
  }

  pub fn channels(&self) -> usize {
    self.channels
  }

  /// 迄今为止分配张量的次数
  pub fn allocations(&self) -> usize {
    self.allocations
  }

  /// 返回形状为 (1, height, width, channels) 的张量，内容由调用方全部覆盖
  pub fn ensure(&mut self, width: usize, height: usize) -> &mut InputTensor {
    let tensor = match self.tensor.take() {
      Some(tensor) if tensor.height == height && tensor.width == width => tensor,
      _ => {
        debug!(
          "分配输入张量: [1, {}, {}, {}] {:?}",
          height, width, self.channels, self.element_type
        );
        self.allocations += 1;
        InputTensor::zeros(self.element_type, height, width, self.channels)
      }
    };
    self.tensor.insert(tensor)
  }
}
