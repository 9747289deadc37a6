// 该文件是 Shanan （山南西风） 项目的一部分。
// src/tensor/pack.rs - 像素到输入张量的打包
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

use crate::{
  frame::PixelBuffer,
  tensor::{Element, InputTensor, TensorData},
};

/// 将像素缓冲区写入输入张量
///
/// 源缓冲区按自身的行跨度前进，每行只读取 `width * channels` 字节，
/// 目标张量的行总是紧密排列。通道顺序由调用方保证。
pub fn pack(src: &PixelBuffer<'_>, dst: &mut InputTensor) {
  assert_eq!(
    src.channels(),
    dst.channels(),
    "像素通道数 {} 与模型输入通道数 {} 不一致",
    src.channels(),
    dst.channels()
  );
  assert_eq!(
    (src.height(), src.width()),
    (dst.height(), dst.width()),
    "像素尺寸与输入张量尺寸不一致"
  );

  match dst.data_mut() {
    TensorData::Float32(data) => pack_rows(src, data),
    TensorData::UInt8(data) => pack_rows(src, data),
  }
}

fn pack_rows<T: Element>(src: &PixelBuffer<'_>, dst: &mut [T]) {
  let row_len = src.row_len();
  if row_len == 0 {
    return;
  }
  for (src_row, dst_row) in src.rows().zip(dst.chunks_exact_mut(row_len)) {
    T::pack_row(src_row, dst_row);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    frame::PixelFormat,
    tensor::{ElementType, TensorCache},
  };

  // 2x3 RGB，每行 6 字节有效数据加 2 字节填充
  const PADDED_RGB: [u8; 24] = [
    0, 1, 2, 3, 4, 5, 0xEE, 0xEE, //
    128, 129, 130, 131, 132, 133, 0xEE, 0xEE, //
    250, 251, 252, 253, 254, 255, 0xEE, 0xEE,
  ];

  fn expected_rows() -> Vec<u8> {
    PADDED_RGB
      .chunks(8)
      .flat_map(|row| row[..6].to_vec())
      .collect()
  }

  #[test]
  fn test_pack_uint8_skips_padding() {
    let src = PixelBuffer::new(2, 3, PixelFormat::Rgb24, 8, &PADDED_RGB).unwrap();
    let mut cache = TensorCache::new(ElementType::UInt8, 3);
    let tensor = cache.ensure(2, 3);
    pack(&src, tensor);
    assert_eq!(tensor.as_u8().unwrap(), expected_rows().as_slice());
  }

  #[test]
  fn test_pack_float32_divides_by_256() {
    let src = PixelBuffer::new(2, 3, PixelFormat::Rgb24, 8, &PADDED_RGB).unwrap();
    let mut cache = TensorCache::new(ElementType::Float32, 3);
    let tensor = cache.ensure(2, 3);
    pack(&src, tensor);

    let data = tensor.as_f32().unwrap();
    let expected: Vec<f32> = expected_rows().iter().map(|&b| b as f32 / 256.0).collect();
    assert_eq!(data, expected.as_slice());
    assert_eq!(data[6], 0.5);
    assert_eq!(data[17], 0.99609375);
  }

  #[test]
  fn test_pack_overwrites_reused_tensor() {
    let mut cache = TensorCache::new(ElementType::UInt8, 1);

    let first = [9u8; 4];
    let src = PixelBuffer::packed(2, 2, PixelFormat::Gray8, &first).unwrap();
    pack(&src, cache.ensure(2, 2));

    let second = [1, 2, 0, 3, 4];
    let src = PixelBuffer::new(2, 2, PixelFormat::Gray8, 3, &second).unwrap();
    let tensor = cache.ensure(2, 2);
    pack(&src, tensor);

    assert_eq!(tensor.as_u8().unwrap(), &[1, 2, 3, 4]);
    assert_eq!(cache.allocations(), 1);
  }

  #[test]
  fn test_pack_gray_float32() {
    let data = [0u8, 64, 128, 255];
    let src = PixelBuffer::packed(4, 1, PixelFormat::Gray8, &data).unwrap();
    let mut tensor = InputTensor::zeros(ElementType::Float32, 1, 4, 1);
    pack(&src, &mut tensor);
    assert_eq!(tensor.as_f32().unwrap(), &[0.0, 0.25, 0.5, 0.99609375]);
  }

  #[test]
  #[should_panic]
  fn test_pack_channel_mismatch_is_fatal() {
    let data = [0u8; 4];
    let src = PixelBuffer::packed(2, 2, PixelFormat::Gray8, &data).unwrap();
    let mut tensor = InputTensor::zeros(ElementType::UInt8, 2, 2, 3);
    pack(&src, &mut tensor);
  }
}
