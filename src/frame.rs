// 该文件是 Computer Vision 项目的一部分。
// src/frame.rs - RGBA 相机帧与 NCHW 输入张量
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

use image::{ImageBuffer, Rgb, RgbImage, RgbaImage};
use ndarray::{Array4, ArrayViewMut2, Axis};
use thiserror::Error;

const RGBA_CHANNELS: usize = 4;
const RGB_CHANNELS: usize = 3;

/// 模型输入宽度
pub const INPUT_W: u32 = 640;
/// 模型输入高度
pub const INPUT_H: u32 = 640;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
  #[error("帧尺寸无效: {width}x{height}")]
  InvalidShape { width: u32, height: u32 },
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
}

/// 相机输出的 RGBA8888 帧
#[derive(Debug, Clone)]
pub struct RgbaFrame {
  data: Box<[u8]>,
  width: u32,
  height: u32,
}

impl RgbaFrame {
  pub fn new(data: Vec<u8>, width: u32, height: u32) -> Result<Self, FrameError> {
    if width == 0 || height == 0 {
      return Err(FrameError::InvalidShape { width, height });
    }

    let expected = RGBA_CHANNELS * width as usize * height as usize;
    if data.len() != expected {
      return Err(FrameError::LengthMismatch {
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      data: data.into_boxed_slice(),
      width,
      height,
    })
  }

  /// 只知道宽度时，由数据长度推导高度
  pub fn with_width(data: Vec<u8>, width: u32) -> Result<Self, FrameError> {
    let row = RGBA_CHANNELS * width as usize;
    if row == 0 || data.is_empty() || data.len() % row != 0 {
      return Err(FrameError::InvalidShape {
        width,
        height: if row == 0 { 0 } else { (data.len() / row) as u32 },
      });
    }
    let height = (data.len() / row) as u32;
    Self::new(data, width, height)
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn channels(&self) -> usize {
    RGBA_CHANNELS
  }

  pub fn as_raw(&self) -> &[u8] {
    &self.data
  }

  pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
    let idx = (y as usize * self.width as usize + x as usize) * RGBA_CHANNELS;
    [
      self.data[idx],
      self.data[idx + 1],
      self.data[idx + 2],
      self.data[idx + 3],
    ]
  }

  /// 丢弃 alpha 通道
  pub fn to_rgb_image(&self) -> RgbImage {
    ImageBuffer::from_fn(self.width, self.height, |x, y| {
      let [r, g, b, _] = self.pixel(x, y);
      Rgb([r, g, b])
    })
  }
}

impl From<RgbaImage> for RgbaFrame {
  fn from(image: RgbaImage) -> Self {
    let (width, height) = image.dimensions();
    Self {
      data: image.into_raw().into_boxed_slice(),
      width,
      height,
    }
  }
}

impl From<RgbImage> for RgbaFrame {
  fn from(image: RgbImage) -> Self {
    let (width, height) = image.dimensions();
    let mut data = Vec::with_capacity(RGBA_CHANNELS * width as usize * height as usize);
    for pixel in image.pixels() {
      data.extend_from_slice(&[pixel[0], pixel[1], pixel[2], u8::MAX]);
    }
    Self {
      data: data.into_boxed_slice(),
      width,
      height,
    }
  }
}

/// 归一化后的 NCHW 浮点输入张量，形状为 1x3xHxW
#[derive(Debug, Clone)]
pub struct NchwTensor<const W: u32, const H: u32> {
  data: Array4<f32>,
}

impl<const W: u32, const H: u32> Default for NchwTensor<W, H> {
  fn default() -> Self {
    Self::filled(0.0)
  }
}

impl<const W: u32, const H: u32> NchwTensor<W, H> {
  pub fn filled(value: f32) -> Self {
    let data = Array4::from_elem((1, RGB_CHANNELS, H as usize, W as usize), value);
    Self { data }
  }

  pub fn height(&self) -> usize {
    H as usize
  }

  pub fn width(&self) -> usize {
    W as usize
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn as_array(&self) -> &Array4<f32> {
    &self.data
  }

  pub fn get(&self, c: usize, y: usize, x: usize) -> f32 {
    self.data[[0, c, y, x]]
  }

  pub fn set(&mut self, c: usize, y: usize, x: usize, value: f32) {
    self.data[[0, c, y, x]] = value;
  }

  pub fn plane_mut(&mut self, c: usize) -> ArrayViewMut2<'_, f32> {
    self.data.index_axis_mut(Axis(0), 0).index_axis_move(Axis(0), c)
  }

  pub fn into_array(self) -> Array4<f32> {
    self.data
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rejects_wrong_length() {
    let err = RgbaFrame::new(vec![0; 10], 2, 2).unwrap_err();
    assert_eq!(
      err,
      FrameError::LengthMismatch {
        expected: 16,
        actual: 10
      }
    );
  }

  #[test]
  fn rejects_empty_shape() {
    assert!(matches!(
      RgbaFrame::new(Vec::new(), 0, 4),
      Err(FrameError::InvalidShape { .. })
    ));
  }

  #[test]
  fn derives_height_from_width() {
    let frame = RgbaFrame::with_width(vec![0; 4 * 6 * 5], 6).unwrap();
    assert_eq!(frame.height(), 5);
    assert!(RgbaFrame::with_width(vec![0; 4 * 6 * 5 + 4], 6).is_err());
    assert!(RgbaFrame::with_width(vec![0; 8], 0).is_err());
  }

  #[test]
  fn drops_alpha_channel() {
    let frame = RgbaFrame::new(vec![1, 2, 3, 4, 5, 6, 7, 8], 2, 1).unwrap();
    let image = frame.to_rgb_image();
    assert_eq!(image.get_pixel(0, 0), &Rgb([1, 2, 3]));
    assert_eq!(image.get_pixel(1, 0), &Rgb([5, 6, 7]));
  }

  #[test]
  fn tensor_plane_writes_are_visible() {
    let mut tensor = NchwTensor::<4, 2>::filled(1.0);
    tensor.plane_mut(2).fill(3.0);
    assert_eq!(tensor.as_array().shape(), &[1, 3, 2, 4]);
    assert_eq!(tensor.get(2, 1, 3), 3.0);
    assert_eq!(tensor.get(1, 1, 3), 1.0);
  }
}
