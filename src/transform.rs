// 该文件是 Computer Vision 项目的一部分。
// src/transform.rs - 信箱填充与坐标变换
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

use image::imageops::{self, FilterType};
use tracing::debug;

use crate::frame::{NchwTensor, RgbaFrame};

/// 信箱填充（letterbox）参数：等比缩放后居中，四周用常量填充
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
  pub scale: f32,
  pub pad_x: u32,
  pub pad_y: u32,
  pub frame_w: u32,
  pub frame_h: u32,
  pub new_w: u32,
  pub new_h: u32,
  pub input_w: u32,
  pub input_h: u32,
}

impl Letterbox {
  /// 计算把 frame_w x frame_h 放进 input_w x input_h 的缩放与填充
  pub fn fit(frame_w: u32, frame_h: u32, input_w: u32, input_h: u32) -> Self {
    let scale = (input_w as f32 / frame_w.max(1) as f32).min(input_h as f32 / frame_h.max(1) as f32);
    // 与训练集预处理一致：尺寸向下取整
    let new_w = ((frame_w as f32 * scale) as u32).clamp(1, input_w);
    let new_h = ((frame_h as f32 * scale) as u32).clamp(1, input_h);

    Self {
      scale,
      pad_x: (input_w - new_w) / 2,
      pad_y: (input_h - new_h) / 2,
      frame_w,
      frame_h,
      new_w,
      new_h,
      input_w,
      input_h,
    }
  }

  /// 内容不需要缩放，可以逐行拷贝
  pub fn is_unscaled(&self) -> bool {
    self.new_w == self.frame_w && self.new_h == self.frame_h
  }

  /// 生成归一化的 NCHW 张量：`(v - mean[c]) * norm[c]`，填充区域同样参与归一化
  pub fn apply<const W: u32, const H: u32>(
    &self,
    frame: &RgbaFrame,
    pad_value: f32,
    mean: &[f32; 3],
    norm: &[f32; 3],
  ) -> NchwTensor<W, H> {
    let mut tensor = NchwTensor::<W, H>::filled(pad_value);

    if self.is_unscaled() {
      let raw = frame.as_raw();
      let width = frame.width() as usize;
      for y in 0..frame.height() as usize {
        let row = &raw[y * width * 4..(y + 1) * width * 4];
        let dst_y = y + self.pad_y as usize;
        for (x, pixel) in row.chunks_exact(4).enumerate() {
          let dst_x = x + self.pad_x as usize;
          for c in 0..3 {
            tensor.set(c, dst_y, dst_x, pixel[c] as f32);
          }
        }
      }
    } else {
      debug!(
        "缩放帧 {}x{} -> {}x{}",
        self.frame_w, self.frame_h, self.new_w, self.new_h
      );
      let resized = imageops::resize(
        &frame.to_rgb_image(),
        self.new_w,
        self.new_h,
        FilterType::Triangle,
      );
      for (x, y, pixel) in resized.enumerate_pixels() {
        let dst_x = (x + self.pad_x) as usize;
        let dst_y = (y + self.pad_y) as usize;
        for c in 0..3 {
          tensor.set(c, dst_y, dst_x, pixel[c] as f32);
        }
      }
    }

    for c in 0..3 {
      let (m, n) = (mean[c], norm[c]);
      tensor.plane_mut(c).mapv_inplace(|v| (v - m) * n);
    }

    tensor
  }

  /// 网络输入坐标 -> 原始帧坐标
  pub fn unmap_point(&self, x: f32, y: f32) -> (f32, f32) {
    (
      (x - self.pad_x as f32) / self.scale,
      (y - self.pad_y as f32) / self.scale,
    )
  }

  /// 网络输入中的 `[x1, y1, x2, y2]` -> 原始帧中的 `[x, y, w, h]`
  pub fn unmap_box(&self, x1: f32, y1: f32, x2: f32, y2: f32) -> [f32; 4] {
    let (x, y) = self.unmap_point(x1, y1);
    let (right, bottom) = self.unmap_point(x2, y2);
    [x, y, right - x, bottom - y]
  }
}

/// 横屏相机帧顺时针旋转 90° 到竖屏预览，并缩放到预览尺寸
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortraitRotation {
  pub frame_w: f32,
  pub frame_h: f32,
  pub scale_x: f32,
  pub scale_y: f32,
}

impl PortraitRotation {
  pub fn new(frame_w: u32, frame_h: u32, view_w: u32, view_h: u32) -> Self {
    Self {
      frame_w: frame_w as f32,
      frame_h: frame_h as f32,
      scale_x: view_w as f32 / frame_h as f32,
      scale_y: view_h as f32 / frame_w as f32,
    }
  }

  /// `[x, y, w, h]`，旋转后宽高互换
  pub fn rotate_box(&self, bbox: [f32; 4]) -> [f32; 4] {
    let [x, y, w, h] = bbox;
    [
      (self.frame_h - y - h) * self.scale_x,
      x * self.scale_y,
      h * self.scale_x,
      w * self.scale_y,
    ]
  }

  pub fn rotate_point(&self, x: f32, y: f32) -> (f32, f32) {
    ((self.frame_h - y) * self.scale_x, x * self.scale_y)
  }
}
