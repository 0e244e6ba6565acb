// 该文件是 Computer Vision 项目的一部分。
// src/model/detector.rs - 单帧推理流程
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

use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
  config::Settings,
  frame::RgbaFrame,
  model::{DetectResult, Model, Network, NetworkError, OutputTensor, TaskMode, postprocess},
  transform::{Letterbox, PortraitRotation},
};

/// 一次推理请求：帧、任务类型，以及可选的竖屏预览尺寸
#[derive(Debug, Clone)]
pub struct InferenceRequest {
  pub frame: RgbaFrame,
  pub mode: TaskMode,
  /// `(宽, 高)`；给出时结果旋转到竖屏预览坐标，否则保留帧坐标
  pub view: Option<(u32, u32)>,
}

impl InferenceRequest {
  pub fn new(frame: RgbaFrame, mode: TaskMode) -> Self {
    Self {
      frame,
      mode,
      view: None,
    }
  }

  pub fn with_view(mut self, width: u32, height: u32) -> Self {
    self.view = Some((width, height));
    self
  }

  pub fn rotation(&self) -> Option<PortraitRotation> {
    self.view.map(|(view_w, view_h)| {
      PortraitRotation::new(self.frame.width(), self.frame.height(), view_w, view_h)
    })
  }
}

pub struct Detector<const W: u32, const H: u32> {
  network: Arc<Network>,
  settings: Settings,
}

impl<const W: u32, const H: u32> Detector<W, H> {
  pub fn new(network: Arc<Network>, settings: Settings) -> Self {
    if !settings.keypoint_layout_matches(W.min(H)) {
      warn!(
        "关键点检测头 {:?} x 步长 {:?} 与输入尺寸 {}x{} 不一致",
        settings.keypoints.level_sizes, settings.keypoints.strides, W, H
      );
    }
    Self { network, settings }
  }

  pub fn settings(&self) -> &Settings {
    &self.settings
  }

  pub fn letterbox(&self, frame: &RgbaFrame) -> Letterbox {
    Letterbox::fit(frame.width(), frame.height(), W, H)
  }

  fn forward(&self, frame: &RgbaFrame) -> Result<(OutputTensor, Letterbox), NetworkError> {
    let letterbox = self.letterbox(frame);
    debug!(
      "信箱填充: 缩放 {:.3}, 填充 ({}, {})",
      letterbox.scale, letterbox.pad_x, letterbox.pad_y
    );

    let tensor = letterbox.apply::<W, H>(
      frame,
      self.settings.pad_value,
      &self.settings.mean,
      &self.settings.norm,
    );
    let output = self.network.forward(&tensor)?;
    Ok((output, letterbox))
  }

  /// 仅目标检测，返回相机帧坐标下的整数框
  pub fn frame_boxes(&self, frame: &RgbaFrame) -> Result<Vec<[i32; 5]>, NetworkError> {
    let (output, letterbox) = self.forward(frame)?;
    Ok(postprocess::frame_boxes(&output, &letterbox))
  }
}

impl<const W: u32, const H: u32> Model for Detector<W, H> {
  type Input = InferenceRequest;
  type Output = DetectResult;
  type Error = NetworkError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let (output, letterbox) = self.forward(&input.frame)?;

    let rotation = input.rotation();
    let records = postprocess::postprocess(
      &output,
      input.mode,
      &self.settings.keypoints,
      &letterbox,
      rotation.as_ref(),
    );

    Ok(DetectResult::from(records))
  }
}
