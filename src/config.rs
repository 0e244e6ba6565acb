// 该文件是 Computer Vision 项目的一部分。
// src/config.rs - 推理配置
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

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

use crate::{
  frame::INPUT_W,
  model::{DEFAULT_OUTPUT_NAME, NetworkOptions},
};

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("配置解析错误: {0}")]
  Json(#[from] serde_json::Error),
  #[error("配置读取错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("配置无效: {0}")]
  Invalid(String),
}

/// 关键点头的布局
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeypointSettings {
  pub num_keypoints: usize,
  /// 每个检测头的网格边长，按输出列的顺序排列
  pub level_sizes: Vec<usize>,
  pub strides: Vec<usize>,
  /// 置信度所在的行
  pub conf_row: usize,
  pub conf_threshold: f32,
}

impl Default for KeypointSettings {
  fn default() -> Self {
    Self {
      num_keypoints: 8,
      level_sizes: vec![80, 40, 20],
      strides: vec![8, 16, 32],
      conf_row: 4,
      conf_threshold: 0.7,
    }
  }
}

impl KeypointSettings {
  /// 行列数在 usize 内放不下时返回 None
  pub fn checked_layout(&self) -> Option<(usize, usize)> {
    let anchors = self.level_sizes.iter().try_fold(0usize, |acc, s| {
      s.checked_mul(*s).and_then(|cells| acc.checked_add(cells))
    })?;
    let rows = self
      .num_keypoints
      .checked_mul(2)?
      .checked_add(self.conf_row)?
      .checked_add(1)?;
    Some((rows, anchors))
  }

  pub fn num_anchors(&self) -> usize {
    self.level_sizes.iter().map(|s| s * s).sum()
  }

  /// 第 k 个关键点 x 坐标所在的行，y 在下一行
  pub fn keypoint_row(&self, k: usize) -> usize {
    self.conf_row + 1 + k * 2
  }

  pub fn min_rows(&self) -> usize {
    self.keypoint_row(self.num_keypoints)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
  /// 调用方未给出帧尺寸时使用的相机帧尺寸
  pub frame_width: u32,
  pub frame_height: u32,
  pub pad_value: f32,
  pub mean: [f32; 3],
  pub norm: [f32; 3],
  pub output_name: String,
  pub keypoints: KeypointSettings,
  pub network: NetworkOptions,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      frame_width: 640,
      frame_height: 480,
      pad_value: 114.0,
      mean: [0.0; 3],
      norm: [1.0 / 255.0; 3],
      output_name: DEFAULT_OUTPUT_NAME.to_string(),
      keypoints: KeypointSettings::default(),
      network: NetworkOptions::default(),
    }
  }
}

impl Settings {
  pub fn from_json(json: &str) -> Result<Self, ConfigError> {
    let settings: Settings = serde_json::from_str(json)?;
    settings.validate()?;
    debug!("配置: {:?}", settings);
    Ok(settings)
  }

  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let json = std::fs::read_to_string(path)?;
    Self::from_json(&json)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    let fail = |msg: String| {
      error!("配置校验失败: {}", msg);
      Err(ConfigError::Invalid(msg))
    };

    if self.frame_width == 0 || self.frame_height == 0 {
      return fail(format!(
        "帧尺寸无效: {}x{}",
        self.frame_width, self.frame_height
      ));
    }
    if self.output_name.is_empty() {
      return fail("输出名称为空".to_string());
    }
    if self.norm.iter().any(|n| !n.is_finite()) || self.mean.iter().any(|m| !m.is_finite()) {
      return fail("mean/norm 必须是有限数".to_string());
    }

    let kp = &self.keypoints;
    if !(0.0..=1.0).contains(&kp.conf_threshold) {
      return fail(format!("置信度阈值超出范围: {}", kp.conf_threshold));
    }
    if kp.level_sizes.is_empty() || kp.level_sizes.contains(&0) {
      return fail(format!("检测头尺寸无效: {:?}", kp.level_sizes));
    }
    if let Some(size) = kp.level_sizes.iter().find(|s| **s > INPUT_W as usize) {
      return fail(format!("检测头尺寸 {} 超过输入尺寸 {}", size, INPUT_W));
    }
    if kp.checked_layout().is_none() {
      return fail(format!(
        "关键点布局溢出: {} 个关键点, 置信度行 {}",
        kp.num_keypoints, kp.conf_row
      ));
    }
    if kp.strides.len() != kp.level_sizes.len() {
      return fail(format!(
        "步长数量 {} 与检测头数量 {} 不一致",
        kp.strides.len(),
        kp.level_sizes.len()
      ));
    }

    Ok(())
  }

  /// 检测头网格乘以步长应覆盖整个输入
  pub fn keypoint_layout_matches(&self, input_size: u32) -> bool {
    self
      .keypoints
      .level_sizes
      .iter()
      .zip(&self.keypoints.strides)
      .all(|(size, stride)| size.checked_mul(*stride) == Some(input_size as usize))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_match_camera_pipeline() {
    let settings = Settings::default();
    assert_eq!((settings.frame_width, settings.frame_height), (640, 480));
    assert_eq!(settings.pad_value, 114.0);
    assert_eq!(settings.keypoints.num_anchors(), 8400);
    assert_eq!(settings.keypoints.min_rows(), 21);
    assert!(settings.keypoint_layout_matches(INPUT_W));
    assert!(settings.validate().is_ok());
  }

  #[test]
  fn empty_json_is_default() {
    assert_eq!(Settings::from_json("{}").unwrap(), Settings::default());
  }

  #[test]
  fn partial_json_overrides_fields() {
    let settings = Settings::from_json(
      r#"{"frame_width": 1280, "frame_height": 720, "keypoints": {"conf_threshold": 0.5}}"#,
    )
    .unwrap();
    assert_eq!(settings.frame_width, 1280);
    assert_eq!(settings.keypoints.conf_threshold, 0.5);
    assert_eq!(settings.keypoints.num_keypoints, 8);
  }

  #[test]
  fn rejects_out_of_range_values() {
    assert!(matches!(
      Settings::from_json(r#"{"keypoints": {"conf_threshold": 1.5}}"#),
      Err(ConfigError::Invalid(_))
    ));
    assert!(matches!(
      Settings::from_json(r#"{"frame_width": 0}"#),
      Err(ConfigError::Invalid(_))
    ));
    assert!(matches!(
      Settings::from_json(r#"{"keypoints": {"strides": [8, 16]}}"#),
      Err(ConfigError::Invalid(_))
    ));
    assert!(matches!(
      Settings::from_json("not json"),
      Err(ConfigError::Json(_))
    ));
  }

  #[test]
  fn rejects_layouts_that_overflow() {
    assert!(matches!(
      Settings::from_json(r#"{"keypoints": {"level_sizes": [4294967296], "strides": [1]}}"#),
      Err(ConfigError::Invalid(_))
    ));
    assert!(matches!(
      Settings::from_json(r#"{"keypoints": {"level_sizes": [641], "strides": [1]}}"#),
      Err(ConfigError::Invalid(_))
    ));
    let huge = format!(r#"{{"keypoints": {{"num_keypoints": {}}}}}"#, usize::MAX / 2);
    assert!(matches!(
      Settings::from_json(&huge),
      Err(ConfigError::Invalid(_))
    ));
    let huge = format!(r#"{{"keypoints": {{"conf_row": {}}}}}"#, usize::MAX);
    assert!(matches!(
      Settings::from_json(&huge),
      Err(ConfigError::Invalid(_))
    ));
    assert_eq!(KeypointSettings::default().checked_layout(), Some((21, 8400)));
  }
}
