// 该文件是 Computer Vision 项目的一部分。
// src/model.rs - 模型
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

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 任务类型，对应调用方传入的整数标志
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskMode {
  ObjectDetection,
  KeypointDetection,
  InstanceSegmentation,
  /// 未知标志，原样返回输出行
  Raw(i32),
}

impl From<i32> for TaskMode {
  fn from(flag: i32) -> Self {
    match flag {
      1 => TaskMode::ObjectDetection,
      2 => TaskMode::KeypointDetection,
      3 => TaskMode::InstanceSegmentation,
      other => TaskMode::Raw(other),
    }
  }
}

impl From<TaskMode> for i32 {
  fn from(mode: TaskMode) -> Self {
    match mode {
      TaskMode::ObjectDetection => 1,
      TaskMode::KeypointDetection => 2,
      TaskMode::InstanceSegmentation => 3,
      TaskMode::Raw(flag) => flag,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoxDetection {
  pub class_id: i32,
  pub bbox: [f32; 4], // [x, y, w, h]
}

/// 一行检测记录，形状取决于任务类型
#[derive(Debug, Clone, PartialEq)]
pub enum DetectRecord {
  Box(BoxDetection),
  Keypoints(Vec<[f32; 2]>),
  Raw(Vec<f32>),
  Empty,
}

impl DetectRecord {
  pub fn to_row(&self) -> Vec<f32> {
    match self {
      DetectRecord::Box(BoxDetection { class_id, bbox }) => {
        vec![*class_id as f32, bbox[0], bbox[1], bbox[2], bbox[3]]
      }
      DetectRecord::Keypoints(points) => points.iter().flatten().copied().collect(),
      DetectRecord::Raw(row) => row.clone(),
      DetectRecord::Empty => Vec::new(),
    }
  }
}

/// 与输出张量逐行对应的检测结果
#[derive(Debug, Clone, Default)]
pub struct DetectResult {
  pub records: Box<[DetectRecord]>,
}

impl DetectResult {
  pub fn len(&self) -> usize {
    self.records.len()
  }

  pub fn is_empty(&self) -> bool {
    self
      .records
      .iter()
      .all(|record| matches!(record, DetectRecord::Empty))
  }

  pub fn boxes(&self) -> impl Iterator<Item = &BoxDetection> {
    self.records.iter().filter_map(|record| match record {
      DetectRecord::Box(item) => Some(item),
      _ => None,
    })
  }

  pub fn to_rows(&self) -> Vec<Vec<f32>> {
    self.records.iter().map(DetectRecord::to_row).collect()
  }

  /// 整数框 `[class_id, x, y, w, h]`，向零截断
  pub fn to_int_boxes(&self) -> Vec<[i32; 5]> {
    self
      .boxes()
      .map(|BoxDetection { class_id, bbox }| {
        [
          *class_id,
          bbox[0] as i32,
          bbox[1] as i32,
          bbox[2] as i32,
          bbox[3] as i32,
        ]
      })
      .collect()
  }
}

impl From<Vec<DetectRecord>> for DetectResult {
  fn from(records: Vec<DetectRecord>) -> Self {
    Self {
      records: records.into_boxed_slice(),
    }
  }
}

mod detector;
mod network;
mod options;
pub mod postprocess;
mod tensor;

pub use self::detector::{Detector, InferenceRequest};
pub use self::network::{DEFAULT_OUTPUT_NAME, Network, NetworkBuilder, NetworkError};
pub use self::options::{NetworkOptions, OptimizationLevel};
pub use self::tensor::OutputTensor;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn task_mode_round_trips_flags() {
    assert_eq!(TaskMode::from(1), TaskMode::ObjectDetection);
    assert_eq!(TaskMode::from(2), TaskMode::KeypointDetection);
    assert_eq!(TaskMode::from(3), TaskMode::InstanceSegmentation);
    assert_eq!(TaskMode::from(7), TaskMode::Raw(7));
    assert_eq!(i32::from(TaskMode::Raw(0)), 0);
  }

  #[test]
  fn int_boxes_truncate_and_skip_other_records() {
    let result = DetectResult::from(vec![
      DetectRecord::Box(BoxDetection {
        class_id: 2,
        bbox: [1.9, 2.5, -3.7, 40.0],
      }),
      DetectRecord::Empty,
      DetectRecord::Raw(vec![1.0]),
    ]);
    assert_eq!(result.to_int_boxes(), vec![[2, 1, 2, -3, 40]]);
    assert_eq!(result.len(), 3);
    assert!(!result.is_empty());
  }

  #[test]
  fn keypoint_rows_are_flat() {
    let record = DetectRecord::Keypoints(vec![[1.0, 2.0], [3.0, 4.0]]);
    assert_eq!(record.to_row(), vec![1.0, 2.0, 3.0, 4.0]);
    assert!(DetectRecord::Empty.to_row().is_empty());
  }
}
