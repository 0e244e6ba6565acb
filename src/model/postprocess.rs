// 该文件是 Computer Vision 项目的一部分。
// src/model/postprocess.rs - 输出张量后处理
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

//! 三种任务的输出解释。结果与输出张量逐行对应，行数保持不变。

use tracing::{debug, warn};

use crate::{
  config::KeypointSettings,
  model::{BoxDetection, DetectRecord, DetectResult, OutputTensor, TaskMode},
  transform::{Letterbox, PortraitRotation},
};

/// `[label, score, x1, y1, x2, y2]`
const DETECTION_ROW_WIDTH: usize = 6;

pub fn postprocess(
  output: &OutputTensor,
  mode: TaskMode,
  keypoints: &KeypointSettings,
  letterbox: &Letterbox,
  rotation: Option<&PortraitRotation>,
) -> Vec<DetectRecord> {
  match mode {
    TaskMode::ObjectDetection => detections(output, letterbox, rotation),
    TaskMode::KeypointDetection => best_keypoints(output, keypoints, letterbox, rotation),
    TaskMode::InstanceSegmentation | TaskMode::Raw(_) => passthrough(output),
  }
}

/// 目标检测：归一化坐标 -> 原始帧像素，可选旋转到竖屏预览。
/// 标签 0 是背景类，因此类别减一。
pub fn detections(
  output: &OutputTensor,
  letterbox: &Letterbox,
  rotation: Option<&PortraitRotation>,
) -> Vec<DetectRecord> {
  if output.cols() < DETECTION_ROW_WIDTH {
    warn!(
      "检测输出列数 {} 小于 {}，忽略全部结果",
      output.cols(),
      DETECTION_ROW_WIDTH
    );
    return vec![DetectRecord::Empty; output.rows()];
  }

  let (in_w, in_h) = (letterbox.input_w as f32, letterbox.input_h as f32);
  let records: Vec<DetectRecord> = output
    .iter_rows()
    .map(|row| {
      let bbox = letterbox.unmap_box(row[2] * in_w, row[3] * in_h, row[4] * in_w, row[5] * in_h);
      let bbox = match rotation {
        Some(rotation) => rotation.rotate_box(bbox),
        None => bbox,
      };
      DetectRecord::Box(BoxDetection {
        class_id: row[0] as i32 - 1,
        bbox,
      })
    })
    .collect();

  debug!("检测到 {} 个物体", records.len());
  records
}

/// 相机帧内的整数框 `[class_id, x, y, w, h]`，不做旋转
pub fn frame_boxes(output: &OutputTensor, letterbox: &Letterbox) -> Vec<[i32; 5]> {
  DetectResult::from(detections(output, letterbox, None)).to_int_boxes()
}

/// 在所有检测头的锚点中找置信度最高的一个。
/// 只接受 `conf >= 阈值` 且严格大于当前最优的锚点，相同置信度保留先出现的。
pub fn best_candidate(output: &OutputTensor, layout: &KeypointSettings) -> Option<(usize, f32)> {
  if output.rows() <= layout.conf_row {
    return None;
  }

  let anchors = layout.num_anchors();
  if output.cols() < anchors {
    warn!("输出列数 {} 少于锚点数 {}", output.cols(), anchors);
  }

  let confidences = output.row(layout.conf_row);
  let mut best: Option<(usize, f32)> = None;
  for (pos, &conf) in confidences.iter().take(anchors).enumerate() {
    let best_conf = best.map(|(_, c)| c).unwrap_or(0.0);
    if conf <= best_conf || conf < layout.conf_threshold {
      continue;
    }
    best = Some((pos, conf));
  }
  best
}

/// 关键点检测：最优候选的关键点写入第 0 行，其余行为空
pub fn best_keypoints(
  output: &OutputTensor,
  layout: &KeypointSettings,
  letterbox: &Letterbox,
  rotation: Option<&PortraitRotation>,
) -> Vec<DetectRecord> {
  let mut records = vec![DetectRecord::Empty; output.rows()];
  if records.is_empty() {
    return records;
  }

  if output.rows() < layout.min_rows() {
    warn!(
      "关键点输出行数 {} 小于 {}，忽略结果",
      output.rows(),
      layout.min_rows()
    );
    return records;
  }

  let Some((pos, conf)) = best_candidate(output, layout) else {
    debug!("没有置信度超过 {} 的关键点", layout.conf_threshold);
    return records;
  };
  debug!("最优关键点候选: 锚点 {}, 置信度 {:.3}", pos, conf);

  let points = (0..layout.num_keypoints)
    .map(|k| {
      let row = layout.keypoint_row(k);
      let (x, y) = letterbox.unmap_point(output.at(row, pos), output.at(row + 1, pos));
      let (x, y) = match rotation {
        Some(rotation) => rotation.rotate_point(x, y),
        None => (x, y),
      };
      [x, y]
    })
    .collect();

  records[0] = DetectRecord::Keypoints(points);
  records
}

/// 实例分割尚未实现，原样返回每一行
pub fn passthrough(output: &OutputTensor) -> Vec<DetectRecord> {
  output
    .iter_rows()
    .map(|row| DetectRecord::Raw(row.to_vec()))
    .collect()
}
