// 该文件是 Computer Vision 项目的一部分。
// tests/postprocess_pipeline.rs - 预处理与后处理联调
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

use ComputerVision::{
  bridge::RunParams,
  config::{KeypointSettings, Settings},
  frame::{INPUT_H, INPUT_W, RgbaFrame},
  model::{
    BoxDetection, DetectRecord, DetectResult, OutputTensor, TaskMode,
    postprocess::{frame_boxes, postprocess},
  },
  transform::{Letterbox, PortraitRotation},
};

fn camera_frame() -> RgbaFrame {
  let (w, h) = (640u32, 480u32);
  let mut data = Vec::with_capacity((w * h * 4) as usize);
  for y in 0..h {
    for x in 0..w {
      data.extend_from_slice(&[(x % 256) as u8, (y % 256) as u8, 255, 255]);
    }
  }
  RgbaFrame::new(data, w, h).unwrap()
}

#[test]
fn camera_frame_becomes_padded_tensor() {
  let settings = Settings::default();
  let frame = camera_frame();
  let letterbox = Letterbox::fit(frame.width(), frame.height(), INPUT_W, INPUT_H);
  let tensor = letterbox.apply::<INPUT_W, INPUT_H>(
    &frame,
    settings.pad_value,
    &settings.mean,
    &settings.norm,
  );

  assert_eq!(tensor.as_array().shape(), &[1, 3, 640, 640]);
  let pad = 114.0 / 255.0;
  assert!((tensor.get(0, 0, 0) - pad).abs() < 1e-6);
  assert!((tensor.get(1, 79, 639) - pad).abs() < 1e-6);
  assert!((tensor.get(2, 560, 10) - pad).abs() < 1e-6);
  assert!((tensor.get(0, 80 + 7, 200) - 200.0 / 255.0).abs() < 1e-6);
  assert!((tensor.get(1, 80 + 7, 200) - 7.0 / 255.0).abs() < 1e-6);
  assert!((tensor.get(2, 559, 0) - 1.0).abs() < 1e-6);
}

#[test]
fn run_params_drive_detection_rotation() {
  let settings = Settings::default();
  let params = RunParams::parse(&[1, 480, 640]).unwrap();
  let (frame_w, frame_h) = params.frame_size(&settings);
  let letterbox = Letterbox::fit(frame_w, frame_h, INPUT_W, INPUT_H);
  let rotation = PortraitRotation::new(frame_w, frame_h, params.view_w, params.view_h);

  let output = OutputTensor::from_rows(&[
    vec![1.0, 0.8, 0.0, 0.125, 0.125, 0.375],
    vec![0.0, 0.1, 0.0, 0.0, 0.0, 0.0],
  ])
  .unwrap();
  let result = DetectResult::from(postprocess(
    &output,
    params.mode,
    &settings.keypoints,
    &letterbox,
    Some(&rotation),
  ));

  assert_eq!(result.len(), 2);
  assert_eq!(
    result.records[0],
    DetectRecord::Box(BoxDetection {
      class_id: 0,
      bbox: [320.0, 0.0, 160.0, 80.0],
    })
  );
  assert_eq!(result.to_rows()[0], vec![0.0, 320.0, 0.0, 160.0, 80.0]);
  // 背景类
  assert_eq!(result.to_int_boxes()[1][0], -1);

  assert_eq!(frame_boxes(&output, &letterbox)[0], [0, 0, 0, 80, 160]);
}

#[test]
fn keypoint_result_keeps_row_count() {
  let layout = KeypointSettings::default();
  let mut rows = vec![vec![0.0f32; layout.num_anchors()]; layout.min_rows() + 3];
  let pos = 8399;
  rows[layout.conf_row][pos] = 0.8;
  rows[layout.conf_row][100] = 0.7;
  for k in 0..layout.num_keypoints {
    rows[layout.keypoint_row(k)][pos] = 320.0;
    rows[layout.keypoint_row(k) + 1][pos] = 320.0;
  }
  let output = OutputTensor::from_rows(&rows).unwrap();
  let letterbox = Letterbox::fit(640, 480, INPUT_W, INPUT_H);
  let rotation = PortraitRotation::new(640, 480, 480, 640);

  let result = DetectResult::from(postprocess(
    &output,
    TaskMode::from(2),
    &layout,
    &letterbox,
    Some(&rotation),
  ));
  let rows = result.to_rows();
  assert_eq!(rows.len(), layout.min_rows() + 3);
  // (320, 320 - 80) -> ((480 - 240) * 1, 320 * 1)
  assert_eq!(rows[0], [240.0f32, 320.0].repeat(8));
  assert!(rows[1..].iter().all(|r| r.is_empty()));
}

#[test]
fn unknown_modes_pass_rows_through() {
  let output = OutputTensor::from_rows(&[vec![0.5, 1.5, 2.5]]).unwrap();
  let letterbox = Letterbox::fit(640, 480, INPUT_W, INPUT_H);
  for mode in [3, 0, 42] {
    let records = postprocess(
      &output,
      TaskMode::from(mode),
      &KeypointSettings::default(),
      &letterbox,
      None,
    );
    assert_eq!(records, vec![DetectRecord::Raw(vec![0.5, 1.5, 2.5])]);
  }
}
