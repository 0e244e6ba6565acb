// 该文件是 Computer Vision 项目的一部分。
// src/output/draw.rs - 检测结果与标注可视化
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

use image::{
  Rgb, RgbImage,
  imageops::{self, FilterType},
};
use imageproc::{
  drawing::{draw_filled_circle_mut, draw_hollow_rect_mut},
  rect::Rect,
};

use crate::{
  dataset::LabelLine,
  model::{DetectRecord, DetectResult, InferenceRequest},
};

const BOX_THICKNESS: i32 = 2;
const KEYPOINT_RADIUS: i32 = 3;
const KEYPOINT_COLOR: [u8; 3] = [0, 255, 255]; // 青色
const LABEL_COLOR: [u8; 3] = [255, 0, 0]; // 红色

const PALETTE: [[u8; 3]; 6] = [
  [0, 0, 255],
  [255, 128, 0],
  [0, 200, 0],
  [255, 0, 255],
  [255, 220, 0],
  [128, 0, 255],
];

fn class_color(class_id: i32) -> [u8; 3] {
  PALETTE[class_id.rem_euclid(PALETTE.len() as i32) as usize]
}

pub struct Draw {
  thickness: i32,
  keypoint_radius: i32,
  keypoint_color: [u8; 3],
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      thickness: BOX_THICKNESS,
      keypoint_radius: KEYPOINT_RADIUS,
      keypoint_color: KEYPOINT_COLOR,
    }
  }
}

impl Draw {
  /// 结果所在的坐标系：有预览尺寸时先把帧顺时针旋转 90° 再缩放到预览大小
  pub fn canvas(request: &InferenceRequest) -> RgbImage {
    let image = request.frame.to_rgb_image();
    match request.view {
      Some((view_w, view_h)) => {
        let rotated = imageops::rotate90(&image);
        imageops::resize(&rotated, view_w, view_h, FilterType::Triangle)
      }
      None => image,
    }
  }

  pub fn draw_request(&self, request: &InferenceRequest, result: &DetectResult) -> RgbImage {
    let mut image = Self::canvas(request);
    self.draw_result(&mut image, result);
    image
  }

  pub fn draw_result(&self, image: &mut RgbImage, result: &DetectResult) {
    for record in result.records.iter() {
      match record {
        DetectRecord::Box(item) => self.draw_box(image, item.bbox, class_color(item.class_id)),
        DetectRecord::Keypoints(points) => self.draw_keypoints(image, points),
        DetectRecord::Raw(_) | DetectRecord::Empty => {}
      }
    }
  }

  /// `[x, y, w, h]` 像素坐标，超出图像的部分被裁掉
  pub fn draw_box(&self, image: &mut RgbImage, bbox: [f32; 4], color: [u8; 3]) {
    let [x, y, w, h] = bbox;
    let (x, y) = (x.round() as i32, y.round() as i32);
    let (w, h) = (w.round() as i32, h.round() as i32);

    for t in 0..self.thickness {
      let (inner_w, inner_h) = (w - 2 * t, h - 2 * t);
      if inner_w <= 0 || inner_h <= 0 {
        break;
      }
      let rect = Rect::at(x + t, y + t).of_size(inner_w as u32, inner_h as u32);
      draw_hollow_rect_mut(image, rect, Rgb(color));
    }
  }

  pub fn draw_keypoints(&self, image: &mut RgbImage, points: &[[f32; 2]]) {
    for [x, y] in points {
      draw_filled_circle_mut(
        image,
        (x.round() as i32, y.round() as i32),
        self.keypoint_radius,
        Rgb(self.keypoint_color),
      );
    }
  }

  /// YOLO 标注，坐标相对整张图像归一化
  pub fn draw_labels(&self, image: &mut RgbImage, labels: &[LabelLine]) {
    let (width, height) = (image.width() as f64, image.height() as f64);
    for label in labels {
      let [cx, cy, w, h] = label.bbox;
      let bbox = [
        ((cx - w / 2.0) * width) as f32,
        ((cy - h / 2.0) * height) as f32,
        (w * width) as f32,
        (h * height) as f32,
      ];
      self.draw_box(image, bbox, LABEL_COLOR);

      let points: Vec<[f32; 2]> = label
        .keypoints
        .iter()
        .map(|[kx, ky]| [(kx * width) as f32, (ky * height) as f32])
        .collect();
      self.draw_keypoints(image, &points);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    frame::RgbaFrame,
    model::{BoxDetection, TaskMode},
  };

  const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

  #[test]
  fn boxes_are_drawn_with_thickness() {
    let mut image = RgbImage::new(20, 20);
    Draw::default().draw_box(&mut image, [2.0, 3.0, 10.0, 8.0], [255, 0, 0]);
    assert_eq!(*image.get_pixel(2, 3), Rgb([255, 0, 0]));
    assert_eq!(*image.get_pixel(3, 4), Rgb([255, 0, 0]));
    assert_eq!(*image.get_pixel(11, 10), Rgb([255, 0, 0]));
    assert_eq!(*image.get_pixel(6, 7), BLACK);
    assert_eq!(*image.get_pixel(12, 3), BLACK);
  }

  #[test]
  fn degenerate_and_outside_boxes_do_not_panic() {
    let mut image = RgbImage::new(8, 8);
    let draw = Draw::default();
    draw.draw_box(&mut image, [1.0, 1.0, 0.0, 5.0], [255, 0, 0]);
    draw.draw_box(&mut image, [-20.0, -20.0, 5.0, 5.0], [255, 0, 0]);
    draw.draw_box(&mut image, [4.0, 4.0, 100.0, 100.0], [255, 0, 0]);
    assert_eq!(*image.get_pixel(1, 1), BLACK);
    assert_eq!(*image.get_pixel(4, 4), Rgb([255, 0, 0]));
  }

  #[test]
  fn result_keypoints_are_filled_circles() {
    let mut image = RgbImage::new(16, 16);
    let result = DetectResult::from(vec![
      DetectRecord::Keypoints(vec![[8.0, 8.0]]),
      DetectRecord::Empty,
    ]);
    Draw::default().draw_result(&mut image, &result);
    assert_eq!(*image.get_pixel(8, 8), Rgb(KEYPOINT_COLOR));
    assert_eq!(*image.get_pixel(9, 9), Rgb(KEYPOINT_COLOR));
    assert_eq!(*image.get_pixel(0, 0), BLACK);
  }

  #[test]
  fn portrait_canvas_swaps_dimensions() {
    let frame = RgbaFrame::new(vec![0; 4 * 8 * 4], 8, 4).unwrap();
    let request = InferenceRequest::new(frame, TaskMode::ObjectDetection);
    assert_eq!(Draw::canvas(&request).dimensions(), (8, 4));

    let request = request.with_view(8, 16);
    let image = Draw::default().draw_request(
      &request,
      &DetectResult::from(vec![DetectRecord::Box(BoxDetection {
        class_id: 0,
        bbox: [0.0, 0.0, 4.0, 4.0],
      })]),
    );
    assert_eq!(image.dimensions(), (8, 16));
    assert_eq!(*image.get_pixel(0, 0), Rgb(class_color(0)));
  }

  #[test]
  fn labels_use_centre_format() {
    let mut image = RgbImage::new(10, 10);
    let label = LabelLine::parse("0 0.5 0.5 0.4 0.4 0.9 0.9").unwrap();
    Draw::default().draw_labels(&mut image, &[label]);
    assert_eq!(*image.get_pixel(3, 3), Rgb(LABEL_COLOR));
    assert_eq!(*image.get_pixel(9, 9), Rgb(KEYPOINT_COLOR));
    assert_eq!(*image.get_pixel(8, 2), BLACK);
  }
}
