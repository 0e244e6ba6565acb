// 该文件是 Computer Vision 项目的一部分。
// src/dataset.rs - 训练集信箱预处理
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

//! 把训练图像做成与推理时相同的信箱输入，并把 YOLO 标注
//! `cls x y w h [kx ky]...` 换算到信箱坐标。

use std::path::{Path, PathBuf};

use image::{
  Rgb, RgbImage,
  imageops::{self, FilterType},
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  frame::{INPUT_H, INPUT_W},
  transform::Letterbox,
};

pub const PAD_COLOR: [u8; 3] = [114, 114, 114];

const DATASET_EXTENSIONS: [&str; 2] = ["png", "jpg"];

#[derive(Error, Debug)]
pub enum DatasetError {
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  Image(#[from] image::ImageError),
}

/// 一行 YOLO 标注，坐标均为归一化值
#[derive(Debug, Clone, PartialEq)]
pub struct LabelLine {
  pub class: String,
  /// 中心点与宽高 `[x, y, w, h]`
  pub bbox: [f64; 4],
  pub keypoints: Vec<[f64; 2]>,
}

impl LabelLine {
  pub fn parse(line: &str) -> Option<Self> {
    let mut parts = line.split_whitespace();
    let class = parts.next()?.to_string();
    let values = parts
      .map(|v| v.parse::<f64>())
      .collect::<Result<Vec<_>, _>>()
      .ok()?;
    if values.len() < 4 || values.len() % 2 != 0 {
      return None;
    }

    Some(Self {
      class,
      bbox: [values[0], values[1], values[2], values[3]],
      keypoints: values[4..].chunks_exact(2).map(|p| [p[0], p[1]]).collect(),
    })
  }

  /// 输出六位小数，与训练工具链的格式一致
  pub fn format(&self) -> String {
    let mut line = self.class.clone();
    let values = self.bbox.iter().chain(self.keypoints.iter().flatten());
    for v in values {
      line.push_str(&format!(" {:.6}", v));
    }
    line
  }

  /// 原图归一化坐标 -> 信箱输入归一化坐标
  pub fn letterboxed(&self, letterbox: &Letterbox) -> Self {
    let scale = letterbox.scale as f64;
    let (frame_w, frame_h) = (letterbox.frame_w as f64, letterbox.frame_h as f64);
    let (input_w, input_h) = (letterbox.input_w as f64, letterbox.input_h as f64);
    let (pad_x, pad_y) = (letterbox.pad_x as f64, letterbox.pad_y as f64);

    let point = |x: f64, y: f64| {
      [
        (x * frame_w * scale + pad_x) / input_w,
        (y * frame_h * scale + pad_y) / input_h,
      ]
    };

    let [x, y, w, h] = self.bbox;
    let [cx, cy] = point(x, y);
    Self {
      class: self.class.clone(),
      bbox: [
        cx,
        cy,
        w * frame_w * scale / input_w,
        h * frame_h * scale / input_h,
      ],
      keypoints: self.keypoints.iter().map(|[kx, ky]| point(*kx, *ky)).collect(),
    }
  }
}

/// 无法解析或少于五个字段的行返回 `None`
pub fn adjust_label_line(line: &str, letterbox: &Letterbox) -> Option<String> {
  let label = LabelLine::parse(line)?;
  Some(label.letterboxed(letterbox).format())
}

pub fn read_labels(path: &Path) -> Result<Vec<LabelLine>, DatasetError> {
  let text = std::fs::read_to_string(path)?;
  Ok(text.lines().filter_map(LabelLine::parse).collect())
}

/// 双线性缩放后居中，四周填充灰色
pub fn letterbox_image(image: &RgbImage) -> (RgbImage, Letterbox) {
  let letterbox = Letterbox::fit(image.width(), image.height(), INPUT_W, INPUT_H);
  let resized = if letterbox.is_unscaled() {
    image.clone()
  } else {
    imageops::resize(image, letterbox.new_w, letterbox.new_h, FilterType::Triangle)
  };

  let mut canvas = RgbImage::from_pixel(letterbox.input_w, letterbox.input_h, Rgb(PAD_COLOR));
  imageops::replace(
    &mut canvas,
    &resized,
    letterbox.pad_x as i64,
    letterbox.pad_y as i64,
  );
  (canvas, letterbox)
}

pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>, DatasetError> {
  let mut images = Vec::new();
  for entry in std::fs::read_dir(dir)? {
    let path = entry?.path();
    let known = path
      .extension()
      .and_then(|ext| ext.to_str())
      .map(|ext| DATASET_EXTENSIONS.contains(&ext))
      .unwrap_or(false);
    if known {
      images.push(path);
    }
  }
  images.sort();
  Ok(images)
}

pub fn label_path(lbl_dir: &Path, image: &Path) -> Option<PathBuf> {
  let stem = image.file_stem()?;
  Some(lbl_dir.join(stem).with_extension("txt"))
}

/// 原地处理一组图像与标注；没有标注文件的图像保持不变。返回处理的数量。
pub fn process_set(img_dir: &Path, lbl_dir: &Path) -> Result<usize, DatasetError> {
  std::fs::create_dir_all(img_dir)?;
  std::fs::create_dir_all(lbl_dir)?;

  let mut processed = 0;
  for img_path in list_images(img_dir)? {
    let Some(lbl_path) = label_path(lbl_dir, &img_path) else {
      continue;
    };
    if !lbl_path.exists() {
      debug!("没有标注, 跳过 {}", img_path.display());
      continue;
    }

    let image = image::open(&img_path)?.to_rgb8();
    let (padded, letterbox) = letterbox_image(&image);
    padded.save(&img_path)?;

    let text = std::fs::read_to_string(&lbl_path)?;
    let lines: Vec<String> = text
      .lines()
      .filter_map(|line| {
        let adjusted = adjust_label_line(line, &letterbox);
        if adjusted.is_none() && !line.trim().is_empty() {
          warn!("{}: 丢弃无效标注 '{}'", lbl_path.display(), line.trim());
        }
        adjusted
      })
      .collect();
    std::fs::write(&lbl_path, lines.join("\n"))?;

    info!("已处理 {}", img_path.display());
    processed += 1;
  }
  Ok(processed)
}
