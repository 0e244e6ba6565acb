// 该文件是 Computer Vision 项目的一部分。
// src/bin/draw_labels.rs - 把 YOLO 标注画到图像上
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

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use ComputerVision::{
  dataset::{self, LabelLine},
  logging,
  output::{draw::Draw, save_image},
};
use tracing::{info, warn};

/// 检查标注：每张图像画上框与关键点后写入输出目录
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 图像目录
  #[arg(long, value_name = "IMAGES")]
  pub images: PathBuf,
  /// 标注目录，与图像同名的 .txt
  #[arg(long, value_name = "LABELS")]
  pub labels: PathBuf,
  /// 输出目录
  #[arg(long, value_name = "OUTPUT")]
  pub output: PathBuf,
}

fn main() -> Result<()> {
  logging::init();

  let args = Args::parse();
  let draw = Draw::default();

  let images = dataset::list_images(&args.images)?;
  info!("共 {} 张图像", images.len());

  for (index, path) in images.iter().enumerate() {
    let mut image = image::open(path)?.to_rgb8();

    let labels: Vec<LabelLine> = match dataset::label_path(&args.labels, path) {
      Some(label_path) if label_path.exists() => dataset::read_labels(&label_path)?,
      _ => {
        warn!("{} 没有标注", path.display());
        Vec::new()
      }
    };
    draw.draw_labels(&mut image, &labels);

    let Some(name) = path.file_name() else {
      continue;
    };
    save_image(&args.output.join(name), &image)?;
    info!(
      "{}/{} {}: {} 个标注",
      index + 1,
      images.len(),
      path.display(),
      labels.len()
    );
  }

  Ok(())
}
