// 该文件是 Computer Vision 项目的一部分。
// src/bin/letterbox_dataset.rs - 训练集原地信箱预处理
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

use ComputerVision::{dataset, logging};
use tracing::info;

/// 把 images/{train,val} 中的图像填充成 640x640，并改写 labels/{train,val} 中的标注
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 数据集根目录
  #[arg(long, value_name = "ROOT", default_value = ".")]
  pub root: PathBuf,
  /// 要处理的子集
  #[arg(long, value_name = "SPLIT", default_values_t = ["train".to_string(), "val".to_string()])]
  pub split: Vec<String>,
}

fn main() -> Result<()> {
  logging::init();

  let args = Args::parse();

  let mut total = 0;
  for split in &args.split {
    let img_dir = args.root.join("images").join(split);
    let lbl_dir = args.root.join("labels").join(split);
    info!("处理 {} 与 {}", img_dir.display(), lbl_dir.display());
    total += dataset::process_set(&img_dir, &lbl_dir)?;
  }

  info!("完成, 共处理 {} 张图像", total);
  Ok(())
}
