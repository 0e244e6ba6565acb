// 该文件是 Computer Vision 项目的一部分。
// src/bin/simple_oneshot.rs - 单张图像推理
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

use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use clap::Parser;
use url::Url;

use ComputerVision::{
  FromUrl,
  config::Settings,
  frame::{INPUT_H, INPUT_W},
  input::InputWrapper,
  logging,
  model::{Detector, InferenceRequest, NetworkBuilder, TaskMode},
  output::OutputWrapper,
  task::{OneShotTask, Task},
};
use tracing::info;

/// 单张图像推理
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// ONNX 模型路径，如 onnx:///path/to/model.onnx
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入来源，如 image:///path/to/frame.png
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径，如 image:///path/to/result.png 或 log://
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// 任务类型：1 目标检测，2 关键点，3 实例分割
  #[arg(long, value_name = "MODE", default_value_t = 1)]
  pub mode: i32,
  /// JSON 配置文件
  #[arg(long, value_name = "CONFIG")]
  pub config: Option<PathBuf>,
}

fn main() -> Result<()> {
  logging::init();

  let args = Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let settings = match &args.config {
    Some(path) => Settings::from_file(path)?,
    None => Settings::default(),
  };
  let network = NetworkBuilder::from_url(&args.model)?
    .options(settings.network.clone())
    .output_name(settings.output_name.clone())
    .build()?;
  let model: Detector<INPUT_W, INPUT_H> = Detector::new(Arc::new(network), settings);

  let mode = TaskMode::from(args.mode);
  let input = InputWrapper::from_url(&args.input)?
    .map(|item| InferenceRequest::new(item.frame, mode));
  let output = OutputWrapper::from_url(&args.output)?;

  OneShotTask.run_task(input, model, output)?;

  Ok(())
}
