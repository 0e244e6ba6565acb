// 该文件是 Computer Vision 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{DetectResult, InferenceRequest},
  output::{Render, draw::Draw, format_record},
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 每帧一张 `NNNNNN.png`；`?record` 时附带同名 `.txt` 结果，
/// `?always` 时没有检测结果的帧也保存
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  draw: Draw,
  record: bool,
  always: bool,
  frame_counter: Mutex<u32>,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let record = uri.query_pairs().any(|(k, _)| k == "record");
    let always = uri.query_pairs().any(|(k, _)| k == "always");

    Ok(DirectoryRecordOutput::new(uri.path(), record, always))
  }
}

impl DirectoryRecordOutput {
  pub fn new(directory: impl Into<PathBuf>, record: bool, always: bool) -> Self {
    Self {
      directory: directory.into(),
      draw: Draw::default(),
      record,
      always,
      frame_counter: Mutex::new(0),
    }
  }

  fn frame_path(&self) -> Result<PathBuf, DirectoryRecordOutputError> {
    let id = {
      let mut counter = self.frame_counter.lock();
      *counter += 1;
      *counter
    };
    std::fs::create_dir_all(&self.directory)?;
    Ok(self.directory.join(format!("{:06}.png", id)))
  }

  fn write_record(path: &Path, result: &DetectResult) -> Result<(), std::io::Error> {
    let lines: Vec<String> = result.records.iter().filter_map(format_record).collect();
    std::fs::write(path.with_extension("txt"), lines.join("\n"))
  }
}

impl Render<InferenceRequest, DetectResult> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(
    &self,
    frame: &InferenceRequest,
    result: &DetectResult,
  ) -> Result<(), Self::Error> {
    if !self.always && result.is_empty() {
      debug!("没有检测结果, 跳过保存");
      return Ok(());
    }

    let path = self.frame_path()?;
    self.draw.draw_request(frame, result).save(&path)?;
    if self.record {
      Self::write_record(&path, result)?;
    }
    debug!("保存结果到 {}", path.display());
    Ok(())
  }
}
