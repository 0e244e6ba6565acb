// 该文件是 Computer Vision 项目的一部分。
// src/input/read_image_file.rs - 图像文件与图像目录输入
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

use image::ImageReader;
use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::RgbaFrame, input::InputFrame};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI 方案不匹配: 期望 {expected}, 实际 {found}")]
  SchemaMismatch {
    expected: &'static str,
    found: String,
  },
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像加载错误: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("目录中没有图像: {0}")]
  EmptyDirectory(PathBuf),
}

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];

fn check_scheme(url: &Url, expected: &'static str) -> Result<(), ImageFileInputError> {
  if url.scheme() != expected {
    error!(
      "URI 方案不匹配: 期望 '{}', 实际 '{}'",
      expected,
      url.scheme()
    );
    return Err(ImageFileInputError::SchemaMismatch {
      expected,
      found: url.scheme().to_string(),
    });
  }
  Ok(())
}

pub fn is_image_path(path: &Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .map(|ext| {
      IMAGE_EXTENSIONS
        .iter()
        .any(|known| known.eq_ignore_ascii_case(ext))
    })
    .unwrap_or(false)
}

pub fn read_frame(path: &Path) -> Result<RgbaFrame, ImageFileInputError> {
  let image = ImageReader::open(path)?.decode()?;
  Ok(RgbaFrame::from(image.to_rgba8()))
}

/// 单张图像，迭代一次
pub struct ImageFileInput {
  path: PathBuf,
  frame: Option<RgbaFrame>,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    check_scheme(url, Self::SCHEME)?;
    Self::open(url.path())
  }
}

impl ImageFileInput {
  pub fn open(path: impl Into<PathBuf>) -> Result<Self, ImageFileInputError> {
    let path = path.into();
    let frame = read_frame(&path)?;
    info!(
      "读取图像 {}: {}x{}",
      path.display(),
      frame.width(),
      frame.height()
    );
    Ok(Self {
      path,
      frame: Some(frame),
    })
  }
}

impl Iterator for ImageFileInput {
  type Item = InputFrame;

  fn next(&mut self) -> Option<Self::Item> {
    self.frame.take().map(|frame| InputFrame {
      frame,
      source: Some(self.path.clone()),
    })
  }
}

/// 目录中的图像，按文件名顺序逐张读取；读取失败的文件被跳过
pub struct DirectoryInput {
  files: std::vec::IntoIter<PathBuf>,
}

impl FromUrlWithScheme for DirectoryInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    check_scheme(url, Self::SCHEME)?;
    Self::open(url.path())
  }
}

impl DirectoryInput {
  pub fn open(dir: impl AsRef<Path>) -> Result<Self, ImageFileInputError> {
    let dir = dir.as_ref();
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
      let path = entry?.path();
      if path.is_file() && is_image_path(&path) {
        files.push(path);
      }
    }
    if files.is_empty() {
      return Err(ImageFileInputError::EmptyDirectory(dir.to_path_buf()));
    }
    files.sort();
    info!("目录 {} 中有 {} 张图像", dir.display(), files.len());

    Ok(Self {
      files: files.into_iter(),
    })
  }

  pub fn remaining(&self) -> usize {
    self.files.len()
  }
}

impl Iterator for DirectoryInput {
  type Item = InputFrame;

  fn next(&mut self) -> Option<Self::Item> {
    for path in self.files.by_ref() {
      match read_frame(&path) {
        Ok(frame) => {
          return Some(InputFrame {
            frame,
            source: Some(path),
          });
        }
        Err(e) => warn!("跳过 {}: {}", path.display(), e),
      }
    }
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn recognizes_image_extensions() {
    assert!(is_image_path(Path::new("a/b.PNG")));
    assert!(is_image_path(Path::new("c.jpeg")));
    assert!(!is_image_path(Path::new("labels.txt")));
    assert!(!is_image_path(Path::new("noext")));
  }

  #[test]
  fn rejects_other_schemes() {
    let url = Url::parse("video:///tmp/a.mp4").unwrap();
    assert!(matches!(
      ImageFileInput::from_url(&url),
      Err(ImageFileInputError::SchemaMismatch { .. })
    ));
    assert!(matches!(
      DirectoryInput::from_url(&url),
      Err(ImageFileInputError::SchemaMismatch { .. })
    ));
  }

  #[test]
  fn reads_directory_in_name_order() {
    let dir = std::env::temp_dir().join(format!("cv-input-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    for (name, shade) in [("b.png", 20u8), ("a.png", 10u8)] {
      image::RgbImage::from_pixel(4, 3, image::Rgb([shade; 3]))
        .save(dir.join(name))
        .unwrap();
    }
    std::fs::write(dir.join("notes.txt"), "skip").unwrap();

    let mut input = DirectoryInput::open(&dir).unwrap();
    assert_eq!(input.remaining(), 2);
    let first = input.next().unwrap();
    assert_eq!(first.source.as_deref(), Some(dir.join("a.png").as_path()));
    assert_eq!(first.frame.pixel(0, 0), [10, 10, 10, 255]);
    assert_eq!((first.frame.width(), first.frame.height()), (4, 3));
    assert!(input.next().is_some());
    assert!(input.next().is_none());

    std::fs::remove_dir_all(&dir).unwrap();
  }
}
