// 该文件是 Computer Vision 项目的一部分。
// src/model/tensor.rs - 输出张量
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

use ndarray::ArrayViewD;

/// 按行解释的二维输出：最后一维是列，其余维度展开为行
#[derive(Debug, Clone, PartialEq)]
pub struct OutputTensor {
  rows: usize,
  cols: usize,
  data: Vec<f32>,
}

impl OutputTensor {
  pub fn new(rows: usize, cols: usize, data: Vec<f32>) -> Option<Self> {
    if rows.checked_mul(cols)? != data.len() {
      return None;
    }
    Some(Self { rows, cols, data })
  }

  pub fn from_rows(rows: &[Vec<f32>]) -> Option<Self> {
    let cols = rows.first().map(Vec::len).unwrap_or(0);
    if rows.iter().any(|row| row.len() != cols) {
      return None;
    }
    Self::new(rows.len(), cols, rows.concat())
  }

  pub fn from_view(view: ArrayViewD<'_, f32>) -> Option<Self> {
    let cols = *view.shape().last()?;
    let data: Vec<f32> = view.iter().copied().collect();
    let rows = if cols == 0 { 0 } else { data.len() / cols };
    Self::new(rows, cols, data)
  }

  pub fn rows(&self) -> usize {
    self.rows
  }

  pub fn cols(&self) -> usize {
    self.cols
  }

  pub fn row(&self, index: usize) -> &[f32] {
    &self.data[index * self.cols..(index + 1) * self.cols]
  }

  pub fn iter_rows(&self) -> impl Iterator<Item = &[f32]> {
    (0..self.rows).map(move |index| self.row(index))
  }

  pub fn at(&self, row: usize, col: usize) -> f32 {
    self.data[row * self.cols + col]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use ndarray::{Array3, IxDyn};

  #[test]
  fn flattens_leading_dimensions() {
    let array = Array3::from_shape_fn((1, 3, 4), |(_, r, c)| (r * 10 + c) as f32).into_dyn();
    let tensor = OutputTensor::from_view(array.view()).unwrap();
    assert_eq!((tensor.rows(), tensor.cols()), (3, 4));
    assert_eq!(tensor.row(2), &[20.0, 21.0, 22.0, 23.0]);
    assert_eq!(tensor.at(1, 3), 13.0);
  }

  #[test]
  fn rejects_scalars_and_ragged_rows() {
    let scalar = ndarray::ArrayD::<f32>::zeros(IxDyn(&[]));
    assert!(OutputTensor::from_view(scalar.view()).is_none());
    assert!(OutputTensor::from_rows(&[vec![1.0], vec![1.0, 2.0]]).is_none());
    assert!(OutputTensor::new(2, 2, vec![0.0; 3]).is_none());
  }
}
