// 该文件是 Computer Vision 项目的一部分。
// src/model/network.rs - ONNX 网络加载与推理
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

use ort::{session::Session, value::TensorRef};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::NchwTensor,
  model::{NetworkOptions, OutputTensor},
};

const NETWORK_NUM_INPUTS: usize = 1;
pub const DEFAULT_OUTPUT_NAME: &str = "output0";

#[derive(Error, Debug)]
pub enum NetworkError {
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] std::io::Error),
  #[error("模型无效: {0}")]
  ModelInvalid(String),
  #[error("ONNX Runtime 错误: {0}")]
  OrtError(#[from] ort::Error),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("输出张量形状无效: {0:?}")]
  OutputShape(Vec<usize>),
}

enum ModelSource {
  File(PathBuf),
  Memory(Vec<u8>),
}

pub struct NetworkBuilder {
  source: ModelSource,
  options: NetworkOptions,
  output_name: String,
}

impl FromUrlWithScheme for NetworkBuilder {
  const SCHEME: &'static str = "onnx";
}

impl FromUrl for NetworkBuilder {
  type Error = NetworkError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(NetworkError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    Ok(Self::from_path(url.path()))
  }
}

impl NetworkBuilder {
  pub fn from_path(path: impl Into<PathBuf>) -> Self {
    Self {
      source: ModelSource::File(path.into()),
      options: NetworkOptions::default(),
      output_name: DEFAULT_OUTPUT_NAME.to_string(),
    }
  }

  pub fn from_bytes(data: Vec<u8>) -> Self {
    Self {
      source: ModelSource::Memory(data),
      options: NetworkOptions::default(),
      output_name: DEFAULT_OUTPUT_NAME.to_string(),
    }
  }

  pub fn options(mut self, options: NetworkOptions) -> Self {
    self.options = options;
    self
  }

  pub fn output_name(mut self, name: impl Into<String>) -> Self {
    self.output_name = name.into();
    self
  }

  pub fn build(self) -> Result<Network, NetworkError> {
    let model_data = match self.source {
      ModelSource::File(path) => {
        info!("加载模型文件: {}", path.display());
        std::fs::read(&path)?
      }
      ModelSource::Memory(data) => data,
    };
    if model_data.is_empty() {
      return Err(NetworkError::ModelInvalid("模型数据为空".to_string()));
    }
    debug!(
      "模型文件大小: {:.2} MB",
      model_data.len() as f64 / (1024.0 * 1024.0)
    );

    info!("创建 ONNX Runtime 推理会话");
    let builder = self.options.apply(Session::builder()?)?;
    let session = builder.commit_from_memory(&model_data)?;

    let num_inputs = session.inputs.len();
    if num_inputs != NETWORK_NUM_INPUTS {
      error!(
        "预期模型输入数量为 {}, 实际为 {}",
        NETWORK_NUM_INPUTS, num_inputs
      );
      return Err(NetworkError::ModelInvalid(format!(
        "预期模型输入数量为 {}, 实际为 {}",
        NETWORK_NUM_INPUTS, num_inputs
      )));
    }

    let output_names: Vec<&str> = session
      .outputs
      .iter()
      .map(|output| output.name.as_str())
      .collect();
    debug!("模型输入: {}", session.inputs[0].name);
    debug!("模型输出: {:?}", output_names);
    if !output_names.contains(&self.output_name.as_str()) {
      error!("模型中没有名为 {} 的输出", self.output_name);
      return Err(NetworkError::ModelInvalid(format!(
        "模型中没有名为 {} 的输出, 可用输出: {:?}",
        self.output_name, output_names
      )));
    }

    info!("模型加载完成");
    Ok(Network {
      session: Mutex::new(session),
      output_name: self.output_name,
    })
  }
}

/// 已加载的网络；会话同一时间只服务一次推理
pub struct Network {
  session: Mutex<Session>,
  output_name: String,
}

impl Network {
  pub fn output_name(&self) -> &str {
    &self.output_name
  }

  pub fn forward<const W: u32, const H: u32>(
    &self,
    input: &NchwTensor<W, H>,
  ) -> Result<OutputTensor, NetworkError> {
    let tensor_ref = TensorRef::from_array_view(input.as_array().view())?;

    let mut session = self.session.lock();
    debug!("执行模型推理");
    let outputs = session.run(ort::inputs![tensor_ref])?;

    let view = outputs[self.output_name.as_str()].try_extract_array::<f32>()?;
    let shape = view.shape().to_vec();
    debug!("输出张量形状: {:?}", shape);

    OutputTensor::from_view(view).ok_or(NetworkError::OutputShape(shape))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const IDENTITY: &[u8] = include_bytes!("../../tests/data/identity.onnx");
  const IDENTITY_RENAMED: &[u8] = include_bytes!("../../tests/data/identity_renamed.onnx");
  const TWO_INPUTS: &[u8] = include_bytes!("../../tests/data/two_inputs.onnx");

  #[test]
  fn empty_model_is_invalid() {
    assert!(matches!(
      NetworkBuilder::from_bytes(Vec::new()).build(),
      Err(NetworkError::ModelInvalid(_))
    ));
  }

  #[test]
  fn model_needs_a_single_input() {
    assert!(matches!(
      NetworkBuilder::from_bytes(TWO_INPUTS.to_vec()).build(),
      Err(NetworkError::ModelInvalid(_))
    ));
  }

  #[test]
  fn model_needs_the_configured_output() {
    assert!(matches!(
      NetworkBuilder::from_bytes(IDENTITY_RENAMED.to_vec()).build(),
      Err(NetworkError::ModelInvalid(_))
    ));

    let network = NetworkBuilder::from_bytes(IDENTITY_RENAMED.to_vec())
      .output_name("y")
      .build()
      .unwrap();
    assert_eq!(network.output_name(), "y");
  }

  #[test]
  fn forward_returns_rows_of_the_last_dimension() {
    let network = NetworkBuilder::from_bytes(IDENTITY.to_vec()).build().unwrap();
    let output = network.forward(&NchwTensor::<2, 2>::filled(0.5)).unwrap();
    assert_eq!((output.rows(), output.cols()), (6, 2));
    assert!(output.iter_rows().flatten().all(|v| *v == 0.5));
  }

  #[test]
  fn url_needs_onnx_scheme() {
    let url = Url::parse("file:///models/1.onnx").unwrap();
    assert!(matches!(
      NetworkBuilder::from_url(&url),
      Err(NetworkError::ModelPathError(_))
    ));
    let url = Url::parse("onnx:///models/1.onnx").unwrap();
    assert!(NetworkBuilder::from_url(&url).is_ok());
  }
}
