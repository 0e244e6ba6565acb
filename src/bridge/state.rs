// 该文件是 Computer Vision 项目的一部分。
// src/bridge/state.rs - 进程内唯一的网络句柄
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

use std::sync::Arc;

use parking_lot::{RwLock, const_rwlock};
use tracing::info;

use crate::{
  bridge::BridgeError,
  config::Settings,
  frame::{INPUT_H, INPUT_W},
  model::{Detector, Network, NetworkBuilder},
};

pub type BridgeDetector = Detector<INPUT_W, INPUT_H>;

// 推理中的调用持有 Arc，重新加载不会释放正在使用的网络
static NETWORK: RwLock<Option<Arc<Network>>> = const_rwlock(None);
static SETTINGS: RwLock<Option<Settings>> = const_rwlock(None);

pub fn current_settings() -> Settings {
  SETTINGS.read().clone().unwrap_or_default()
}

pub fn configure(settings: Settings) {
  info!("更新推理配置");
  *SETTINGS.write() = Some(settings);
}

/// 先释放旧网络，再从模型数据创建新网络
pub fn load_network(model: Vec<u8>) -> Result<(), BridgeError> {
  if release() {
    info!("已释放旧网络");
  }

  let settings = current_settings();
  let network = NetworkBuilder::from_bytes(model)
    .options(settings.network.clone())
    .output_name(settings.output_name.clone())
    .build()?;

  *NETWORK.write() = Some(Arc::new(network));
  Ok(())
}

pub fn release() -> bool {
  NETWORK.write().take().is_some()
}

pub fn is_loaded() -> bool {
  NETWORK.read().is_some()
}

pub fn detector() -> Result<BridgeDetector, BridgeError> {
  let network = NETWORK.read().clone().ok_or(BridgeError::NotLoaded)?;
  Ok(Detector::new(network, current_settings()))
}
