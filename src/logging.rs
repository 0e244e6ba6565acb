// 该文件是 Computer Vision 项目的一部分。
// src/logging.rs - 日志初始化
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

use std::sync::Once;

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

static INIT: Once = Once::new();

/// 安卓上写入 logcat，其余平台写入标准输出。可重复调用。
pub fn init() {
  INIT.call_once(|| {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    #[cfg(target_os = "android")]
    {
      use tracing_subscriber::prelude::*;
      let _ = tracing_subscriber::registry()
        .with(filter)
        .with(paranoid_android::layer(env!("CARGO_PKG_NAME")))
        .try_init();
    }

    #[cfg(not(target_os = "android"))]
    {
      let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }
  });
}
