// 该文件是 Computer Vision 项目的一部分。
// src/model/options.rs - 推理加速选项
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

use std::num::NonZeroUsize;

use ort::{
  execution_providers::{
    CPUExecutionProvider, ExecutionProvider, NNAPIExecutionProvider, XNNPACKExecutionProvider,
  },
  session::builder::{GraphOptimizationLevel, SessionBuilder},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationLevel {
  Disable,
  Level1,
  Level2,
  Level3,
}

impl Default for OptimizationLevel {
  fn default() -> Self {
    // 32 位 ARM 的老设备吃不消激进的图优化
    if cfg!(target_arch = "arm") {
      OptimizationLevel::Level2
    } else {
      OptimizationLevel::Level3
    }
  }
}

impl From<OptimizationLevel> for GraphOptimizationLevel {
  fn from(level: OptimizationLevel) -> Self {
    match level {
      OptimizationLevel::Disable => GraphOptimizationLevel::Disable,
      OptimizationLevel::Level1 => GraphOptimizationLevel::Level1,
      OptimizationLevel::Level2 => GraphOptimizationLevel::Level2,
      OptimizationLevel::Level3 => GraphOptimizationLevel::Level3,
    }
  }
}

/// 会话选项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkOptions {
  /// 推理线程数，默认等于 CPU 核数
  pub num_threads: usize,
  /// 尝试使用 NNAPI（GPU/NPU/DSP），不可用时退回 CPU
  pub use_accelerator: bool,
  /// 允许 NNAPI 以 fp16 精度计算，速度更快但精度更低
  pub accelerator_fp16: bool,
  pub use_xnnpack: bool,
  /// 复用内存池
  pub arena_allocator: bool,
  /// 轻量模式：不预先规划内存，占用更低但稍慢
  pub light_mode: bool,
  pub parallel_execution: bool,
  pub optimization_level: OptimizationLevel,
}

fn default_threads() -> usize {
  std::thread::available_parallelism()
    .map(|n| n.get())
    .unwrap_or(4)
}

impl Default for NetworkOptions {
  fn default() -> Self {
    Self {
      num_threads: default_threads(),
      use_accelerator: true,
      accelerator_fp16: false,
      use_xnnpack: false,
      arena_allocator: true,
      light_mode: true,
      parallel_execution: false,
      optimization_level: OptimizationLevel::default(),
    }
  }
}

impl NetworkOptions {
  pub fn cpu_only() -> Self {
    Self {
      use_accelerator: false,
      use_xnnpack: false,
      ..Self::default()
    }
  }

  pub fn apply(&self, builder: SessionBuilder) -> Result<SessionBuilder, ort::Error> {
    let threads = self.num_threads.max(1);
    let mut providers = Vec::new();

    if self.use_accelerator {
      let nnapi = NNAPIExecutionProvider::default().with_fp16(self.accelerator_fp16);
      match nnapi.is_available() {
        Ok(true) => {
          info!("启用 NNAPI 加速 (fp16: {})", self.accelerator_fp16);
          providers.push(nnapi.build());
        }
        Ok(false) => debug!("NNAPI 不可用，使用 CPU 推理"),
        Err(e) => warn!("查询 NNAPI 状态失败: {}", e),
      }
    }

    if self.use_xnnpack {
      let xnnpack = XNNPACKExecutionProvider::default()
        .with_intra_op_num_threads(NonZeroUsize::new(threads).unwrap_or(NonZeroUsize::MIN));
      match xnnpack.is_available() {
        Ok(true) => {
          info!("启用 XNNPACK 加速");
          providers.push(xnnpack.build());
        }
        Ok(false) => debug!("XNNPACK 不可用"),
        Err(e) => warn!("查询 XNNPACK 状态失败: {}", e),
      }
    }

    providers.push(
      CPUExecutionProvider::default()
        .with_arena_allocator(self.arena_allocator)
        .build(),
    );

    debug!(
      "会话选项: 线程 {}, 优化级别 {:?}, 轻量模式 {}",
      threads, self.optimization_level, self.light_mode
    );

    let builder = builder.with_optimization_level(self.optimization_level.into())?;
    let builder = builder.with_intra_threads(threads)?;
    let builder = builder.with_parallel_execution(self.parallel_execution)?;
    let builder = builder.with_memory_pattern(!self.light_mode)?;
    let builder = builder.with_execution_providers(providers)?;
    Ok(builder)
  }
}
