// 该文件是 Computer Vision 项目的一部分。
// src/bridge.rs - com.computer.vision.App 的 JNI 入口
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

//! 所有入口都不会让错误或 panic 越过 FFI 边界：
//! 失败时抛出 Java 异常并返回 null。

use std::{
  any::Any,
  ffi::c_void,
  panic::{AssertUnwindSafe, catch_unwind},
};

use jni::{
  JNIEnv,
  objects::{JByteArray, JIntArray, JObject, JString},
  sys::{JNI_VERSION_1_6, jbyte, jint, jobjectArray},
};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
  config::{ConfigError, Settings},
  frame::{FrameError, RgbaFrame},
  logging,
  model::{InferenceRequest, Model, NetworkError},
};

mod asset;
mod marshal;
mod state;

pub use self::marshal::RunParams;
pub use self::state::{BridgeDetector, configure, detector, is_loaded, load_network, release};

const ILLEGAL_STATE: &str = "java/lang/IllegalStateException";
const ILLEGAL_ARGUMENT: &str = "java/lang/IllegalArgumentException";
const RUNTIME: &str = "java/lang/RuntimeException";

#[derive(Error, Debug)]
pub enum BridgeError {
  #[error("JNI 错误: {0}")]
  Jni(#[from] jni::errors::Error),
  #[error("网络未加载")]
  NotLoaded,
  #[error("参数无效: {0}")]
  InvalidArgument(String),
  #[error("{0}")]
  Frame(#[from] FrameError),
  #[error("{0}")]
  Network(#[from] NetworkError),
  #[error("{0}")]
  Config(#[from] ConfigError),
}

impl BridgeError {
  pub fn exception_class(&self) -> &'static str {
    match self {
      BridgeError::NotLoaded => ILLEGAL_STATE,
      BridgeError::InvalidArgument(_) | BridgeError::Frame(_) | BridgeError::Config(_) => {
        ILLEGAL_ARGUMENT
      }
      BridgeError::Network(NetworkError::ModelInvalid(_)) => ILLEGAL_ARGUMENT,
      BridgeError::Jni(_) | BridgeError::Network(_) => RUNTIME,
    }
  }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(msg) = payload.downcast_ref::<&str>() {
    msg.to_string()
  } else if let Some(msg) = payload.downcast_ref::<String>() {
    msg.clone()
  } else {
    "未知 panic".to_string()
  }
}

fn throw(env: &mut JNIEnv<'_>, class: &str, message: &str) {
  // 已有挂起的 Java 异常时保留它
  if env.exception_check().unwrap_or(true) {
    return;
  }
  if let Err(e) = env.throw_new(class, message) {
    error!("抛出 {} 失败: {}", class, e);
  }
}

fn guard<'local, T>(
  env: &mut JNIEnv<'local>,
  name: &str,
  fallback: T,
  f: impl FnOnce(&mut JNIEnv<'local>) -> Result<T, BridgeError>,
) -> T {
  logging::init();
  match catch_unwind(AssertUnwindSafe(|| f(env))) {
    Ok(Ok(value)) => value,
    Ok(Err(e)) => {
      error!("{} 失败: {}", name, e);
      throw(env, e.exception_class(), &e.to_string());
      fallback
    }
    Err(payload) => {
      let msg = panic_message(payload.as_ref());
      error!("{} panic: {}", name, msg);
      throw(env, RUNTIME, &msg);
      fallback
    }
  }
}

#[allow(non_snake_case)]
#[unsafe(no_mangle)]
pub extern "system" fn JNI_OnLoad(_vm: *mut jni::sys::JavaVM, _reserved: *mut c_void) -> jint {
  logging::init();
  info!("{} {} 已加载", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
  JNI_VERSION_1_6
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_computer_vision_App_load<'local>(
  mut env: JNIEnv<'local>,
  _this: JObject<'local>,
  id: jbyte,
  assets: JObject<'local>,
) {
  guard(&mut env, "load", (), |env| {
    let model = asset::read_asset(env, &assets, &asset::model_asset_name(id))?;
    load_network(model)
  })
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_computer_vision_App_loadModel<'local>(
  mut env: JNIEnv<'local>,
  _this: JObject<'local>,
  model: JByteArray<'local>,
) {
  guard(&mut env, "loadModel", (), |env| {
    let model = marshal::read_bytes(env, &model)?;
    load_network(model)
  })
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_computer_vision_App_configure<'local>(
  mut env: JNIEnv<'local>,
  _this: JObject<'local>,
  json: JString<'local>,
) {
  guard(&mut env, "configure", (), |env| {
    if json.is_null() {
      return Err(BridgeError::InvalidArgument("配置为空".to_string()));
    }
    let json: String = env.get_string(&json)?.into();
    let settings = Settings::from_json(&json)?;
    if is_loaded() {
      warn!("网络选项在下一次加载时生效");
    }
    configure(settings);
    Ok(())
  })
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_computer_vision_App_run<'local>(
  mut env: JNIEnv<'local>,
  _this: JObject<'local>,
  bytes: JByteArray<'local>,
  params: JIntArray<'local>,
) -> jobjectArray {
  guard(&mut env, "run", std::ptr::null_mut(), |env| {
    let params = RunParams::parse(&marshal::read_ints(env, &params)?)?;
    let detector = detector()?;
    let (frame_w, frame_h) = params.frame_size(detector.settings());
    let frame = RgbaFrame::new(marshal::read_bytes(env, &bytes)?, frame_w, frame_h)?;
    debug!("run: {:?}, 帧 {}x{}", params, frame_w, frame_h);

    let request =
      InferenceRequest::new(frame, params.mode).with_view(params.view_w, params.view_h);
    let result = detector.infer(&request)?;
    Ok(marshal::to_float_rows(env, &result.to_rows())?.into_raw())
  })
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_computer_vision_App_objectDetection<'local>(
  mut env: JNIEnv<'local>,
  _this: JObject<'local>,
  bytes: JByteArray<'local>,
  width: jint,
) -> jobjectArray {
  guard(&mut env, "objectDetection", std::ptr::null_mut(), |env| {
    let detector = detector()?;
    let frame = marshal::frame_with_width(marshal::read_bytes(env, &bytes)?, width)?;
    let boxes = detector.frame_boxes(&frame)?;
    debug!("objectDetection: {} 个物体", boxes.len());
    Ok(marshal::to_int_rows(env, &boxes)?.into_raw())
  })
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_computer_vision_App_release<'local>(
  mut env: JNIEnv<'local>,
  _this: JObject<'local>,
) {
  guard(&mut env, "release", (), |_| {
    if release() {
      info!("网络已释放");
    }
    Ok(())
  })
}
