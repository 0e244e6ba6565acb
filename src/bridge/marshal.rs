// 该文件是 Computer Vision 项目的一部分。
// src/bridge/marshal.rs - Java 参数与返回值转换
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

use jni::{
  JNIEnv,
  objects::{JByteArray, JIntArray, JObject, JObjectArray},
  sys::jint,
};

use crate::{bridge::BridgeError, config::Settings, frame::RgbaFrame, model::TaskMode};

/// `run` 的整数参数：`[mode, view_w, view_h, (frame_w, frame_h)]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunParams {
  pub mode: TaskMode,
  pub view_w: u32,
  pub view_h: u32,
  pub frame: Option<(u32, u32)>,
}

fn positive(value: i32, name: &str) -> Result<u32, BridgeError> {
  u32::try_from(value)
    .ok()
    .filter(|v| *v > 0)
    .ok_or_else(|| BridgeError::InvalidArgument(format!("{} 必须为正数, 实际为 {}", name, value)))
}

impl RunParams {
  pub fn parse(params: &[i32]) -> Result<Self, BridgeError> {
    let [mode, view_w, view_h, rest @ ..] = params else {
      return Err(BridgeError::InvalidArgument(format!(
        "参数至少需要 3 个, 实际为 {}",
        params.len()
      )));
    };

    let frame = match rest {
      [] => None,
      [frame_w, frame_h, ..] => Some((positive(*frame_w, "帧宽")?, positive(*frame_h, "帧高")?)),
      [_] => {
        return Err(BridgeError::InvalidArgument(
          "帧尺寸需要同时给出宽和高".to_string(),
        ));
      }
    };

    Ok(Self {
      mode: TaskMode::from(*mode),
      view_w: positive(*view_w, "预览宽")?,
      view_h: positive(*view_h, "预览高")?,
      frame,
    })
  }

  pub fn frame_size(&self, settings: &Settings) -> (u32, u32) {
    self
      .frame
      .unwrap_or((settings.frame_width, settings.frame_height))
  }
}

pub fn read_bytes(env: &JNIEnv<'_>, bytes: &JByteArray<'_>) -> Result<Vec<u8>, BridgeError> {
  if bytes.is_null() {
    return Err(BridgeError::InvalidArgument("字节数组为空".to_string()));
  }
  Ok(env.convert_byte_array(bytes)?)
}

pub fn read_ints(env: &JNIEnv<'_>, ints: &JIntArray<'_>) -> Result<Vec<i32>, BridgeError> {
  if ints.is_null() {
    return Err(BridgeError::InvalidArgument("整数数组为空".to_string()));
  }
  let len = env.get_array_length(ints)? as usize;
  let mut values = vec![0; len];
  env.get_int_array_region(ints, 0, &mut values)?;
  Ok(values)
}

/// 宽度给定时由数据长度推出高度
pub fn frame_with_width(data: Vec<u8>, width: jint) -> Result<RgbaFrame, BridgeError> {
  let width = positive(width, "帧宽")?;
  Ok(RgbaFrame::with_width(data, width)?)
}

pub fn to_float_rows<'local>(
  env: &mut JNIEnv<'local>,
  rows: &[Vec<f32>],
) -> Result<JObjectArray<'local>, BridgeError> {
  let array = env.new_object_array(rows.len() as i32, "[F", JObject::null())?;
  for (i, row) in rows.iter().enumerate() {
    let item = env.new_float_array(row.len() as i32)?;
    env.set_float_array_region(&item, 0, row)?;
    env.set_object_array_element(&array, i as i32, &item)?;
    env.delete_local_ref(item)?;
  }
  Ok(array)
}

pub fn to_int_rows<'local, const N: usize>(
  env: &mut JNIEnv<'local>,
  rows: &[[i32; N]],
) -> Result<JObjectArray<'local>, BridgeError> {
  let array = env.new_object_array(rows.len() as i32, "[I", JObject::null())?;
  for (i, row) in rows.iter().enumerate() {
    let item = env.new_int_array(N as i32)?;
    env.set_int_array_region(&item, 0, row)?;
    env.set_object_array_element(&array, i as i32, &item)?;
    env.delete_local_ref(item)?;
  }
  Ok(array)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_view_only_params() {
    let params = RunParams::parse(&[2, 1080, 1920]).unwrap();
    assert_eq!(params.mode, TaskMode::KeypointDetection);
    assert_eq!((params.view_w, params.view_h), (1080, 1920));
    assert_eq!(params.frame, None);
    assert_eq!(params.frame_size(&Settings::default()), (640, 480));
  }

  #[test]
  fn parses_explicit_frame_size() {
    let params = RunParams::parse(&[1, 720, 1280, 1280, 720]).unwrap();
    assert_eq!(params.mode, TaskMode::ObjectDetection);
    assert_eq!(params.frame_size(&Settings::default()), (1280, 720));
  }

  #[test]
  fn unknown_mode_is_raw() {
    let params = RunParams::parse(&[9, 1, 1]).unwrap();
    assert_eq!(params.mode, TaskMode::Raw(9));
  }

  #[test]
  fn rejects_bad_params() {
    assert!(matches!(
      RunParams::parse(&[1, 2]),
      Err(BridgeError::InvalidArgument(_))
    ));
    assert!(matches!(
      RunParams::parse(&[1, 0, 640]),
      Err(BridgeError::InvalidArgument(_))
    ));
    assert!(matches!(
      RunParams::parse(&[1, 480, 640, 640]),
      Err(BridgeError::InvalidArgument(_))
    ));
    assert!(matches!(
      RunParams::parse(&[1, 480, 640, -640, 480]),
      Err(BridgeError::InvalidArgument(_))
    ));
  }

  #[test]
  fn frame_height_follows_from_length() {
    let frame = frame_with_width(vec![0; 8 * 2 * 4], 8).unwrap();
    assert_eq!((frame.width(), frame.height()), (8, 2));
    assert!(matches!(
      frame_with_width(vec![0; 16], 0),
      Err(BridgeError::InvalidArgument(_))
    ));
    assert!(matches!(
      frame_with_width(vec![0; 30], 4),
      Err(BridgeError::Frame(_))
    ));
  }
}
