// 该文件是 Computer Vision 项目的一部分。
// src/bridge/asset.rs - 通过 AssetManager 读取模型
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
  errors::Error as JniError,
  objects::{JByteArray, JObject, JThrowable, JValue},
};
use tracing::{debug, info, warn};

use crate::bridge::BridgeError;

const CHUNK_SIZE: i32 = 64 * 1024;

pub fn model_asset_name(id: i8) -> String {
  format!("{}.onnx", id)
}

/// 分块读取、可关闭的流。读取失败时 Java 端可能留有未处理的异常，
/// 在此期间不能再调用任何 Java 方法。
trait ChunkStream {
  type Error;
  type Pending;

  /// 追加一块数据，流结束时返回 `false`
  fn read_into(&mut self, data: &mut Vec<u8>) -> Result<bool, Self::Error>;
  fn close(&mut self) -> Result<(), Self::Error>;
  fn take_pending(&mut self) -> Result<Option<Self::Pending>, Self::Error>;
  fn restore(&mut self, pending: Self::Pending) -> Result<(), Self::Error>;
}

/// 读到流结束，无论成败都关闭流；读取时抛出的异常在关闭后原样放回
fn drain<S: ChunkStream>(stream: &mut S) -> Result<Vec<u8>, S::Error> {
  let mut data = Vec::new();
  let result = loop {
    match stream.read_into(&mut data) {
      Ok(true) => {}
      Ok(false) => break Ok(()),
      Err(e) => break Err(e),
    }
  };

  let pending = stream.take_pending()?;
  let closed = stream.close();
  if let Some(pending) = pending {
    // close 自己的异常丢弃
    if stream.take_pending()?.is_some() {
      warn!("关闭资源流失败");
    }
    stream.restore(pending)?;
    result?;
    return Ok(data);
  }

  result?;
  closed?;
  Ok(data)
}

struct JavaStream<'a, 'local> {
  env: &'a mut JNIEnv<'local>,
  stream: JObject<'local>,
  buffer: JByteArray<'local>,
  chunk: Vec<i8>,
}

impl<'local> ChunkStream for JavaStream<'_, 'local> {
  type Error = JniError;
  type Pending = JThrowable<'local>;

  fn read_into(&mut self, data: &mut Vec<u8>) -> Result<bool, Self::Error> {
    let read = self
      .env
      .call_method(
        &self.stream,
        "read",
        "([BII)I",
        &[
          JValue::Object(&self.buffer),
          JValue::Int(0),
          JValue::Int(CHUNK_SIZE),
        ],
      )?
      .i()?;
    if read < 0 {
      return Ok(false);
    }
    let read = (read as usize).min(self.chunk.len());
    self
      .env
      .get_byte_array_region(&self.buffer, 0, &mut self.chunk[..read])?;
    data.extend(self.chunk[..read].iter().map(|b| *b as u8));
    Ok(true)
  }

  fn close(&mut self) -> Result<(), Self::Error> {
    self.env.call_method(&self.stream, "close", "()V", &[])?;
    Ok(())
  }

  fn take_pending(&mut self) -> Result<Option<Self::Pending>, Self::Error> {
    if !self.env.exception_check()? {
      return Ok(None);
    }
    let exception = self.env.exception_occurred()?;
    self.env.exception_clear()?;
    Ok(Some(exception))
  }

  fn restore(&mut self, pending: Self::Pending) -> Result<(), Self::Error> {
    self.env.throw(pending)
  }
}

/// `assets.open(name)` 后循环 `InputStream.read` 直到流结束
pub fn read_asset<'local>(
  env: &mut JNIEnv<'local>,
  assets: &JObject<'_>,
  name: &str,
) -> Result<Vec<u8>, BridgeError> {
  if assets.is_null() {
    return Err(BridgeError::InvalidArgument(
      "AssetManager 为空".to_string(),
    ));
  }

  info!("读取模型资源: {}", name);
  let jname = env.new_string(name)?;
  // 先分配缓冲区，流一旦打开就只剩 drain 一条路径
  let buffer = env.new_byte_array(CHUNK_SIZE)?;
  let stream = env
    .call_method(
      assets,
      "open",
      "(Ljava/lang/String;)Ljava/io/InputStream;",
      &[JValue::Object(&jname)],
    )?
    .l()?;
  env.delete_local_ref(jname)?;

  let mut source = JavaStream {
    env: &mut *env,
    stream,
    buffer,
    chunk: vec![0; CHUNK_SIZE as usize],
  };
  let data = drain(&mut source)?;
  let JavaStream { stream, buffer, .. } = source;
  env.delete_local_ref(buffer)?;
  env.delete_local_ref(stream)?;

  debug!("模型资源 {} 大小: {} 字节", name, data.len());
  Ok(data)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::VecDeque;

  /// 读取失败时记下异常；异常未清除时关闭会失败
  #[derive(Default)]
  struct FakeStream {
    chunks: VecDeque<Result<Vec<u8>, &'static str>>,
    pending: Option<&'static str>,
    close_error: Option<&'static str>,
    closed: bool,
  }

  impl ChunkStream for FakeStream {
    type Error = &'static str;
    type Pending = &'static str;

    fn read_into(&mut self, data: &mut Vec<u8>) -> Result<bool, Self::Error> {
      match self.chunks.pop_front() {
        Some(Ok(chunk)) => {
          data.extend(chunk);
          Ok(true)
        }
        Some(Err(e)) => {
          self.pending = Some(e);
          Err(e)
        }
        None => Ok(false),
      }
    }

    fn close(&mut self) -> Result<(), Self::Error> {
      if self.pending.is_some() {
        return Err("close with pending exception");
      }
      if let Some(e) = self.close_error {
        self.pending = Some(e);
        return Err(e);
      }
      self.closed = true;
      Ok(())
    }

    fn take_pending(&mut self) -> Result<Option<Self::Pending>, Self::Error> {
      Ok(self.pending.take())
    }

    fn restore(&mut self, pending: Self::Pending) -> Result<(), Self::Error> {
      self.pending = Some(pending);
      Ok(())
    }
  }

  #[test]
  fn asset_name_uses_model_id() {
    assert_eq!(model_asset_name(1), "1.onnx");
    assert_eq!(model_asset_name(-3), "-3.onnx");
  }

  #[test]
  fn drain_reads_until_end_and_closes() {
    let mut stream = FakeStream {
      chunks: VecDeque::from([Ok(vec![1, 2]), Ok(vec![3])]),
      ..Default::default()
    };
    assert_eq!(drain(&mut stream), Ok(vec![1, 2, 3]));
    assert!(stream.closed);
    assert_eq!(stream.pending, None);
  }

  #[test]
  fn failed_read_closes_with_exception_cleared() {
    let mut stream = FakeStream {
      chunks: VecDeque::from([Ok(vec![1, 2]), Err("IOException")]),
      ..Default::default()
    };
    assert_eq!(drain(&mut stream), Err("IOException"));
    assert!(stream.closed);
    // 读取异常留给 Java 调用方
    assert_eq!(stream.pending, Some("IOException"));
  }

  #[test]
  fn read_exception_wins_over_close_exception() {
    let mut stream = FakeStream {
      chunks: VecDeque::from([Err("IOException")]),
      close_error: Some("close failed"),
      ..Default::default()
    };
    assert_eq!(drain(&mut stream), Err("IOException"));
    assert_eq!(stream.pending, Some("IOException"));
  }

  #[test]
  fn close_error_is_reported_after_full_read() {
    let mut stream = FakeStream {
      chunks: VecDeque::from([Ok(vec![7])]),
      close_error: Some("close failed"),
      ..Default::default()
    };
    assert_eq!(drain(&mut stream), Err("close failed"));
  }
}
