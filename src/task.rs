// 该文件是 Computer Vision 项目的一部分。
// src/task.rs - 桌面端推理任务
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

use std::{
  thread,
  time::{Duration, Instant},
};
use tracing::{info, warn};

use crate::{model::Model, output::Render};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

pub struct OneShotTask;

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let now = Instant::now();
    let result = model.infer(&frame)?;
    info!("推理完成，耗时: {:.2?}", now.elapsed());
    output.render_result(&frame, &result)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

/// 同一帧重复推理，统计预热之后的平均耗时
#[derive(Debug, Clone, Copy)]
pub struct RepeatShotTask {
  repeat: usize,
  warmup: usize,
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    Self {
      repeat: 1000,
      warmup: 2,
    }
  }
}

impl RepeatShotTask {
  pub fn with_repeat(mut self, repeat: usize) -> Self {
    self.repeat = repeat;
    self
  }

  pub fn with_warmup(mut self, warmup: usize) -> Self {
    self.warmup = warmup;
    self
  }

  pub fn average(&self, times: &[Duration]) -> Option<Duration> {
    let measured = times.get(self.warmup..).filter(|t| !t.is_empty())?;
    Some(measured.iter().sum::<Duration>() / measured.len() as u32)
  }
}

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for RepeatShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let mut times = Vec::with_capacity(self.repeat);
    for i in 0..self.repeat {
      let now = Instant::now();
      let result = model.infer(&frame)?;
      let elapsed = now.elapsed();
      info!("({})推理完成，耗时: {:.2?}", i, elapsed);
      output.render_result(&frame, &result)?;
      times.push(elapsed);
    }

    match self.average(&times) {
      Some(average) => warn!("平均推理时间: {:.2?}", average),
      None => warn!("重复次数 {} 不超过预热次数 {}", self.repeat, self.warmup),
    }

    Ok(())
  }
}

#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }
}

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for ContinuousTask
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let (tx, rx) = std::sync::mpsc::channel();

    let handler = ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    });
    if let Err(e) = handler {
      warn!("无法注册 Ctrl-C 处理: {}", e);
    }

    let mut frame_index = 0usize;
    let mut now = Instant::now();
    for frame in input {
      frame_index = frame_index.saturating_add(1);
      info!("处理第 {} 帧图像", frame_index);
      let result = model.infer(&frame)?;
      let elapsed_a = now.elapsed();
      output.render_result(&frame, &result)?;
      let elapsed_b = now.elapsed();
      now = Instant::now();
      info!("推理完成，耗时: {:.2?} / {:.2?}", elapsed_a, elapsed_b);
      if self.frame_number.map(|n| frame_index >= n).unwrap_or(false) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
      if rx.try_recv().is_ok() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!("任务完成，退出");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::{cell::RefCell, convert::Infallible};

  struct Double;

  impl Model for Double {
    type Input = u32;
    type Output = u32;
    type Error = Infallible;

    fn infer(&self, input: &u32) -> Result<u32, Infallible> {
      Ok(input * 2)
    }
  }

  #[derive(Default)]
  struct Collect(RefCell<Vec<(u32, u32)>>);

  impl Render<u32, u32> for &Collect {
    type Error = Infallible;

    fn render_result(&self, frame: &u32, result: &u32) -> Result<(), Infallible> {
      self.0.borrow_mut().push((*frame, *result));
      Ok(())
    }
  }

  #[test]
  fn one_shot_uses_first_frame() {
    let collect = Collect::default();
    OneShotTask
      .run_task([3u32, 4].into_iter(), Double, &collect)
      .unwrap();
    assert_eq!(*collect.0.borrow(), vec![(3, 6)]);
  }

  #[test]
  fn one_shot_without_input_fails() {
    let collect = Collect::default();
    assert!(
      OneShotTask
        .run_task(std::iter::empty::<u32>(), Double, &collect)
        .is_err()
    );
  }

  #[test]
  fn repeat_shot_renders_every_run() {
    let collect = Collect::default();
    RepeatShotTask::default()
      .with_repeat(5)
      .run_task([7u32].into_iter(), Double, &collect)
      .unwrap();
    assert_eq!(collect.0.borrow().len(), 5);
    assert!(collect.0.borrow().iter().all(|r| *r == (7, 14)));
  }

  #[test]
  fn average_skips_warmup() {
    let task = RepeatShotTask::default().with_warmup(1);
    let times = [
      Duration::from_millis(100),
      Duration::from_millis(10),
      Duration::from_millis(20),
    ];
    assert_eq!(task.average(&times), Some(Duration::from_millis(15)));
    assert_eq!(task.average(&times[..1]), None);
    assert_eq!(task.average(&[]), None);
  }

  #[test]
  fn continuous_stops_at_frame_number() {
    let collect = Collect::default();
    ContinuousTask::default()
      .with_frame_number(Some(2))
      .run_task(1u32..10, Double, &collect)
      .unwrap();
    assert_eq!(*collect.0.borrow(), vec![(1, 2), (2, 4)]);
  }
}
