// 该文件是 Shanan （山南西风） 项目的一部分。
// src/task.rs - 基准任务循环
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

use std::{fmt, sync::mpsc, thread, time::Duration};
use tracing::{info, warn};

use crate::{
  frame::Frame,
  model::{DetectResult, Model},
  output::Render,
};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<BenchmarkSummary, Self::Error>;
}

/// 一次运行的统计：帧数与推理总耗时（毫秒）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchmarkSummary {
  pub name: String,
  pub frames: usize,
  pub total_ms: u128,
}

impl BenchmarkSummary {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      frames: 0,
      total_ms: 0,
    }
  }

  /// 只累计整毫秒
  pub fn record(&mut self, elapsed: Duration) {
    self.frames += 1;
    self.total_ms += elapsed.as_millis();
  }

  pub fn mean_ms(&self) -> u128 {
    if self.frames == 0 {
      0
    } else {
      self.total_ms / self.frames as u128
    }
  }
}

impl fmt::Display for BenchmarkSummary {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{}: {} frames processed in {} ms({} mspf).",
      self.name,
      self.frames,
      self.total_ms,
      self.mean_ms()
    )
  }
}

fn process_frame<M, O>(
  frame: &Frame,
  model: &mut M,
  output: &O,
  summary: &mut BenchmarkSummary,
) -> anyhow::Result<()>
where
  M: Model<Input = Frame, Output = DetectResult>,
  M::Error: std::error::Error + Sync + Send + 'static,
  O: Render<Frame, DetectResult>,
  O::Error: std::error::Error + Sync + Send + 'static,
{
  let result = model.infer(frame)?;
  info!(
    "第 {} 帧推理完成，耗时: {} ms，检测到 {} 个物体",
    frame.index(),
    result.elapsed.as_millis(),
    result.len()
  );
  summary.record(result.elapsed);
  output.render_result(frame, &result)?;
  Ok(())
}

/// 单张图像：处理一帧后结束
pub struct OneShotTask {
  name: String,
}

impl OneShotTask {
  pub fn new(name: impl Into<String>) -> Self {
    Self { name: name.into() }
  }
}

impl<I, M, O> Task<I, M, O> for OneShotTask
where
  I: Iterator<Item = Frame>,
  M: Model<Input = Frame, Output = DetectResult>,
  M::Error: std::error::Error + Sync + Send + 'static,
  O: Render<Frame, DetectResult>,
  O::Error: std::error::Error + Sync + Send + 'static,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, mut model: M, output: O) -> Result<BenchmarkSummary, Self::Error> {
    info!("开始任务...");
    let mut summary = BenchmarkSummary::new(self.name);
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    process_frame(&frame, &mut model, &output, &mut summary)?;
    info!("任务完成，退出");
    Ok(summary)
  }
}

/// 视频流：逐帧处理直到流结束、达到帧数上限或收到中断信号
#[derive(Debug)]
pub struct ContinuousTask {
  name: String,
  frame_number: Option<usize>,
  handle_interrupt: bool,
}

impl ContinuousTask {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      frame_number: None,
      handle_interrupt: true,
    }
  }

  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  pub fn with_interrupt_handler(mut self, handle_interrupt: bool) -> Self {
    self.handle_interrupt = handle_interrupt;
    self
  }

  fn install_interrupt_handler(&self) -> mpsc::Receiver<()> {
    let (tx, rx) = mpsc::channel();
    if !self.handle_interrupt {
      return rx;
    }

    let result = ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    });
    if let Err(err) = result {
      warn!("无法设置 Ctrl-C 处理函数: {}", err);
    }
    rx
  }
}

impl<I, M, O> Task<I, M, O> for ContinuousTask
where
  I: Iterator<Item = Frame>,
  M: Model<Input = Frame, Output = DetectResult>,
  M::Error: std::error::Error + Sync + Send + 'static,
  O: Render<Frame, DetectResult>,
  O::Error: std::error::Error + Sync + Send + 'static,
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, mut model: M, output: O) -> Result<BenchmarkSummary, Self::Error> {
    info!("开始任务...");
    let rx = self.install_interrupt_handler();
    let mut summary = BenchmarkSummary::new(self.name.clone());

    for frame in input {
      process_frame(&frame, &mut model, &output, &mut summary)?;
      if self.frame_number.is_some_and(|n| summary.frames >= n) {
        info!("达到指定帧数 {}, 退出任务循环", summary.frames);
        break;
      }
      if rx.try_recv().is_ok() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!("任务完成，退出");
    Ok(summary)
  }
}
