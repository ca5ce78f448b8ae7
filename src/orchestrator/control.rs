//! 暂停 / 恢复 / 停止
//!
//! 工作循环只在检查点读取运行状态，不会中断正在进行的网络请求；
//! 计时等待（轮次间隔、投递间隔、限制期轮询）会被暂停和停止立即打断。

use std::time::Duration;

use tokio::sync::watch;

/// 全局运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Paused,
    Stopped,
}

/// 运行状态的唯一写入方，由编排器持有
#[derive(Debug)]
pub struct RunControl {
    tx: watch::Sender<RunState>,
}

impl Default for RunControl {
    fn default() -> Self {
        Self::new()
    }
}

impl RunControl {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(RunState::Running);
        Self { tx }
    }

    pub fn handle(&self) -> ControlHandle {
        ControlHandle {
            rx: self.tx.subscribe(),
        }
    }

    pub fn state(&self) -> RunState {
        *self.tx.borrow()
    }

    /// 暂停；已停止时无效。返回状态是否发生变化
    pub fn pause(&self) -> bool {
        self.tx.send_if_modified(|s| {
            if *s == RunState::Running {
                *s = RunState::Paused;
                true
            } else {
                false
            }
        })
    }

    /// 恢复；已停止时无效。返回状态是否发生变化
    pub fn resume(&self) -> bool {
        self.tx.send_if_modified(|s| {
            if *s == RunState::Paused {
                *s = RunState::Running;
                true
            } else {
                false
            }
        })
    }

    /// 停止，不可恢复
    pub fn stop(&self) {
        self.tx.send_replace(RunState::Stopped);
    }
}

/// 工作循环持有的只读句柄
#[derive(Debug, Clone)]
pub struct ControlHandle {
    rx: watch::Receiver<RunState>,
}

impl ControlHandle {
    /// 当前状态；写入方已不存在时视为停止
    pub fn current(&self) -> RunState {
        if self.rx.has_changed().is_err() {
            return RunState::Stopped;
        }
        *self.rx.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.current() == RunState::Running
    }

    /// 暂停期间一直等待，返回离开暂停后的状态
    pub async fn wait_while_paused(&mut self) -> RunState {
        match self.rx.wait_for(|s| *s != RunState::Paused).await {
            Ok(state) => *state,
            Err(_) => RunState::Stopped,
        }
    }

    /// 可被暂停 / 停止打断的等待
    ///
    /// 完整等待结束返回 true，被打断返回 false。
    pub async fn sleep(&mut self, duration: Duration) -> bool {
        if !self.is_running() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.rx.wait_for(|s| *s != RunState::Running) => false,
        }
    }
}
