//! 出站操作的完成句柄。
//!
//! # 教案式说明
//! - **意图（Why）**：`write`/`close` 的效果只有在链路头部真正交给通道后才算完成，调用方需要一个
//!   立即返回、稍后完成的观察者；
//! - **逻辑（How）**：[`ChannelPromise`] 持有 `futures::channel::oneshot` 的发送端，
//!   [`ChannelFuture`] 通过 `Shared` 包装接收端，因此可以被任意克隆、多处等待；
//! - **契约（What）**：每个 Promise 恰好完成一次；未完成即被丢弃时自动以
//!   [`ChannelError::PromiseDropped`] 完成，观察者不会永远挂起。

use core::fmt;
use core::pin::Pin;
use core::task::{Context, Poll};

use futures::channel::oneshot;
use futures::future::{FutureExt, Shared};

use crate::error::{ChannelError, Result};

type Completion = Result<()>;

/// 单次完成的出站 Promise。
pub struct ChannelPromise {
    sender: Option<oneshot::Sender<Completion>>,
    future: ChannelFuture,
}

impl ChannelPromise {
    /// 创建尚未完成的 Promise。
    pub fn new() -> Self {
        let (sender, receiver) = oneshot::channel();
        Self {
            sender: Some(sender),
            future: ChannelFuture {
                inner: receiver.shared(),
            },
        }
    }

    /// 获取与之配对的观察者，可多次调用。
    pub fn future(&self) -> ChannelFuture {
        self.future.clone()
    }

    /// 以成功完成。
    pub fn succeed(self) {
        self.complete(Ok(()));
    }

    /// 以失败完成。
    pub fn fail(self, error: ChannelError) {
        self.complete(Err(error));
    }

    /// 以给定结果完成。
    pub fn complete(mut self, result: Completion) {
        if let Some(sender) = self.sender.take() {
            // 观察者可能已全部释放，此时结果无人接收。
            let _ = sender.send(result);
        }
    }
}

impl Default for ChannelPromise {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ChannelPromise {
    fn drop(&mut self) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(Err(ChannelError::PromiseDropped));
        }
    }
}

impl fmt::Debug for ChannelPromise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelPromise")
            .field("completed", &self.sender.is_none())
            .finish()
    }
}

/// 出站操作的观察者。
#[derive(Clone)]
pub struct ChannelFuture {
    inner: Shared<oneshot::Receiver<Completion>>,
}

impl ChannelFuture {
    /// 非阻塞地查看结果；尚未完成时返回 `None`。
    pub fn try_result(&self) -> Option<Completion> {
        self.inner
            .clone()
            .now_or_never()
            .map(|outcome| outcome.unwrap_or(Err(ChannelError::PromiseDropped)))
    }

    /// 是否已经完成。
    pub fn is_done(&self) -> bool {
        self.try_result().is_some()
    }
}

impl core::future::Future for ChannelFuture {
    type Output = Completion;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner
            .poll_unpin(cx)
            .map(|outcome| outcome.unwrap_or(Err(ChannelError::PromiseDropped)))
    }
}

impl fmt::Debug for ChannelFuture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelFuture")
            .field("done", &self.is_done())
            .finish()
    }
}
