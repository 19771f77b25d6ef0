//! Handler 回调期间可见的上下文视图。
//!
//! # 教案式说明
//! - **意图（Why）**：Handler 只需要“把事件交给邻居”与“访问通道”两类能力，
//!   上下文把这两类能力收拢为一个借用视图，避免 Handler 直接触碰链路结构；
//! - **逻辑（How）**：`fire_*` 解析后继节点并调用其 `invoke_*`；出站方法解析前驱节点。
//!   每次解析都只短暂借用链路，回调执行期间不持有任何借用，因此 Handler 可以在回调中
//!   增删节点或发起新事件；
//! - **契约（What）**：上下文不修改链路指针，链路变更只能经由 [`ChannelPipeline`] 完成。

use alloc::sync::Arc;
use core::fmt;

use tracing::debug;

use crate::buffer::PipelineMessage;
use crate::channel::{Channel, EventLoopId};
use crate::error::{ChannelError, Result};
use crate::event::UserEvent;
use crate::future::{ChannelFuture, ChannelPromise};

use super::chain::ContextId;
use super::handler::ChannelHandler;
use super::instrument::{HandlerEvent, handler_span};
use super::pipeline::ChannelPipeline;

/// 单个链路节点的上下文。
#[derive(Clone)]
pub struct HandlerContext<'a> {
    pipeline: &'a ChannelPipeline,
    id: ContextId,
    name: Arc<str>,
    handler: Arc<dyn ChannelHandler>,
}

impl<'a> HandlerContext<'a> {
    pub(crate) fn new(
        pipeline: &'a ChannelPipeline,
        id: ContextId,
        name: Arc<str>,
        handler: Arc<dyn ChannelHandler>,
    ) -> Self {
        Self {
            pipeline,
            id,
            name,
            handler,
        }
    }

    /// 节点名称。
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 节点持有的 Handler。
    pub fn handler(&self) -> &Arc<dyn ChannelHandler> {
        &self.handler
    }

    /// 所属 Pipeline。
    pub fn pipeline(&self) -> &'a ChannelPipeline {
        self.pipeline
    }

    /// 所属通道。
    pub fn channel(&self) -> &'a Arc<dyn Channel> {
        self.pipeline.channel()
    }

    /// 通道所属事件循环。
    pub fn event_loop(&self) -> EventLoopId {
        self.pipeline.event_loop()
    }

    /// 节点句柄。
    pub fn id(&self) -> ContextId {
        self.id
    }

    fn next(&self) -> Option<HandlerContext<'a>> {
        let next = self.pipeline.next_context(self.id);
        if next.is_none() {
            debug!(
                pipeline.handler = %self.name,
                "inbound event dropped: no successor context"
            );
        }
        next
    }

    fn prev(&self) -> Option<HandlerContext<'a>> {
        let prev = self.pipeline.prev_context(self.id);
        if prev.is_none() {
            debug!(
                pipeline.handler = %self.name,
                "outbound operation dropped: no predecessor context"
            );
        }
        prev
    }

    fn missing(&self) -> ChannelError {
        ChannelError::HandlerNotFound {
            name: self.name.to_string(),
        }
    }

    // ---- 入站转发 ----

    /// 将通道注册通知交给后继节点。
    pub fn fire_channel_registered(&self) {
        if let Some(next) = self.next() {
            next.invoke_channel_registered();
        }
    }

    /// 将通道注销通知交给后继节点。
    pub fn fire_channel_unregistered(&self) {
        if let Some(next) = self.next() {
            next.invoke_channel_unregistered();
        }
    }

    /// 将通道激活通知交给后继节点。
    pub fn fire_channel_active(&self) {
        if let Some(next) = self.next() {
            next.invoke_channel_active();
        }
    }

    /// 将通道失活通知交给后继节点。
    pub fn fire_channel_inactive(&self) {
        if let Some(next) = self.next() {
            next.invoke_channel_inactive();
        }
    }

    /// 将消息交给后继节点。
    pub fn fire_channel_read(&self, msg: PipelineMessage) {
        if let Some(next) = self.next() {
            next.invoke_channel_read(msg);
        }
    }

    /// 将“一批读取结束”交给后继节点。
    pub fn fire_channel_read_complete(&self) {
        if let Some(next) = self.next() {
            next.invoke_channel_read_complete();
        }
    }

    /// 将可写性变化交给后继节点。
    pub fn fire_channel_writability_changed(&self, writable: bool) {
        if let Some(next) = self.next() {
            next.invoke_channel_writability_changed(writable);
        }
    }

    /// 将用户事件交给后继节点。
    pub fn fire_user_event_triggered(&self, event: UserEvent) {
        if let Some(next) = self.next() {
            next.invoke_user_event_triggered(event);
        }
    }

    /// 将错误交给后继节点。
    pub fn fire_error_caught(&self, error: ChannelError) {
        if let Some(next) = self.next() {
            next.invoke_error_caught(error);
        }
    }

    // ---- 出站转发 ----

    /// 将写操作交给前驱节点，返回该写操作的完成句柄。
    pub fn write(&self, msg: PipelineMessage, promise: ChannelPromise) -> ChannelFuture {
        let future = promise.future();
        match self.prev() {
            Some(prev) => prev.invoke_write(msg, promise),
            None => promise.fail(self.missing()),
        }
        future
    }

    /// 写出并立即冲刷。
    pub fn write_and_flush(&self, msg: PipelineMessage, promise: ChannelPromise) -> ChannelFuture {
        let future = promise.future();
        match self.prev() {
            Some(prev) => prev.invoke_write_and_flush(msg, promise),
            None => promise.fail(self.missing()),
        }
        future
    }

    /// 将冲刷请求交给前驱节点。
    pub fn flush(&self) {
        if let Some(prev) = self.prev() {
            prev.invoke_flush();
        }
    }

    /// 将关闭请求交给前驱节点。
    pub fn close(&self, promise: ChannelPromise) -> ChannelFuture {
        let future = promise.future();
        match self.prev() {
            Some(prev) => prev.invoke_close(promise),
            None => promise.fail(self.missing()),
        }
        future
    }

    /// 将读取请求交给前驱节点。
    pub fn read(&self) {
        if let Some(prev) = self.prev() {
            prev.invoke_read();
        }
    }

    // ---- 对本节点 Handler 的调用 ----

    /// 回调失败时把错误交给后继节点。
    fn deliver(&self, outcome: Result<()>) {
        if let Err(error) = outcome {
            self.fire_error_caught(error);
        }
    }

    pub(crate) fn invoke_handler_added(&self) -> Result<()> {
        let _dispatch = self.pipeline.enter_dispatch();
        let _span = handler_span(&self.name, HandlerEvent::HandlerAdded).entered();
        self.handler.handler_added(self)
    }

    pub(crate) fn invoke_handler_removed(&self) -> Result<()> {
        let _dispatch = self.pipeline.enter_dispatch();
        let _span = handler_span(&self.name, HandlerEvent::HandlerRemoved).entered();
        self.handler.handler_removed(self)
    }

    pub(crate) fn invoke_channel_registered(&self) {
        let _dispatch = self.pipeline.enter_dispatch();
        let _span = handler_span(&self.name, HandlerEvent::ChannelRegistered).entered();
        self.deliver(self.handler.channel_registered(self));
    }

    pub(crate) fn invoke_channel_unregistered(&self) {
        let _dispatch = self.pipeline.enter_dispatch();
        let _span = handler_span(&self.name, HandlerEvent::ChannelUnregistered).entered();
        self.deliver(self.handler.channel_unregistered(self));
    }

    pub(crate) fn invoke_channel_active(&self) {
        let _dispatch = self.pipeline.enter_dispatch();
        let _span = handler_span(&self.name, HandlerEvent::ChannelActive).entered();
        self.deliver(self.handler.channel_active(self));
    }

    pub(crate) fn invoke_channel_inactive(&self) {
        let _dispatch = self.pipeline.enter_dispatch();
        let _span = handler_span(&self.name, HandlerEvent::ChannelInactive).entered();
        self.deliver(self.handler.channel_inactive(self));
    }

    pub(crate) fn invoke_channel_read(&self, msg: PipelineMessage) {
        let _dispatch = self.pipeline.enter_dispatch();
        let _span = handler_span(&self.name, HandlerEvent::ChannelRead).entered();
        self.deliver(self.handler.channel_read(self, msg));
    }

    pub(crate) fn invoke_channel_read_complete(&self) {
        let _dispatch = self.pipeline.enter_dispatch();
        let _span = handler_span(&self.name, HandlerEvent::ChannelReadComplete).entered();
        self.deliver(self.handler.channel_read_complete(self));
    }

    pub(crate) fn invoke_channel_writability_changed(&self, writable: bool) {
        let _dispatch = self.pipeline.enter_dispatch();
        let _span = handler_span(&self.name, HandlerEvent::WritabilityChanged).entered();
        self.deliver(self.handler.channel_writability_changed(self, writable));
    }

    pub(crate) fn invoke_user_event_triggered(&self, event: UserEvent) {
        let _dispatch = self.pipeline.enter_dispatch();
        let _span = handler_span(&self.name, HandlerEvent::UserEventTriggered).entered();
        self.deliver(self.handler.user_event_triggered(self, event));
    }

    pub(crate) fn invoke_error_caught(&self, error: ChannelError) {
        let _dispatch = self.pipeline.enter_dispatch();
        let _span = handler_span(&self.name, HandlerEvent::ErrorCaught).entered();
        self.deliver(self.handler.error_caught(self, error));
    }

    pub(crate) fn invoke_write(&self, msg: PipelineMessage, promise: ChannelPromise) {
        let _dispatch = self.pipeline.enter_dispatch();
        let _span = handler_span(&self.name, HandlerEvent::Write).entered();
        self.handler.write(self, msg, promise);
    }

    pub(crate) fn invoke_write_and_flush(&self, msg: PipelineMessage, promise: ChannelPromise) {
        self.invoke_write(msg, promise);
        self.invoke_flush();
    }

    pub(crate) fn invoke_flush(&self) {
        let _dispatch = self.pipeline.enter_dispatch();
        let _span = handler_span(&self.name, HandlerEvent::Flush).entered();
        self.deliver(self.handler.flush(self));
    }

    pub(crate) fn invoke_close(&self, promise: ChannelPromise) {
        let _dispatch = self.pipeline.enter_dispatch();
        let _span = handler_span(&self.name, HandlerEvent::Close).entered();
        self.handler.close(self, promise);
    }

    pub(crate) fn invoke_read(&self) {
        let _dispatch = self.pipeline.enter_dispatch();
        let _span = handler_span(&self.name, HandlerEvent::Read).entered();
        self.deliver(self.handler.read(self));
    }
}

impl fmt::Debug for HandlerContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerContext")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("handler", &self.handler.describe())
            .finish()
    }
}
