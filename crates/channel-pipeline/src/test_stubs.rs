//! 记录型测试桩。
//!
//! # 设计定位（Why）
//! - 链路行为的断言几乎都落在“哪个 Handler 以什么顺序看到了什么事件”与“头部哨兵调用了哪些原始原语”上，
//!   集中提供记录实现，测试只需比对日志；
//! - 所有类型满足 `Send + Sync`，可直接作为 `Arc<dyn Channel>` / `Arc<dyn ChannelHandler>` 使用。
//!
//! # 契约说明（What）
//! - [`RecordingChannel`] 成功完成 `write0`/`close0` 的 Promise；关闭后再写入则以
//!   [`ChannelError::ChannelClosed`] 失败；配置 [`RecordingChannel::failing_writes`] 后，
//!   写入以 [`ChannelError::Io`] 失败，模拟套接字层错误；
//! - [`RecordingHandler`] 把每次回调以 `"<标签>.<事件>"` 形式写入 [`EventLog`]，随后按默认行为转发。

use alloc::{format, string::String, sync::Arc, vec::Vec};
use std::io;

use parking_lot::Mutex;

use crate::buffer::{Bytes, PipelineMessage};
use crate::channel::{Channel, EventLoopId};
use crate::error::{ChannelError, Result};
use crate::event::UserEvent;
use crate::future::ChannelPromise;
use crate::pipeline::{ChannelHandler, HandlerContext};

/// 头部哨兵触达的原始原语。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IoCall {
    /// `write0`
    Write,
    /// `flush0`
    Flush,
    /// `close0`
    Close,
    /// `start_reading0`
    StartReading,
}

#[derive(Default)]
struct ChannelRecord {
    calls: Vec<IoCall>,
    written: Vec<PipelineMessage>,
    closed: bool,
}

/// 记录全部原始 I/O 调用的通道。
pub struct RecordingChannel {
    event_loop: EventLoopId,
    auto_read: bool,
    write_failure: Option<io::ErrorKind>,
    record: Mutex<ChannelRecord>,
}

impl RecordingChannel {
    /// 默认事件循环 `0`，关闭 `auto_read`。
    pub fn new() -> Self {
        Self {
            event_loop: EventLoopId::new(0),
            auto_read: false,
            write_failure: None,
            record: Mutex::new(ChannelRecord::default()),
        }
    }

    /// 设置 `auto_read`。
    pub fn with_auto_read(mut self, auto_read: bool) -> Self {
        self.auto_read = auto_read;
        self
    }

    /// 设置所属事件循环。
    pub fn with_event_loop(mut self, event_loop: EventLoopId) -> Self {
        self.event_loop = event_loop;
        self
    }

    /// 之后的每次 `write0` 都以给定类型的 IO 错误失败，消息不会被记录为已写入。
    pub fn failing_writes(mut self, kind: io::ErrorKind) -> Self {
        self.write_failure = Some(kind);
        self
    }

    /// 按发生顺序返回原语调用。
    pub fn calls(&self) -> Vec<IoCall> {
        self.record.lock().calls.clone()
    }

    fn count(&self, call: IoCall) -> usize {
        self.record
            .lock()
            .calls
            .iter()
            .filter(|seen| **seen == call)
            .count()
    }

    /// `write0` 调用次数。
    pub fn write_count(&self) -> usize {
        self.count(IoCall::Write)
    }

    /// `flush0` 调用次数。
    pub fn flush_count(&self) -> usize {
        self.count(IoCall::Flush)
    }

    /// `close0` 调用次数。
    pub fn close_count(&self) -> usize {
        self.count(IoCall::Close)
    }

    /// `start_reading0` 调用次数。
    pub fn read_requests(&self) -> usize {
        self.count(IoCall::StartReading)
    }

    /// 取出已写入的消息。
    pub fn take_written(&self) -> Vec<PipelineMessage> {
        core::mem::take(&mut self.record.lock().written)
    }

    /// 已写入消息中的字节载荷，非字节消息被跳过。
    pub fn written_bytes(&self) -> Vec<Bytes> {
        self.record
            .lock()
            .written
            .iter()
            .filter_map(|msg| msg.as_bytes().cloned())
            .collect()
    }

    /// 是否已执行过 `close0`。
    pub fn is_closed(&self) -> bool {
        self.record.lock().closed
    }
}

impl Default for RecordingChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl Channel for RecordingChannel {
    fn event_loop(&self) -> EventLoopId {
        self.event_loop
    }

    fn auto_read(&self) -> bool {
        self.auto_read
    }

    fn write0(&self, msg: PipelineMessage, promise: ChannelPromise) {
        let closed = {
            let mut record = self.record.lock();
            record.calls.push(IoCall::Write);
            if !record.closed && self.write_failure.is_none() {
                record.written.push(msg);
            }
            record.closed
        };
        match (closed, self.write_failure) {
            (true, _) => promise.fail(ChannelError::ChannelClosed),
            (false, Some(kind)) => {
                promise.fail(io::Error::new(kind, "injected write failure").into());
            }
            (false, None) => promise.succeed(),
        }
    }

    fn flush0(&self) {
        self.record.lock().calls.push(IoCall::Flush);
    }

    fn close0(&self, promise: ChannelPromise) {
        {
            let mut record = self.record.lock();
            record.calls.push(IoCall::Close);
            record.closed = true;
        }
        promise.succeed();
    }

    fn start_reading0(&self) {
        self.record.lock().calls.push(IoCall::StartReading);
    }
}

/// 可跨 Handler 共享的事件日志。
#[derive(Clone, Default)]
pub struct EventLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl EventLog {
    /// 空日志。
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条记录。
    pub fn record(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    /// 当前全部记录的副本。
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    /// 以给定后缀结尾的记录，例如 `".channel_read"`。
    pub fn entries_ending_with(&self, suffix: &str) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter(|entry| entry.ends_with(suffix))
            .cloned()
            .collect()
    }

    /// 清空全部记录。
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

/// 记录全部回调并保持默认转发行为的 Handler。
pub struct RecordingHandler {
    label: String,
    log: EventLog,
    fail_added: Option<ChannelError>,
    fail_removed: Option<ChannelError>,
}

impl RecordingHandler {
    /// 以 `label` 作为日志前缀，记录写入共享的 `log`。
    pub fn new(label: impl Into<String>, log: &EventLog) -> Self {
        Self {
            label: label.into(),
            log: log.clone(),
            fail_added: None,
            fail_removed: None,
        }
    }

    /// `handler_added` 返回给定错误。
    pub fn failing_handler_added(mut self, error: ChannelError) -> Self {
        self.fail_added = Some(error);
        self
    }

    /// `handler_removed` 返回给定错误。
    pub fn failing_handler_removed(mut self, error: ChannelError) -> Self {
        self.fail_removed = Some(error);
        self
    }

    fn note(&self, event: &str) {
        self.log.record(format!("{}.{event}", self.label));
    }
}

impl ChannelHandler for RecordingHandler {
    fn handler_added(&self, _ctx: &HandlerContext<'_>) -> Result<()> {
        self.note("handler_added");
        self.fail_added.clone().map_or(Ok(()), Err)
    }

    fn handler_removed(&self, _ctx: &HandlerContext<'_>) -> Result<()> {
        self.note("handler_removed");
        self.fail_removed.clone().map_or(Ok(()), Err)
    }

    fn channel_registered(&self, ctx: &HandlerContext<'_>) -> Result<()> {
        self.note("channel_registered");
        ctx.fire_channel_registered();
        Ok(())
    }

    fn channel_unregistered(&self, ctx: &HandlerContext<'_>) -> Result<()> {
        self.note("channel_unregistered");
        ctx.fire_channel_unregistered();
        Ok(())
    }

    fn channel_active(&self, ctx: &HandlerContext<'_>) -> Result<()> {
        self.note("channel_active");
        ctx.fire_channel_active();
        Ok(())
    }

    fn channel_inactive(&self, ctx: &HandlerContext<'_>) -> Result<()> {
        self.note("channel_inactive");
        ctx.fire_channel_inactive();
        Ok(())
    }

    fn channel_read(&self, ctx: &HandlerContext<'_>, msg: PipelineMessage) -> Result<()> {
        self.note("channel_read");
        ctx.fire_channel_read(msg);
        Ok(())
    }

    fn channel_read_complete(&self, ctx: &HandlerContext<'_>) -> Result<()> {
        self.note("channel_read_complete");
        ctx.fire_channel_read_complete();
        Ok(())
    }

    fn channel_writability_changed(&self, ctx: &HandlerContext<'_>, writable: bool) -> Result<()> {
        self.note("channel_writability_changed");
        ctx.fire_channel_writability_changed(writable);
        Ok(())
    }

    fn user_event_triggered(&self, ctx: &HandlerContext<'_>, event: UserEvent) -> Result<()> {
        self.note("user_event_triggered");
        ctx.fire_user_event_triggered(event);
        Ok(())
    }

    fn error_caught(&self, ctx: &HandlerContext<'_>, error: ChannelError) -> Result<()> {
        self.note(&format!("error_caught({})", error.code()));
        ctx.fire_error_caught(error);
        Ok(())
    }

    fn write(&self, ctx: &HandlerContext<'_>, msg: PipelineMessage, promise: ChannelPromise) {
        self.note("write");
        ctx.write(msg, promise);
    }

    fn flush(&self, ctx: &HandlerContext<'_>) -> Result<()> {
        self.note("flush");
        ctx.flush();
        Ok(())
    }

    fn close(&self, ctx: &HandlerContext<'_>, promise: ChannelPromise) {
        self.note("close");
        ctx.close(promise);
    }

    fn read(&self, ctx: &HandlerContext<'_>) -> Result<()> {
        self.note("read");
        ctx.read();
        Ok(())
    }
}
