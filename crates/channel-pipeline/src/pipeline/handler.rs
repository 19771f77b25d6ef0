use core::any::type_name;

use crate::buffer::PipelineMessage;
use crate::error::{ChannelError, Result};
use crate::event::UserEvent;
use crate::future::ChannelPromise;

use super::context::HandlerContext;

/// 链路节点上的事件处理合约，同时覆盖入站事件、出站操作与生命周期通知。
///
/// # 设计背景（Why）
/// - 入站与出站共用一套能力集合，Handler 只需覆写自己关心的回调，其余回调保持透传；
/// - 默认实现即“转发到下一个节点”，不存在其他隐式传播：覆写了某个回调却不调用
///   `ctx.fire_*` / `ctx.write` 等方法，事件就在此处终止。
///
/// # 契约说明（What）
/// - 所有回调都在通道所属事件循环上调用，不得阻塞；
/// - 入站、生命周期、`flush`、`read` 返回 `Err` 时，错误会作为 `error_caught` 交给**下一个**节点；
/// - `write`/`close` 的失败只能通过 `promise.fail(..)` 报告，因此返回 `()`；
/// - `handler_added` 返回 `Err` 时，`add*` 会回滚链路并把该错误原样返回给调用方。
///
/// # 风险提示（Trade-offs）
/// - Handler 以 `Arc` 共享，可能被多个 Pipeline 同时持有，内部状态需自行保证线程安全；
/// - 请勿在 Handler 内部保存 [`HandlerContext`]，它只在单次回调期间有效。
pub trait ChannelHandler: Send + Sync + 'static {
    /// 诊断用的类型描述，出现在 [`snapshot`](crate::ChannelPipeline::snapshot) 中。
    fn describe(&self) -> &'static str {
        type_name::<Self>()
    }

    /// 节点链接进 Pipeline 后调用一次。
    fn handler_added(&self, _ctx: &HandlerContext<'_>) -> Result<()> {
        Ok(())
    }

    /// 节点在批量拆除中被摘除后调用一次。
    fn handler_removed(&self, _ctx: &HandlerContext<'_>) -> Result<()> {
        Ok(())
    }

    /// 通道已注册到事件循环。
    fn channel_registered(&self, ctx: &HandlerContext<'_>) -> Result<()> {
        ctx.fire_channel_registered();
        Ok(())
    }

    /// 通道已从事件循环注销；头部哨兵在该事件传遍链路后触发批量拆除。
    fn channel_unregistered(&self, ctx: &HandlerContext<'_>) -> Result<()> {
        ctx.fire_channel_unregistered();
        Ok(())
    }

    /// 通道进入活跃状态。
    fn channel_active(&self, ctx: &HandlerContext<'_>) -> Result<()> {
        ctx.fire_channel_active();
        Ok(())
    }

    /// 通道离开活跃状态。
    fn channel_inactive(&self, ctx: &HandlerContext<'_>) -> Result<()> {
        ctx.fire_channel_inactive();
        Ok(())
    }

    /// 处理读到的消息。
    fn channel_read(&self, ctx: &HandlerContext<'_>, msg: PipelineMessage) -> Result<()> {
        ctx.fire_channel_read(msg);
        Ok(())
    }

    /// 一批读取结束。
    fn channel_read_complete(&self, ctx: &HandlerContext<'_>) -> Result<()> {
        ctx.fire_channel_read_complete();
        Ok(())
    }

    /// 通道可写性变化。
    fn channel_writability_changed(&self, ctx: &HandlerContext<'_>, writable: bool) -> Result<()> {
        ctx.fire_channel_writability_changed(writable);
        Ok(())
    }

    /// 处理用户事件。
    fn user_event_triggered(&self, ctx: &HandlerContext<'_>, event: UserEvent) -> Result<()> {
        ctx.fire_user_event_triggered(event);
        Ok(())
    }

    /// 处理上游节点转交的错误。
    fn error_caught(&self, ctx: &HandlerContext<'_>, error: ChannelError) -> Result<()> {
        ctx.fire_error_caught(error);
        Ok(())
    }

    /// 写出消息；结果只通过 `promise` 报告。
    fn write(&self, ctx: &HandlerContext<'_>, msg: PipelineMessage, promise: ChannelPromise) {
        ctx.write(msg, promise);
    }

    /// 冲刷已写出的数据。
    fn flush(&self, ctx: &HandlerContext<'_>) -> Result<()> {
        ctx.flush();
        Ok(())
    }

    /// 关闭通道；结果只通过 `promise` 报告。
    fn close(&self, ctx: &HandlerContext<'_>, promise: ChannelPromise) {
        ctx.close(promise);
    }

    /// 请求下一次读取。
    fn read(&self, ctx: &HandlerContext<'_>) -> Result<()> {
        ctx.read();
        Ok(())
    }
}
