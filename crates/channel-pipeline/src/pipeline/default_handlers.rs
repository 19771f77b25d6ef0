//! 头尾哨兵 Handler。
//!
//! # 设计背景（Why）
//! - 头部哨兵是链路唯一触达真实 I/O 的位置：出站操作抵达这里后交给 [`Channel`](crate::Channel) 的原始原语；
//! - 尾部哨兵吸收所有走到链路末端的入站事件，保证事件不会越界，也不会因缺少处理者而 panic。
//!
//! # 契约说明（What）
//! - `HeadHandler`：`write`→`write0`、`flush`→`flush0`、`close`→`close0`、`read`→`start_reading0`；
//!   `channel_active`/`channel_read_complete` 转发后依据 `auto_read` 发起下一次读取；
//!   `channel_unregistered` 转发后触发批量拆除；
//! - `TailHandler`：`channel_read`/`error_caught` 视为未处理事件，累加计数并按
//!   [`UnclaimedEventPolicy`] 决定是否告警；其余入站事件静默丢弃。

use tracing::warn;

use crate::buffer::PipelineMessage;
use crate::config::UnclaimedEventPolicy;
use crate::error::{ChannelError, Result};
use crate::event::UserEvent;
use crate::future::ChannelPromise;

use super::context::HandlerContext;
use super::handler::ChannelHandler;

/// 链路头部哨兵。
#[derive(Debug, Default)]
pub(crate) struct HeadHandler;

impl ChannelHandler for HeadHandler {
    fn describe(&self) -> &'static str {
        "head"
    }

    fn channel_unregistered(&self, ctx: &HandlerContext<'_>) -> Result<()> {
        ctx.fire_channel_unregistered();
        ctx.pipeline().remove_handlers();
        Ok(())
    }

    fn channel_active(&self, ctx: &HandlerContext<'_>) -> Result<()> {
        ctx.fire_channel_active();
        read_if_auto(ctx);
        Ok(())
    }

    fn channel_read_complete(&self, ctx: &HandlerContext<'_>) -> Result<()> {
        ctx.fire_channel_read_complete();
        read_if_auto(ctx);
        Ok(())
    }

    fn write(&self, ctx: &HandlerContext<'_>, msg: PipelineMessage, promise: ChannelPromise) {
        ctx.channel().write0(msg, promise);
    }

    fn flush(&self, ctx: &HandlerContext<'_>) -> Result<()> {
        ctx.channel().flush0();
        Ok(())
    }

    fn close(&self, ctx: &HandlerContext<'_>, promise: ChannelPromise) {
        ctx.channel().close0(promise);
    }

    fn read(&self, ctx: &HandlerContext<'_>) -> Result<()> {
        ctx.channel().start_reading0();
        Ok(())
    }
}

fn read_if_auto(ctx: &HandlerContext<'_>) {
    if ctx.channel().auto_read() {
        ctx.pipeline().read();
    }
}

/// 链路尾部哨兵。
#[derive(Debug, Default)]
pub(crate) struct TailHandler;

impl ChannelHandler for TailHandler {
    fn describe(&self) -> &'static str {
        "tail"
    }

    fn channel_registered(&self, _ctx: &HandlerContext<'_>) -> Result<()> {
        Ok(())
    }

    fn channel_unregistered(&self, _ctx: &HandlerContext<'_>) -> Result<()> {
        Ok(())
    }

    fn channel_active(&self, _ctx: &HandlerContext<'_>) -> Result<()> {
        Ok(())
    }

    fn channel_inactive(&self, _ctx: &HandlerContext<'_>) -> Result<()> {
        Ok(())
    }

    fn channel_read(&self, ctx: &HandlerContext<'_>, msg: PipelineMessage) -> Result<()> {
        let pipeline = ctx.pipeline();
        pipeline.note_unclaimed_read();
        if pipeline.config().unclaimed_events == UnclaimedEventPolicy::Warn {
            warn!(
                pipeline.event = "channel_read",
                message.kind = msg.kind(),
                "inbound message reached the tail of the pipeline unconsumed and was discarded"
            );
        }
        Ok(())
    }

    fn channel_read_complete(&self, _ctx: &HandlerContext<'_>) -> Result<()> {
        Ok(())
    }

    fn channel_writability_changed(&self, _ctx: &HandlerContext<'_>, _writable: bool) -> Result<()> {
        Ok(())
    }

    fn user_event_triggered(&self, _ctx: &HandlerContext<'_>, _event: UserEvent) -> Result<()> {
        Ok(())
    }

    fn error_caught(&self, ctx: &HandlerContext<'_>, error: ChannelError) -> Result<()> {
        let pipeline = ctx.pipeline();
        pipeline.note_unclaimed_error();
        if pipeline.config().unclaimed_events == UnclaimedEventPolicy::Warn {
            warn!(
                pipeline.event = "error_caught",
                error.code = error.code(),
                "error reached the tail of the pipeline unhandled: {error}"
            );
        }
        Ok(())
    }
}
