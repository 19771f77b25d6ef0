//! Pipeline 观测辅助：Handler 调度 Span 与链路变更日志。
//!
//! # 教案式说明
//! - **意图（Why）**：调度路径与链路变更是排查“事件去哪了”最直接的线索，需要统一字段名，
//!   日志后端才能按 `pipeline.handler`、`pipeline.event` 聚合；
//! - **逻辑（How）**：每次回调前由 [`handler_span`] 打开 `TRACE` 级 Span，变更提交后由
//!   [`record_mutation`] 输出 `DEBUG` 日志；未安装订阅者时两者几乎零成本；
//! - **契约（What）**：字段均为低基数标签，禁止注入消息内容或请求级标识。

use tracing::{Span, debug, trace_span};

/// 被调度的 Handler 回调种类。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum HandlerEvent {
    HandlerAdded,
    HandlerRemoved,
    ChannelRegistered,
    ChannelUnregistered,
    ChannelActive,
    ChannelInactive,
    ChannelRead,
    ChannelReadComplete,
    WritabilityChanged,
    UserEventTriggered,
    ErrorCaught,
    Write,
    Flush,
    Close,
    Read,
}

impl HandlerEvent {
    /// 映射为稳定的观测标签。
    pub(crate) fn as_label(self) -> &'static str {
        match self {
            HandlerEvent::HandlerAdded => "handler_added",
            HandlerEvent::HandlerRemoved => "handler_removed",
            HandlerEvent::ChannelRegistered => "channel_registered",
            HandlerEvent::ChannelUnregistered => "channel_unregistered",
            HandlerEvent::ChannelActive => "channel_active",
            HandlerEvent::ChannelInactive => "channel_inactive",
            HandlerEvent::ChannelRead => "channel_read",
            HandlerEvent::ChannelReadComplete => "channel_read_complete",
            HandlerEvent::WritabilityChanged => "channel_writability_changed",
            HandlerEvent::UserEventTriggered => "user_event_triggered",
            HandlerEvent::ErrorCaught => "error_caught",
            HandlerEvent::Write => "write",
            HandlerEvent::Flush => "flush",
            HandlerEvent::Close => "close",
            HandlerEvent::Read => "read",
        }
    }
}

/// 链路变更类型。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum MutationKind {
    Add,
    Remove,
    Teardown,
}

impl MutationKind {
    fn as_label(self) -> &'static str {
        match self {
            MutationKind::Add => "add",
            MutationKind::Remove => "remove",
            MutationKind::Teardown => "teardown",
        }
    }
}

/// 为一次 Handler 回调创建 Span。
pub(crate) fn handler_span(handler: &str, event: HandlerEvent) -> Span {
    trace_span!(
        "pipeline.handler",
        pipeline.handler = handler,
        pipeline.event = event.as_label()
    )
}

/// 在链路变更提交后记录日志。调用方需确保变更已经生效，`epoch` 单调递增。
pub(crate) fn record_mutation(kind: MutationKind, handler: &str, epoch: u64) {
    debug!(
        pipeline.op = kind.as_label(),
        pipeline.handler = handler,
        pipeline.epoch = epoch,
        "pipeline.mutation applied"
    );
}
