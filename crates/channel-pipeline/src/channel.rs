//! Pipeline 所依赖的通道协作方接口。
//!
//! # 契约维度速览
//! - **语义**：通道只向 Pipeline 暴露四个原始 I/O 原语与 `auto_read` 配置位，
//!   这些原语仅由头部哨兵调用，Handler 无法绕过链路直接触达；
//! - **并发**：实现需为 `Send + Sync`，以便由所属事件循环以外的线程构造后移交；
//!   所有调用都发生在通道所属事件循环上；
//! - **完成**：`write0`/`close0` 必须且仅能完成一次传入的 [`ChannelPromise`]。

use core::fmt;

use crate::buffer::PipelineMessage;
use crate::future::ChannelPromise;

/// 事件循环标识。Pipeline 仅透传该值，供调用方确认自己位于正确的执行上下文。
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventLoopId(u64);

impl EventLoopId {
    /// 构造标识。
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// 原始编码。
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EventLoopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event-loop-{}", self.0)
    }
}

/// 通道原始能力。
pub trait Channel: Send + Sync + 'static {
    /// 所属事件循环。
    fn event_loop(&self) -> EventLoopId;

    /// 是否在激活与每批读取完成后自动发起下一次读取。
    fn auto_read(&self) -> bool;

    /// 将消息写入发送缓冲。
    fn write0(&self, msg: PipelineMessage, promise: ChannelPromise);

    /// 冲刷发送缓冲。
    fn flush0(&self);

    /// 关闭通道。
    fn close0(&self, promise: ChannelPromise);

    /// 请求底层开始读取。
    fn start_reading0(&self);
}
