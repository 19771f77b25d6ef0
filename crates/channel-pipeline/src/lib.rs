#![deny(unsafe_code)]
#![allow(clippy::result_large_err)]
#![doc = "channel-pipeline: 通道事件分发核心。"]
#![doc = ""]
#![doc = "每个通道持有一条 [`ChannelPipeline`]：入站事件自头向尾流经 [`ChannelHandler`]，"]
#![doc = "出站操作自尾向头，最终由头部哨兵交给 [`Channel`] 的原始 I/O 原语。"]
#![doc = "链路可在派发期间增删节点，通道注销时批量拆除并逐个通知 `handler_removed`。"]

extern crate alloc;

pub mod buffer;
pub mod channel;
pub mod config;
pub mod error;
pub mod event;
pub mod future;
pub mod pipeline;
/// 测试桩命名空间，提供记录型通道与 Handler，供集成测试与示例复用。
///
/// # 使用方式（How）
/// - `RecordingChannel` 记录头部哨兵触达的全部原始 I/O 原语；
/// - `RecordingHandler` 把每次回调写入共享的 [`EventLog`](test_stubs::EventLog) 后按默认行为转发。
pub mod test_stubs;

pub use buffer::{Bytes, PipelineMessage, UserMessage};
pub use channel::{Channel, EventLoopId};
pub use config::{DuplicateNamePolicy, PipelineConfig, UnclaimedEventPolicy};
pub use error::{ChannelError, Result};
pub use event::UserEvent;
pub use future::{ChannelFuture, ChannelPromise};
pub use pipeline::{
    ChannelHandler, ChannelPipeline, ContextId, HandlerContext, HandlerRegistration,
    UnclaimedEvents,
};
