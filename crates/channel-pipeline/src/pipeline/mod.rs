//! Handler 链路：存储、上下文、派发入口与头尾哨兵。
//!
//! - `chain`：以槽位数组承载的双向链表与代数句柄；
//! - `context`：回调期间的上下文视图与转发逻辑；
//! - `pipeline`：装配、拆除、派发与自省入口；
//! - `default_handlers`：头尾哨兵；
//! - `instrument`：调度 Span 与变更日志。

pub mod chain;
pub mod context;
mod default_handlers;
pub mod handler;
mod instrument;
#[allow(clippy::module_inception)]
pub mod pipeline;

pub use chain::ContextId;
pub use context::HandlerContext;
pub use handler::ChannelHandler;
pub use pipeline::{ChannelPipeline, HandlerRegistration, UnclaimedEvents};
