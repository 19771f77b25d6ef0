//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 汇总 Pipeline 在装配、拆除与出站完成路径上可能出现的全部失败语义；
//! - 每个变体都携带稳定错误码（`pipeline.*`），日志与告警可直接按错误码聚合。
//!
//! ## 传播约定（What）
//! - `handler_added` 失败：由 `add*` 同步返回，链路已回滚；
//! - `handler_removed` 失败：仅在批量拆除时出现，转化为下一节点的 `error_caught`；
//! - 出站失败：只通过 [`ChannelFuture`](crate::future::ChannelFuture) 的完成结果暴露；
//! - `remove*`/`contains*` 只返回布尔值，从不产生错误。

use alloc::borrow::Cow;
use std::io;

use thiserror::Error;

/// Pipeline 统一结果别名。
pub type Result<T, E = ChannelError> = core::result::Result<T, E>;

/// Pipeline 错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：Handler、通道与 Promise 三方都需要同一种错误类型才能在链路中流动，
///   因此所有变体均实现 `Clone + Send + Sync + 'static`，可以在 `error_caught` 中广播、
///   也可以被多个 [`ChannelFuture`](crate::future::ChannelFuture) 观察者共享。
/// - **契约 (What)**：`code()` 返回稳定错误码；`Display` 面向排障人员。
/// - **设计权衡 (Trade-offs)**：上下文字段使用 `String`/`Cow`，以少量堆分配换取可读性。
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ChannelError {
    /// Handler 在 `handler_added` 中拒绝装配，链路已恢复原状。
    #[error("handler `{name}` rejected installation: {reason}")]
    HandlerAdded { name: String, reason: String },

    /// Handler 在批量拆除的 `handler_removed` 中报告失败。
    #[error("handler `{name}` failed during removal: {reason}")]
    HandlerRemoved { name: String, reason: String },

    /// `DuplicateNamePolicy::Reject` 下出现重名。
    #[error("handler name `{name}` is already registered in this pipeline")]
    DuplicateName { name: String },

    /// 定位锚点 Handler 失败。
    #[error("handler `{name}` is not registered in this pipeline")]
    HandlerNotFound { name: String },

    /// Handler 回调返回的通用失败。
    #[error("[{code}] {message}")]
    Handler {
        code: &'static str,
        message: Cow<'static, str>,
    },

    /// 通道已关闭，无法继续执行出站操作。
    #[error("channel is closed")]
    ChannelClosed,

    /// Promise 在未完成的情况下被丢弃。
    #[error("promise dropped before completion")]
    PromiseDropped,

    /// 底层 IO 失败。
    #[error("io failure ({kind:?}): {message}")]
    Io { kind: io::ErrorKind, message: String },

    /// 配置解析失败。
    #[error("invalid pipeline configuration: {message}")]
    Config { message: String },
}

impl ChannelError {
    /// 构造通用 Handler 失败。
    ///
    /// `code` 需遵循 `<领域>.<语义>` 的命名约定，例如 `codec.frame_too_long`。
    pub fn handler(code: &'static str, message: impl Into<Cow<'static, str>>) -> Self {
        ChannelError::Handler {
            code,
            message: message.into(),
        }
    }

    /// 返回稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            ChannelError::HandlerAdded { .. } => "pipeline.handler_added",
            ChannelError::HandlerRemoved { .. } => "pipeline.handler_removed",
            ChannelError::DuplicateName { .. } => "pipeline.duplicate_name",
            ChannelError::HandlerNotFound { .. } => "pipeline.handler_not_found",
            ChannelError::Handler { code, .. } => code,
            ChannelError::ChannelClosed => "pipeline.channel_closed",
            ChannelError::PromiseDropped => "pipeline.promise_dropped",
            ChannelError::Io { .. } => "pipeline.io",
            ChannelError::Config { .. } => "pipeline.config",
        }
    }
}

impl From<io::Error> for ChannelError {
    fn from(value: io::Error) -> Self {
        ChannelError::Io {
            kind: value.kind(),
            message: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for ChannelError {
    fn from(value: toml::de::Error) -> Self {
        ChannelError::Config {
            message: value.to_string(),
        }
    }
}
