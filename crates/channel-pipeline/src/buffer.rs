//! 链路消息载体。
//!
//! 读事件与写操作共用 [`PipelineMessage`]：传输层交付的原始字节以 [`Bytes`] 形式流动，
//! 解码后的业务对象以类型擦除的 `User` 变体流动，由具体 Handler 负责向下转型。

use alloc::boxed::Box;
use core::any::{Any, type_name};
use core::fmt;

pub use bytes::Bytes;

/// Pipeline 中流动的消息。
///
/// # 契约说明（What）
/// - `Buffer`：尚未解码或已经编码完成的字节；
/// - `User`：任意 `Send + 'static` 业务对象，`type_name` 仅用于诊断输出；
/// - 消息按值移动，Handler 转发时转移所有权，链路中同一时刻只有一个持有者。
pub enum PipelineMessage {
    /// 原始字节。
    Buffer(Bytes),
    /// 业务对象。
    User(UserMessage),
}

/// 类型擦除后的业务消息。
pub struct UserMessage {
    type_name: &'static str,
    payload: Box<dyn Any + Send>,
}

impl UserMessage {
    /// 记录的类型名。
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl PipelineMessage {
    /// 封装业务对象。
    pub fn from_user<T>(value: T) -> Self
    where
        T: Any + Send,
    {
        PipelineMessage::User(UserMessage {
            type_name: type_name::<T>(),
            payload: Box::new(value),
        })
    }

    /// 封装字节。
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        PipelineMessage::Buffer(bytes.into())
    }

    /// 若为字节消息则返回引用。
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            PipelineMessage::Buffer(bytes) => Some(bytes),
            PipelineMessage::User(_) => None,
        }
    }

    /// 以引用方式尝试向下转型业务对象。
    pub fn downcast_user<T: Any>(&self) -> Option<&T> {
        match self {
            PipelineMessage::User(user) => user.payload.downcast_ref::<T>(),
            PipelineMessage::Buffer(_) => None,
        }
    }

    /// 以所有权方式尝试取出业务对象；类型不匹配时原样返回消息，便于继续转发。
    pub fn try_into_user<T: Any>(self) -> Result<T, Self> {
        match self {
            PipelineMessage::User(UserMessage {
                type_name: recorded,
                payload,
            }) => match payload.downcast::<T>() {
                Ok(value) => Ok(*value),
                Err(payload) => Err(PipelineMessage::User(UserMessage {
                    type_name: recorded,
                    payload,
                })),
            },
            other => Err(other),
        }
    }

    /// 诊断用的消息种类描述。
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineMessage::Buffer(_) => "buffer",
            PipelineMessage::User(user) => user.type_name,
        }
    }
}

impl From<Bytes> for PipelineMessage {
    fn from(value: Bytes) -> Self {
        PipelineMessage::Buffer(value)
    }
}

impl fmt::Debug for PipelineMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineMessage::Buffer(bytes) => f
                .debug_struct("PipelineMessage::Buffer")
                .field("len", &bytes.len())
                .finish(),
            PipelineMessage::User(user) => f
                .debug_struct("PipelineMessage::User")
                .field("type", &user.type_name)
                .finish(),
        }
    }
}
