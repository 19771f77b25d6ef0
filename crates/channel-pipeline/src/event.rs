//! 用户自定义事件载体，经 `fire_user_event_triggered` 沿入站方向广播。

use alloc::sync::Arc;
use core::any::{Any, type_name};
use core::fmt;

/// 用户事件。
///
/// # 教案式说明
/// - **意图（Why）**：空闲检测、握手完成等跨 Handler 的信号不属于数据流，需要独立通道；
/// - **逻辑（How）**：事件以 `Arc` 擦除类型，克隆仅增加引用计数，Handler 可原样转发；
/// - **契约（What）**：`event_kind` 记录构造时的具体类型名，向下转型失败时可用于排障。
#[derive(Clone)]
pub struct UserEvent {
    kind: &'static str,
    payload: Arc<dyn Any + Send + Sync>,
}

impl UserEvent {
    /// 封装任意业务事件。
    pub fn from_application_event<E>(event: E) -> Self
    where
        E: Any + Send + Sync,
    {
        Self {
            kind: type_name::<E>(),
            payload: Arc::new(event),
        }
    }

    /// 事件类型标签。
    pub fn event_kind(&self) -> &'static str {
        self.kind
    }

    /// 尝试以引用形式获取具体事件类型。
    pub fn downcast_application_event<E: Any>(&self) -> Option<&E> {
        self.payload.downcast_ref::<E>()
    }
}

impl fmt::Debug for UserEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserEvent")
            .field("kind", &self.kind)
            .finish()
    }
}
