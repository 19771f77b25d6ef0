//! Pipeline 行为配置。
//!
//! # 教案式说明
//! - **意图（Why）**：重名策略与尾部未处理事件的处置方式都存在兼容性与健壮性的取舍，
//!   这里把选择权交给部署方而非写死在代码里；
//! - **逻辑（How）**：[`PipelineConfig`] 实现 `serde` 反序列化，可嵌入上层 TOML 配置段，
//!   缺省字段回落到 [`Default`]；
//! - **契约（What）**：配置在 Pipeline 构造时固定，运行期不可变更。通道级的 `auto_read`
//!   仍由 [`Channel`](crate::channel::Channel) 提供，不在此处存储。

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// 重名 Handler 的处理策略。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateNamePolicy {
    /// 允许重名；按名称查找时返回正向扫描遇到的第一个。
    #[default]
    Allow,
    /// 拒绝重名，`add*` 返回 [`ChannelError::DuplicateName`](crate::ChannelError::DuplicateName)。
    Reject,
}

/// `channel_read` / `error_caught` 抵达尾部哨兵时的处置策略。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnclaimedEventPolicy {
    /// 静默丢弃，仅累加计数。
    Discard,
    /// 丢弃并输出 `WARN` 日志，提示链路缺少相应 Handler。
    #[default]
    Warn,
}

/// Pipeline 配置。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct PipelineConfig {
    /// 重名策略。
    pub duplicate_names: DuplicateNamePolicy,
    /// 尾部未处理事件策略。
    pub unclaimed_events: UnclaimedEventPolicy,
}

impl PipelineConfig {
    /// 从 TOML 文本解析配置。
    ///
    /// ```
    /// use channel_pipeline::config::{DuplicateNamePolicy, PipelineConfig};
    ///
    /// let config = PipelineConfig::from_toml_str("duplicate_names = \"reject\"").unwrap();
    /// assert_eq!(config.duplicate_names, DuplicateNamePolicy::Reject);
    /// ```
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// 替换重名策略。
    pub fn with_duplicate_names(mut self, policy: DuplicateNamePolicy) -> Self {
        self.duplicate_names = policy;
        self
    }

    /// 替换尾部未处理事件策略。
    pub fn with_unclaimed_events(mut self, policy: UnclaimedEventPolicy) -> Self {
        self.unclaimed_events = policy;
        self
    }
}
