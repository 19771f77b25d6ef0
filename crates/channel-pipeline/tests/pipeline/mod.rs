//! Pipeline 集成测试入口。
//!
//! - `mutation`：装配顺序、命名、回滚与查找；
//! - `dispatch`：入站/出站派发、错误转交、回调内重入；
//! - `teardown`：通道注销后的批量拆除；
//! - `properties`：随机操作序列下的链路性质。

mod mutation;
mod properties;
mod teardown;

use std::sync::Arc;

use channel_pipeline::ChannelPipeline;
use channel_pipeline::test_stubs::{EventLog, RecordingChannel, RecordingHandler};

/// 构造默认配置的 Pipeline，并返回可供断言的通道。
pub(crate) fn fixture() -> (Arc<RecordingChannel>, ChannelPipeline) {
    let channel = Arc::new(RecordingChannel::new());
    let pipeline = ChannelPipeline::new(channel.clone());
    (channel, pipeline)
}

pub(crate) fn recording(label: &str, log: &EventLog) -> Arc<RecordingHandler> {
    Arc::new(RecordingHandler::new(label, log))
}
