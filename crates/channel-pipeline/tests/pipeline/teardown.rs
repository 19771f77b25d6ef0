use std::sync::Arc;

use channel_pipeline::test_stubs::{EventLog, RecordingHandler};
use channel_pipeline::{ChannelError, ChannelHandler, HandlerContext, Result};

use super::{fixture, recording};

/// 在自己的 `handler_removed` 中顺带移除后继节点。
struct Evictor {
    victim: &'static str,
    log: EventLog,
}

impl ChannelHandler for Evictor {
    fn handler_removed(&self, ctx: &HandlerContext<'_>) -> Result<()> {
        self.log.record("evictor.handler_removed");
        ctx.pipeline().remove_name(self.victim);
        Ok(())
    }
}

/// 通道注销：每个节点先看到注销事件，随后按链路顺序逐个收到 `handler_removed`。
#[test]
fn unregister_tears_down_every_handler_in_order() {
    let (_channel, pipeline) = fixture();
    let log = EventLog::new();
    for name in ["h1", "h2", "h3"] {
        pipeline.add_last(Some(name), recording(name, &log)).expect("add");
    }
    log.clear();
    let epoch = pipeline.epoch();

    pipeline.fire_channel_unregistered();

    assert_eq!(
        log.entries(),
        [
            "h1.channel_unregistered",
            "h2.channel_unregistered",
            "h3.channel_unregistered",
            "h1.handler_removed",
            "h2.handler_removed",
            "h3.handler_removed"
        ]
    );
    assert!(pipeline.is_empty());
    assert_eq!(pipeline.epoch(), epoch + 3, "每摘除一个节点递增一次");
}

/// 拆除失败作为 `error_caught` 交给记录下的后继，拆除本身继续完成。
#[test]
fn removal_failure_is_reported_to_next_survivor() {
    let (_channel, pipeline) = fixture();
    let log = EventLog::new();
    pipeline.add_last(Some("h1"), recording("h1", &log)).expect("h1");
    pipeline
        .add_last(
            Some("h2"),
            Arc::new(
                RecordingHandler::new("h2", &log)
                    .failing_handler_removed(ChannelError::handler("test.cleanup", "boom")),
            ),
        )
        .expect("h2");
    pipeline.add_last(Some("h3"), recording("h3", &log)).expect("h3");
    log.clear();

    pipeline.remove_handlers();

    assert_eq!(
        log.entries(),
        [
            "h1.handler_removed",
            "h2.handler_removed",
            "h3.error_caught(pipeline.handler_removed)",
            "h3.handler_removed"
        ]
    );
    assert!(pipeline.is_empty());
    assert_eq!(pipeline.unclaimed().errors, 1, "h3 转发后由尾部吸收");
}

/// 最后一个节点拆除失败时，错误交给尾部哨兵。
#[test]
fn removal_failure_of_last_handler_reaches_tail() {
    let (_channel, pipeline) = fixture();
    let log = EventLog::new();
    pipeline.add_last(Some("h1"), recording("h1", &log)).expect("h1");
    pipeline
        .add_last(
            Some("h2"),
            Arc::new(
                RecordingHandler::new("h2", &log)
                    .failing_handler_removed(ChannelError::handler("test.cleanup", "boom")),
            ),
        )
        .expect("h2");
    log.clear();

    pipeline.fire_channel_unregistered();

    assert!(pipeline.is_empty());
    assert_eq!(log.entries_ending_with(".handler_removed").len(), 2);
    assert!(log.entries_ending_with(")").is_empty(), "没有存活节点收到错误");
    assert_eq!(pipeline.unclaimed().errors, 1);
}

/// 拆除过程中后继被移除时，从链路头部继续，最终仍然清空。
#[test]
fn teardown_survives_neighbour_removal() {
    let (_channel, pipeline) = fixture();
    let log = EventLog::new();
    pipeline
        .add_last(
            Some("evictor"),
            Arc::new(Evictor {
                victim: "h2",
                log: log.clone(),
            }),
        )
        .expect("evictor");
    pipeline.add_last(Some("h2"), recording("h2", &log)).expect("h2");
    pipeline.add_last(Some("h3"), recording("h3", &log)).expect("h3");
    log.clear();

    pipeline.remove_handlers();

    assert_eq!(
        log.entries(),
        ["evictor.handler_removed", "h3.handler_removed"],
        "被直接移除的 h2 不会收到通知"
    );
    assert!(pipeline.is_empty());
}

/// 空链路上的拆除是无操作。
#[test]
fn teardown_of_empty_pipeline_is_noop() {
    let (_channel, pipeline) = fixture();
    pipeline.remove_handlers();
    pipeline.fire_channel_unregistered();
    assert!(pipeline.is_empty());
    assert_eq!(pipeline.epoch(), 0);
}

/// 拆除后链路可重新装配，名称计数器不回退。
#[test]
fn pipeline_is_reusable_after_teardown() {
    let (_channel, pipeline) = fixture();
    let log = EventLog::new();
    assert_eq!(
        pipeline.add_last(None, recording("a", &log)).expect("a"),
        "handler0"
    );
    pipeline.remove_handlers();
    assert_eq!(
        pipeline.add_last(None, recording("b", &log)).expect("b"),
        "handler1"
    );
    assert_eq!(pipeline.names(), ["handler1"]);
}
