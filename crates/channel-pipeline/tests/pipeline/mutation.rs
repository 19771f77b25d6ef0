use std::sync::Arc;

use channel_pipeline::test_stubs::{EventLog, RecordingChannel, RecordingHandler};
use channel_pipeline::{
    ChannelError, ChannelHandler, ChannelPipeline, DuplicateNamePolicy, PipelineConfig,
    PipelineMessage,
};

use super::{fixture, recording};

fn rejecting_pipeline() -> ChannelPipeline {
    let config = PipelineConfig::from_toml_str("duplicate_names = \"reject\"")
        .expect("合法配置");
    assert_eq!(config.duplicate_names, DuplicateNamePolicy::Reject);
    ChannelPipeline::with_config(Arc::new(RecordingChannel::new()), config)
}

/// 新建的 Pipeline 只有头尾哨兵，且哨兵不可被查找或移除。
#[test]
fn sentinels_are_permanent_and_invisible() {
    let (_channel, pipeline) = fixture();
    assert!(pipeline.is_empty());
    assert!(pipeline.names().is_empty());

    for sentinel in ["head", "tail"] {
        assert!(!pipeline.contains_name(sentinel), "哨兵不参与按名称查找");
        assert!(!pipeline.remove_name(sentinel), "哨兵不可移除");
        assert!(pipeline.context(sentinel).is_none());
    }

    pipeline.fire_channel_read(PipelineMessage::from_bytes("still routed"));
    assert_eq!(pipeline.unclaimed().reads, 1, "空链路的读事件仍抵达尾部");
    assert_eq!(pipeline.epoch(), 0);
}

/// `first = true` 紧随头部插入，否则紧贴尾部插入；入站按链路顺序访问。
#[test]
fn insertion_positions_define_inbound_order() {
    let (_channel, pipeline) = fixture();
    let log = EventLog::new();
    pipeline.add(Some("a"), recording("a", &log), false).expect("add a");
    pipeline.add(Some("b"), recording("b", &log), false).expect("add b");
    pipeline.add(Some("z"), recording("z", &log), true).expect("add z");
    pipeline.add_first(Some("y"), recording("y", &log)).expect("add y");

    assert_eq!(pipeline.names(), ["y", "z", "a", "b"]);
    assert_eq!(pipeline.len(), 4);

    log.clear();
    pipeline.fire_channel_active();
    assert_eq!(
        log.entries(),
        [
            "y.channel_active",
            "z.channel_active",
            "a.channel_active",
            "b.channel_active"
        ]
    );
}

/// 相对锚点插入；锚点缺失时链路保持不变。
#[test]
fn positional_insertion_relative_to_anchor() {
    let (_channel, pipeline) = fixture();
    let log = EventLog::new();
    pipeline.add_last(Some("decoder"), recording("decoder", &log)).expect("decoder");
    pipeline.add_last(Some("app"), recording("app", &log)).expect("app");

    pipeline
        .add_after("decoder", Some("auth"), recording("auth", &log))
        .expect("after decoder");
    pipeline
        .add_before("decoder", Some("tls"), recording("tls", &log))
        .expect("before decoder");
    assert_eq!(pipeline.names(), ["tls", "decoder", "auth", "app"]);

    let epoch = pipeline.epoch();
    let err = pipeline
        .add_after("missing", Some("ghost"), recording("ghost", &log))
        .expect_err("锚点不存在");
    assert_eq!(
        err,
        ChannelError::HandlerNotFound {
            name: "missing".into()
        }
    );
    assert_eq!(pipeline.names(), ["tls", "decoder", "auth", "app"]);
    assert_eq!(pipeline.epoch(), epoch);
    assert!(!log.entries().contains(&"ghost.handler_added".to_string()));
}

/// 对不存在的名称或实例，查找与移除重复调用结果一致且无副作用。
#[test]
fn negative_lookup_is_idempotent() {
    let (_channel, pipeline) = fixture();
    let log = EventLog::new();
    pipeline.add_last(Some("a"), recording("a", &log)).expect("add a");
    let stranger = recording("stranger", &log);
    let epoch = pipeline.epoch();

    for _ in 0..2 {
        assert!(!pipeline.contains_name("x"));
        assert!(!pipeline.remove_name("x"));
        assert!(!pipeline.contains_handler(&stranger));
        assert!(!pipeline.remove_handler(&stranger));
    }
    assert_eq!(pipeline.names(), ["a"]);
    assert_eq!(pipeline.epoch(), epoch);
}

/// `handler_added` 失败时链路恢复原状，错误带上节点名称。
#[test]
fn failed_handler_added_rolls_back() {
    let (_channel, pipeline) = fixture();
    let log = EventLog::new();
    pipeline.add_last(Some("a"), recording("a", &log)).expect("add a");
    pipeline.add_last(Some("b"), recording("b", &log)).expect("add b");
    let epoch = pipeline.epoch();

    let faulty = Arc::new(
        RecordingHandler::new("bad", &log)
            .failing_handler_added(ChannelError::handler("test.setup", "refused")),
    );
    let err = pipeline
        .add(Some("bad"), faulty.clone(), true)
        .expect_err("安装必须失败");

    match &err {
        ChannelError::HandlerAdded { name, reason } => {
            assert_eq!(name, "bad");
            assert!(reason.contains("refused"), "保留原始原因: {reason}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.code(), "pipeline.handler_added");
    assert_eq!(pipeline.names(), ["a", "b"]);
    assert!(!pipeline.contains_handler(&faulty));
    assert_eq!(pipeline.epoch(), epoch, "回滚不计入变更代数");
    assert_eq!(log.entries_ending_with("bad.handler_added").len(), 1);

    log.clear();
    pipeline.fire_channel_read(PipelineMessage::from_bytes("x"));
    assert_eq!(log.entries(), ["a.channel_read", "b.channel_read"]);
}

/// 默认允许重名，按名称操作命中正向扫描的第一个。
#[test]
fn duplicate_names_resolve_to_first_match() {
    let (_channel, pipeline) = fixture();
    let log = EventLog::new();
    let first = recording("first", &log);
    let second = recording("second", &log);
    pipeline.add_last(Some("dup"), first.clone()).expect("first");
    pipeline.add_last(Some("dup"), second.clone()).expect("second");
    assert_eq!(pipeline.names(), ["dup", "dup"]);

    let resolved = pipeline.handler("dup").expect("存在");
    let expected: Arc<dyn ChannelHandler> = first.clone();
    assert!(Arc::ptr_eq(&resolved, &expected));

    assert!(pipeline.remove_name("dup"));
    assert!(!pipeline.contains_handler(&first));
    assert!(pipeline.contains_handler(&second));
}

/// 拒绝重名时，冲突在触碰链路之前即失败，且不会调用 `handler_added`。
#[test]
fn reject_policy_refuses_duplicates_before_linking() {
    let pipeline = rejecting_pipeline();
    let log = EventLog::new();
    pipeline.add_last(Some("codec"), recording("one", &log)).expect("first");

    let err = pipeline
        .add_first(Some("codec"), recording("two", &log))
        .expect_err("重名");
    assert_eq!(
        err,
        ChannelError::DuplicateName {
            name: "codec".into()
        }
    );
    assert_eq!(err.code(), "pipeline.duplicate_name");
    assert_eq!(pipeline.names(), ["codec"]);
    assert!(log.entries_ending_with("two.handler_added").is_empty());
}

/// 拒绝重名时，自动生成的名称会跳过已被占用的名称。
#[test]
fn reject_policy_skips_taken_synthesized_names() {
    let pipeline = rejecting_pipeline();
    let log = EventLog::new();
    pipeline.add_last(Some("handler0"), recording("manual", &log)).expect("manual");

    let generated = pipeline.add_last(None, recording("auto", &log)).expect("auto");
    assert_eq!(generated, "handler1");
    assert_eq!(pipeline.names(), ["handler0", "handler1"]);
}

/// 自动命名按 `handler0, handler1, …` 递增，移除后也不复用。
#[test]
fn synthesized_names_are_never_reused() {
    let (_channel, pipeline) = fixture();
    let log = EventLog::new();
    let names: Vec<String> = (0..3)
        .map(|_| pipeline.add_last(None, recording("h", &log)).expect("add"))
        .collect();
    assert_eq!(names, ["handler0", "handler1", "handler2"]);

    assert!(pipeline.remove_name("handler1"));
    let next = pipeline.add_last(None, recording("h", &log)).expect("add");
    assert_eq!(next, "handler3");
    assert_eq!(pipeline.next_name(), "handler4");
    assert_eq!(pipeline.names(), ["handler0", "handler2", "handler3"]);
}

/// 按实例移除只比较指针同一性，且直接移除不发送 `handler_removed`。
#[test]
fn remove_by_identity_without_notification() {
    let (_channel, pipeline) = fixture();
    let log = EventLog::new();
    let left = recording("same", &log);
    let right = recording("same", &log);
    pipeline.add_last(Some("left"), left.clone()).expect("left");
    pipeline.add_last(Some("right"), right.clone()).expect("right");

    assert!(pipeline.remove_handler(&right));
    assert_eq!(pipeline.names(), ["left"]);
    assert!(!pipeline.remove_handler(&right), "已移除的实例不会再次命中");
    assert!(pipeline.contains_handler(&left));
    assert!(log.entries_ending_with(".handler_removed").is_empty());
}

/// 快照、上下文与变更代数反映当前装配。
#[test]
fn introspection_reflects_current_chain() {
    let (_channel, pipeline) = fixture();
    let log = EventLog::new();
    assert_eq!(pipeline.epoch(), 0);
    pipeline.add_last(Some("a"), recording("a", &log)).expect("add a");
    pipeline.add_last(Some("b"), recording("b", &log)).expect("add b");
    assert_eq!(pipeline.epoch(), 2);

    let snapshot = pipeline.snapshot();
    let names: Vec<&str> = snapshot.iter().map(|entry| entry.name()).collect();
    assert_eq!(names, ["a", "b"]);
    assert!(
        snapshot
            .iter()
            .all(|entry| entry.handler_type().ends_with("RecordingHandler"))
    );
    assert_ne!(snapshot[0].id(), snapshot[1].id());

    let ctx = pipeline.context("b").expect("b 存在");
    assert_eq!(ctx.name(), "b");
    assert_eq!(ctx.id(), snapshot[1].id());

    assert!(pipeline.remove_name("a"));
    assert_eq!(pipeline.epoch(), 3);
    assert_eq!(snapshot.len(), 2, "快照不随后续变更更新");
}
