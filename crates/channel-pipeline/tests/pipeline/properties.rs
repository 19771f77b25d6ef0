//! 随机装配序列下的链路性质。
//!
//! 以 `Vec<String>` 作为影子模型，逐步比对：
//! 1. 哨兵始终存在且不可移除；
//! 2. 成功装配后的顺序与模型一致，安装失败不留下痕迹；
//! 3. 入站派发按模型顺序访问全部节点；
//! 4. 批量拆除为模型中的每个节点恰好发送一次 `handler_removed`；
//! 5. 任意子集（含相邻节点）拆除失败时，每次失败恰好一次交给紧随其后的存活节点或尾部。

use std::sync::Arc;

use proptest::prelude::*;

use channel_pipeline::test_stubs::{EventLog, RecordingHandler};
use channel_pipeline::{ChannelError, ChannelHandler, HandlerContext, PipelineMessage, Result};

use super::{fixture, recording};

#[derive(Clone, Debug)]
enum Op {
    AddFirst,
    AddLast,
    AddFailing { first: bool },
    Remove(usize),
    RemoveMissing,
    RemoveSentinel,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::AddFirst),
        3 => Just(Op::AddLast),
        1 => any::<bool>().prop_map(|first| Op::AddFailing { first }),
        2 => (0usize..32).prop_map(Op::Remove),
        1 => Just(Op::RemoveMissing),
        1 => Just(Op::RemoveSentinel),
    ]
}

/// 拆除时按需失败；收到的错误只记录来源节点，不再向后转发。
struct Cleanup {
    label: String,
    log: EventLog,
    fails: bool,
}

impl ChannelHandler for Cleanup {
    fn handler_removed(&self, _ctx: &HandlerContext<'_>) -> Result<()> {
        self.log.record(format!("{}.handler_removed", self.label));
        if self.fails {
            Err(ChannelError::handler("test.cleanup", "boom"))
        } else {
            Ok(())
        }
    }

    fn error_caught(&self, _ctx: &HandlerContext<'_>, error: ChannelError) -> Result<()> {
        let source = match &error {
            ChannelError::HandlerRemoved { name, .. } => name.clone(),
            other => other.code().to_string(),
        };
        self.log
            .record(format!("{}.error_caught({source})", self.label));
        Ok(())
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_chain_matches_shadow_model(ops in proptest::collection::vec(op(), 0..48)) {
        let (_channel, pipeline) = fixture();
        let log = EventLog::new();
        let mut model: Vec<String> = Vec::new();

        for (step, op) in ops.into_iter().enumerate() {
            let name = format!("n{step}");
            match op {
                Op::AddFirst => {
                    pipeline.add(Some(name.as_str()), recording(&name, &log), true).expect("add first");
                    model.insert(0, name);
                }
                Op::AddLast => {
                    pipeline.add(Some(name.as_str()), recording(&name, &log), false).expect("add last");
                    model.push(name);
                }
                Op::AddFailing { first } => {
                    let faulty = Arc::new(
                        RecordingHandler::new(&name, &log)
                            .failing_handler_added(ChannelError::handler("test.setup", "no")),
                    );
                    let outcome = pipeline.add(Some(name.as_str()), faulty, first);
                    let rejected = matches!(outcome, Err(ChannelError::HandlerAdded { .. }));
                    prop_assert!(rejected);
                }
                Op::Remove(pick) => {
                    if !model.is_empty() {
                        let victim = model.remove(pick % model.len());
                        prop_assert!(pipeline.remove_name(&victim));
                    }
                }
                Op::RemoveMissing => {
                    prop_assert!(!pipeline.remove_name("missing"));
                }
                Op::RemoveSentinel => {
                    prop_assert!(!pipeline.remove_name("head"));
                    prop_assert!(!pipeline.remove_name("tail"));
                }
            }
            prop_assert_eq!(&pipeline.names(), &model);
            prop_assert_eq!(pipeline.len(), model.len());
        }

        log.clear();
        pipeline.fire_channel_read(PipelineMessage::from_bytes("ping"));
        let visited = log.entries_ending_with(".channel_read");
        let expected: Vec<String> = model.iter().map(|name| format!("{name}.channel_read")).collect();
        prop_assert_eq!(visited, expected);
        prop_assert_eq!(pipeline.unclaimed().reads, 1);

        log.clear();
        pipeline.fire_channel_unregistered();
        let removed = log.entries_ending_with(".handler_removed");
        let expected: Vec<String> = model.iter().map(|name| format!("{name}.handler_removed")).collect();
        prop_assert_eq!(removed, expected);
        prop_assert!(pipeline.is_empty());
    }

    #[test]
    fn prop_teardown_failures_reach_next_survivor(
        failures in proptest::collection::vec(any::<bool>(), 1..12)
    ) {
        let (_channel, pipeline) = fixture();
        let log = EventLog::new();
        for (index, fails) in failures.iter().enumerate() {
            let label = format!("n{index}");
            let handler = Arc::new(Cleanup {
                label: label.clone(),
                log: log.clone(),
                fails: *fails,
            });
            pipeline.add_last(Some(label.as_str()), handler).expect("add");
        }

        pipeline.remove_handlers();

        let mut expected = Vec::new();
        for (index, fails) in failures.iter().enumerate() {
            expected.push(format!("n{index}.handler_removed"));
            if *fails && index + 1 < failures.len() {
                expected.push(format!("n{}.error_caught(n{index})", index + 1));
            }
        }
        prop_assert_eq!(log.entries(), expected);

        let last_failed = failures.last().copied().unwrap_or(false);
        prop_assert_eq!(pipeline.unclaimed().errors, u64::from(last_failed));
        prop_assert!(pipeline.is_empty());
    }
}
