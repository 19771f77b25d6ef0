use alloc::{format, string::String, sync::Arc, vec::Vec};
use core::cell::{Cell, RefCell};
use core::fmt;

use tracing::warn;

use crate::buffer::PipelineMessage;
use crate::channel::{Channel, EventLoopId};
use crate::config::{DuplicateNamePolicy, PipelineConfig};
use crate::error::{ChannelError, Result};
use crate::event::UserEvent;
use crate::future::{ChannelFuture, ChannelPromise};

use super::chain::{Chain, ContextId, Node, NodeRole};
use super::context::HandlerContext;
use super::default_handlers::{HeadHandler, TailHandler};
use super::handler::ChannelHandler;
use super::instrument::{MutationKind, record_mutation};

/// Handler 注册信息的只读快照。
///
/// # 教案式说明
/// - **意图（Why）**：排障时需要在不持有链路借用的前提下查看当前装配顺序；
/// - **逻辑（How）**：[`ChannelPipeline::snapshot`] 按入站顺序逐个复制名称、句柄与类型描述；
/// - **契约（What）**：快照不随链路后续变更而更新，头尾哨兵不在其中。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandlerRegistration {
    id: ContextId,
    name: String,
    handler_type: &'static str,
}

impl HandlerRegistration {
    /// 节点句柄。
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// 节点名称。
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handler 的 [`describe`](ChannelHandler::describe) 结果。
    pub fn handler_type(&self) -> &'static str {
        self.handler_type
    }
}

/// 抵达尾部哨兵而未被任何 Handler 处理的事件计数。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UnclaimedEvents {
    /// 未被消费的 `channel_read` 次数。
    pub reads: u64,
    /// 未被处理的 `error_caught` 次数。
    pub errors: u64,
}

#[derive(Clone, Copy)]
enum Placement<'n> {
    First,
    Last,
    After(&'n str),
    Before(&'n str),
}

/// 通道事件分发链路。
///
/// # 设计背景（Why）
/// - 每个通道独占一条 Pipeline：入站事件自头向尾流经 Handler，出站操作自尾向头，
///   最终由头部哨兵交给 [`Channel`] 的原始 I/O 原语；
/// - 链路在派发期间仍可增删节点，适用于协议升级、握手后卸载等场景。
///
/// # 逻辑解析（How）
/// - 链路存放在 [`RefCell`] 中，每次邻居解析只短暂借用，回调执行期间不持有借用；
/// - 派发深度由 [`Cell`] 计数，摘除的节点推迟到深度归零时才释放槽位，
///   已摘除但仍在回调中的 Handler 可继续沿旧指针转发；
/// - 每次成功增删都递增 `epoch` 并输出 `pipeline.mutation applied` 日志。
///
/// # 契约说明（What）
/// - 类型为 `Send` 而非 `Sync`：构造后可移交给通道所属事件循环，之后只在该线程上使用；
/// - 头尾哨兵名为 `"head"`/`"tail"`，永不移除，也不参与按名称或按 Handler 的查找；
/// - 所有操作都不阻塞，出站结果通过 [`ChannelFuture`] 报告。
pub struct ChannelPipeline {
    channel: Arc<dyn Channel>,
    config: PipelineConfig,
    chain: RefCell<Chain>,
    name_sequence: Cell<u64>,
    epoch: Cell<u64>,
    dispatch_depth: Cell<usize>,
    unclaimed: Cell<UnclaimedEvents>,
}

/// 派发深度守卫，离开最外层派发时释放已摘除节点。
pub(crate) struct DispatchGuard<'a> {
    pipeline: &'a ChannelPipeline,
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        let depth = self.pipeline.dispatch_depth.get().saturating_sub(1);
        self.pipeline.dispatch_depth.set(depth);
        self.pipeline.release_if_idle();
    }
}

impl ChannelPipeline {
    /// 以默认配置构造。
    pub fn new(channel: Arc<dyn Channel>) -> Self {
        Self::with_config(channel, PipelineConfig::default())
    }

    /// 以指定配置构造，仅包含头尾哨兵。
    pub fn with_config(channel: Arc<dyn Channel>, config: PipelineConfig) -> Self {
        Self {
            channel,
            config,
            chain: RefCell::new(Chain::new(Arc::new(HeadHandler), Arc::new(TailHandler))),
            name_sequence: Cell::new(0),
            epoch: Cell::new(0),
            dispatch_depth: Cell::new(0),
            unclaimed: Cell::new(UnclaimedEvents::default()),
        }
    }

    // ---- 装配 ----

    /// 在头部（`first = true`）或尾部插入 Handler，返回实际生效的名称。
    ///
    /// # 契约说明（What）
    /// - `name` 为 `None` 时由 [`next_name`](Self::next_name) 生成；
    /// - 插入后立即调用 `handler_added`；失败时节点被摘除，链路与调用前一致，
    ///   错误以 [`ChannelError::HandlerAdded`] 返回；
    /// - [`DuplicateNamePolicy::Reject`] 下重名在触碰链路之前即失败。
    pub fn add(
        &self,
        name: Option<&str>,
        handler: Arc<dyn ChannelHandler>,
        first: bool,
    ) -> Result<String> {
        let placement = if first {
            Placement::First
        } else {
            Placement::Last
        };
        self.insert(placement, name, handler)
    }

    /// 插入到头部哨兵之后。
    pub fn add_first(&self, name: Option<&str>, handler: Arc<dyn ChannelHandler>) -> Result<String> {
        self.insert(Placement::First, name, handler)
    }

    /// 插入到尾部哨兵之前。
    pub fn add_last(&self, name: Option<&str>, handler: Arc<dyn ChannelHandler>) -> Result<String> {
        self.insert(Placement::Last, name, handler)
    }

    /// 插入到名为 `anchor` 的节点之后；锚点不存在时返回 [`ChannelError::HandlerNotFound`]。
    pub fn add_after(
        &self,
        anchor: &str,
        name: Option<&str>,
        handler: Arc<dyn ChannelHandler>,
    ) -> Result<String> {
        self.insert(Placement::After(anchor), name, handler)
    }

    /// 插入到名为 `anchor` 的节点之前。
    pub fn add_before(
        &self,
        anchor: &str,
        name: Option<&str>,
        handler: Arc<dyn ChannelHandler>,
    ) -> Result<String> {
        self.insert(Placement::Before(anchor), name, handler)
    }

    fn insert(
        &self,
        placement: Placement<'_>,
        name: Option<&str>,
        handler: Arc<dyn ChannelHandler>,
    ) -> Result<String> {
        let name = self.resolve_name(name)?;
        let ctx = {
            let mut chain = self.chain.borrow_mut();
            let (anchor, anchor_name, after) = match placement {
                Placement::First => (chain.head(), "head", true),
                Placement::Last => (chain.tail(), "tail", false),
                Placement::After(anchor) => (Self::locate(&chain, anchor)?, anchor, true),
                Placement::Before(anchor) => (Self::locate(&chain, anchor)?, anchor, false),
            };
            let node_name: Arc<str> = Arc::from(name.as_str());
            let id = chain.allocate(Node::new(
                Arc::clone(&node_name),
                Arc::clone(&handler),
                NodeRole::Interior,
            ));
            if let Err(error) = Self::link_at(&mut chain, anchor, anchor_name, after, id) {
                drop(chain);
                self.release_if_idle();
                return Err(error);
            }
            HandlerContext::new(self, id, node_name, handler)
        };

        if let Err(error) = ctx.invoke_handler_added() {
            self.rollback(ctx.id());
            warn!(
                pipeline.handler = %name,
                error.code = error.code(),
                "handler_added failed, handler was unlinked: {error}"
            );
            return Err(match error {
                ChannelError::HandlerAdded { .. } => error,
                other => ChannelError::HandlerAdded {
                    name,
                    reason: other.to_string(),
                },
            });
        }

        let epoch = self.bump_epoch();
        record_mutation(MutationKind::Add, &name, epoch);
        Ok(name)
    }

    fn rollback(&self, id: ContextId) {
        {
            let mut chain = self.chain.borrow_mut();
            chain.unlink(id);
            chain.retire(id);
        }
        self.release_if_idle();
    }

    /// 把新节点链接到锚点旁；失败时登记回收槽位，并以锚点名称报告 `HandlerNotFound`。
    fn link_at(
        chain: &mut Chain,
        anchor: ContextId,
        anchor_name: &str,
        after: bool,
        id: ContextId,
    ) -> Result<()> {
        let linked = if after {
            chain.link_after(anchor, id)
        } else {
            chain.link_before(anchor, id)
        };
        if linked {
            return Ok(());
        }
        chain.retire(id);
        Err(ChannelError::HandlerNotFound {
            name: String::from(anchor_name),
        })
    }

    fn locate(chain: &Chain, anchor: &str) -> Result<ContextId> {
        chain
            .find(|node| &*node.name == anchor)
            .ok_or_else(|| ChannelError::HandlerNotFound {
                name: String::from(anchor),
            })
    }

    fn resolve_name(&self, name: Option<&str>) -> Result<String> {
        let reject = self.config.duplicate_names == DuplicateNamePolicy::Reject;
        match name {
            Some(name) => {
                if reject && self.contains_name(name) {
                    return Err(ChannelError::DuplicateName {
                        name: String::from(name),
                    });
                }
                Ok(String::from(name))
            }
            None => loop {
                let candidate = self.next_name();
                if !reject || !self.contains_name(&candidate) {
                    break Ok(candidate);
                }
            },
        }
    }

    /// 生成 `handler{n}` 形式的名称；计数器属于本 Pipeline，只增不减。
    pub fn next_name(&self) -> String {
        let sequence = self.name_sequence.get();
        self.name_sequence.set(sequence + 1);
        format!("handler{sequence}")
    }

    // ---- 摘除与查询 ----

    /// 摘除第一个同名节点；不存在时返回 `false`。此路径不触发 `handler_removed`。
    pub fn remove_name(&self, name: &str) -> bool {
        self.remove_where(|node| &*node.name == name)
    }

    /// 按 `Arc` 指针同一性摘除节点。
    pub fn remove_handler<H>(&self, handler: &Arc<H>) -> bool
    where
        H: ChannelHandler + ?Sized,
    {
        let target = Arc::as_ptr(handler).cast::<()>();
        self.remove_where(|node| Arc::as_ptr(&node.handler).cast::<()>() == target)
    }

    /// 是否存在同名节点。
    pub fn contains_name(&self, name: &str) -> bool {
        self.chain
            .borrow()
            .find(|node| &*node.name == name)
            .is_some()
    }

    /// 是否存在持有同一 Handler 实例的节点。
    pub fn contains_handler<H>(&self, handler: &Arc<H>) -> bool
    where
        H: ChannelHandler + ?Sized,
    {
        let target = Arc::as_ptr(handler).cast::<()>();
        self.chain
            .borrow()
            .find(|node| Arc::as_ptr(&node.handler).cast::<()>() == target)
            .is_some()
    }

    fn remove_where(&self, matches: impl FnMut(&Node) -> bool) -> bool {
        let name = {
            let mut chain = self.chain.borrow_mut();
            let Some(id) = chain.find(matches) else {
                return false;
            };
            let name = chain.get(id).map(|node| Arc::clone(&node.name));
            chain.unlink(id);
            chain.retire(id);
            name
        };
        let epoch = self.bump_epoch();
        record_mutation(
            MutationKind::Remove,
            name.as_deref().unwrap_or_default(),
            epoch,
        );
        self.release_if_idle();
        true
    }

    /// 批量拆除全部内部节点。
    ///
    /// # 教案式说明
    /// - **意图（Why）**：通道注销后链路上的 Handler 需要逐个得到 `handler_removed` 通知以释放资源；
    /// - **逻辑（How）**：自头向尾，先记下后继，再摘除当前节点并通知；通知失败时把错误作为
    ///   `error_caught` 交给记下的后继（最后一个节点的后继即尾部哨兵）。若通知期间后继已被摘除，
    ///   则从头部重新开始；
    /// - **契约（What）**：不向调用方返回错误，结束时链路只剩头尾哨兵。
    pub fn remove_handlers(&self) {
        let _dispatch = self.enter_dispatch();
        let mut cursor: Option<ContextId> = None;
        loop {
            let (ctx, successor) = {
                let mut chain = self.chain.borrow_mut();
                let tail = chain.tail();
                let current = match cursor.filter(|id| *id != tail && chain.is_linked(*id)) {
                    Some(id) => id,
                    None => match chain.next_of(chain.head()) {
                        Some(id) if id != tail => id,
                        _ => break,
                    },
                };
                let successor = chain.next_of(current).unwrap_or(tail);
                let Some(node) = chain.get(current) else {
                    break;
                };
                let ctx = HandlerContext::new(
                    self,
                    current,
                    Arc::clone(&node.name),
                    Arc::clone(&node.handler),
                );
                chain.unlink(current);
                chain.retire(current);
                (ctx, successor)
            };

            let epoch = self.bump_epoch();
            record_mutation(MutationKind::Teardown, ctx.name(), epoch);

            if let Err(error) = ctx.invoke_handler_removed() {
                warn!(
                    pipeline.handler = %ctx.name(),
                    error.code = error.code(),
                    "handler_removed failed during teardown: {error}"
                );
                let error = match error {
                    ChannelError::HandlerRemoved { .. } => error,
                    other => ChannelError::HandlerRemoved {
                        name: String::from(ctx.name()),
                        reason: other.to_string(),
                    },
                };
                if let Some(next) = self.context_of(successor) {
                    next.invoke_error_caught(error);
                }
            }
            cursor = Some(successor);
        }
    }

    // ---- 入站派发 ----

    /// 通道注册，自头部入站。
    pub fn fire_channel_registered(&self) {
        if let Some(head) = self.head_context() {
            head.invoke_channel_registered();
        }
    }

    /// 通道注销；头部哨兵在转发后触发批量拆除。
    pub fn fire_channel_unregistered(&self) {
        if let Some(head) = self.head_context() {
            head.invoke_channel_unregistered();
        }
    }

    /// 通道激活；头部哨兵在转发后按 `auto_read` 发起读取。
    pub fn fire_channel_active(&self) {
        if let Some(head) = self.head_context() {
            head.invoke_channel_active();
        }
    }

    /// 通道失活。
    pub fn fire_channel_inactive(&self) {
        if let Some(head) = self.head_context() {
            head.invoke_channel_inactive();
        }
    }

    /// 投递一条读到的消息。
    pub fn fire_channel_read(&self, msg: PipelineMessage) {
        if let Some(head) = self.head_context() {
            head.invoke_channel_read(msg);
        }
    }

    /// 一批读取结束。
    pub fn fire_channel_read_complete(&self) {
        if let Some(head) = self.head_context() {
            head.invoke_channel_read_complete();
        }
    }

    /// 通道可写性变化。
    pub fn fire_channel_writability_changed(&self, writable: bool) {
        if let Some(head) = self.head_context() {
            head.invoke_channel_writability_changed(writable);
        }
    }

    /// 自头部投递用户事件。
    pub fn fire_user_event_triggered(&self, event: UserEvent) {
        if let Some(head) = self.head_context() {
            head.invoke_user_event_triggered(event);
        }
    }

    /// 自头部投递错误；无人处理时由尾部按策略记录。
    pub fn fire_error_caught(&self, error: ChannelError) {
        if let Some(head) = self.head_context() {
            head.invoke_error_caught(error);
        }
    }

    // ---- 出站派发 ----

    /// 自尾部发起写操作。
    pub fn write(&self, msg: PipelineMessage, promise: ChannelPromise) -> ChannelFuture {
        let future = promise.future();
        if let Some(tail) = self.tail_context() {
            tail.invoke_write(msg, promise);
        }
        future
    }

    /// 自尾部发起写操作并冲刷。
    pub fn write_and_flush(&self, msg: PipelineMessage, promise: ChannelPromise) -> ChannelFuture {
        let future = promise.future();
        if let Some(tail) = self.tail_context() {
            tail.invoke_write_and_flush(msg, promise);
        }
        future
    }

    /// 自尾部发起冲刷。
    pub fn flush(&self) {
        if let Some(tail) = self.tail_context() {
            tail.invoke_flush();
        }
    }

    /// 自尾部发起关闭。
    pub fn close(&self, promise: ChannelPromise) -> ChannelFuture {
        let future = promise.future();
        if let Some(tail) = self.tail_context() {
            tail.invoke_close(promise);
        }
        future
    }

    /// 请求通道开始下一次读取。
    pub fn read(&self) {
        if let Some(tail) = self.tail_context() {
            tail.invoke_read();
        }
    }

    // ---- 自省 ----

    /// 内部节点名称，按入站顺序。
    pub fn names(&self) -> Vec<String> {
        self.chain.borrow().names()
    }

    /// 当前装配的只读快照。
    pub fn snapshot(&self) -> Vec<HandlerRegistration> {
        let chain = self.chain.borrow();
        chain
            .interior()
            .into_iter()
            .filter_map(|id| {
                chain.get(id).map(|node| HandlerRegistration {
                    id,
                    name: String::from(&*node.name),
                    handler_type: node.handler.describe(),
                })
            })
            .collect()
    }

    /// 按名称获取上下文，可从链路中段发起事件。
    pub fn context(&self, name: &str) -> Option<HandlerContext<'_>> {
        let id = self.chain.borrow().find(|node| &*node.name == name)?;
        self.context_of(id)
    }

    /// 按名称获取 Handler。
    pub fn handler(&self, name: &str) -> Option<Arc<dyn ChannelHandler>> {
        let chain = self.chain.borrow();
        let id = chain.find(|node| &*node.name == name)?;
        chain.get(id).map(|node| Arc::clone(&node.handler))
    }

    /// 内部节点数量。
    pub fn len(&self) -> usize {
        self.chain.borrow().len()
    }

    /// 是否只剩头尾哨兵。
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 链路变更代数，每次成功增删递增。
    pub fn epoch(&self) -> u64 {
        self.epoch.get()
    }

    /// 所属通道。
    pub fn channel(&self) -> &Arc<dyn Channel> {
        &self.channel
    }

    /// 通道所属事件循环。
    pub fn event_loop(&self) -> EventLoopId {
        self.channel.event_loop()
    }

    /// 构造时生效的配置。
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// 被尾部哨兵吸收的事件计数。
    pub fn unclaimed(&self) -> UnclaimedEvents {
        self.unclaimed.get()
    }

    // ---- 内部协作 ----

    pub(crate) fn note_unclaimed_read(&self) {
        let mut counters = self.unclaimed.get();
        counters.reads += 1;
        self.unclaimed.set(counters);
    }

    pub(crate) fn note_unclaimed_error(&self) {
        let mut counters = self.unclaimed.get();
        counters.errors += 1;
        self.unclaimed.set(counters);
    }

    pub(crate) fn enter_dispatch(&self) -> DispatchGuard<'_> {
        self.dispatch_depth.set(self.dispatch_depth.get() + 1);
        DispatchGuard { pipeline: self }
    }

    pub(crate) fn next_context(&self, id: ContextId) -> Option<HandlerContext<'_>> {
        let next = self.chain.borrow().next_linked(id)?;
        self.context_of(next)
    }

    pub(crate) fn prev_context(&self, id: ContextId) -> Option<HandlerContext<'_>> {
        let prev = self.chain.borrow().prev_linked(id)?;
        self.context_of(prev)
    }

    fn context_of(&self, id: ContextId) -> Option<HandlerContext<'_>> {
        let chain = self.chain.borrow();
        let node = chain.get(id)?;
        Some(HandlerContext::new(
            self,
            id,
            Arc::clone(&node.name),
            Arc::clone(&node.handler),
        ))
    }

    fn head_context(&self) -> Option<HandlerContext<'_>> {
        let head = self.chain.borrow().head();
        self.context_of(head)
    }

    fn tail_context(&self) -> Option<HandlerContext<'_>> {
        let tail = self.chain.borrow().tail();
        self.context_of(tail)
    }

    fn bump_epoch(&self) -> u64 {
        let epoch = self.epoch.get() + 1;
        self.epoch.set(epoch);
        epoch
    }

    /// 没有派发在途时释放已摘除节点的槽位。
    fn release_if_idle(&self) {
        if self.dispatch_depth.get() != 0 {
            return;
        }
        // 外层若仍持有链路借用，留给下一次归零时释放。
        if let Ok(mut chain) = self.chain.try_borrow_mut() {
            chain.release_retired();
        }
    }
}

impl fmt::Debug for ChannelPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelPipeline")
            .field("event_loop", &self.event_loop())
            .field("handlers", &self.names())
            .field("epoch", &self.epoch())
            .finish()
    }
}
