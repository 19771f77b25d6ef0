//! Handler 链路的存储结构：以槽位数组承载双向链表。
//!
//! # 教案式说明
//! - **意图（Why）**：链路在事件派发过程中仍可能被 Handler 自己修改，节点之间若以引用互指，
//!   借用检查器无法证明安全；改用槽位下标作为 `prev`/`next`，插入与摘除仍为 O(1)。
//! - **逻辑（How）**：
//!   1. [`ContextId`] 由“槽位下标 + 代数”组成，槽位释放时代数加一，过期句柄因代数不符而解析失败；
//!   2. 摘除（`unlink`）只重连邻居，被摘除节点保留自身的 `prev`/`next`，仍在回调中的 Handler
//!      可以继续向前转发；邻居解析（`next_linked`/`prev_linked`）越过已摘除节点，只落在仍链接的节点上；
//!   3. 真正释放槽位（`release_retired`）由 Pipeline 推迟到没有派发在途时执行。
//! - **契约（What）**：头尾哨兵在构造时写入并永不摘除；链路始终满足
//!   `head -next-> … -next-> tail` 且反向同样可达。

use alloc::{string::String, sync::Arc, vec::Vec};

use super::handler::ChannelHandler;

/// 链路节点句柄。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContextId {
    index: u32,
    generation: u32,
}

impl ContextId {
    /// 槽位下标，仅用于诊断输出。
    pub fn index(self) -> usize {
        self.index as usize
    }
}

/// 节点在链路中的角色。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum NodeRole {
    Head,
    Tail,
    Interior,
}

pub(crate) struct Node {
    pub(crate) name: Arc<str>,
    pub(crate) handler: Arc<dyn ChannelHandler>,
    pub(crate) role: NodeRole,
    pub(crate) prev: Option<ContextId>,
    pub(crate) next: Option<ContextId>,
    pub(crate) linked: bool,
}

impl Node {
    pub(crate) fn new(
        name: impl Into<Arc<str>>,
        handler: Arc<dyn ChannelHandler>,
        role: NodeRole,
    ) -> Self {
        Self {
            name: name.into(),
            handler,
            role,
            prev: None,
            next: None,
            linked: false,
        }
    }
}

struct Slot {
    generation: u32,
    node: Option<Node>,
}

pub(crate) struct Chain {
    slots: Vec<Slot>,
    free: Vec<u32>,
    retired: Vec<ContextId>,
    head: ContextId,
    tail: ContextId,
    len: usize,
}

impl Chain {
    /// 以两个哨兵 Handler 构造仅含头尾节点的链路。
    pub(crate) fn new(head: Arc<dyn ChannelHandler>, tail: Arc<dyn ChannelHandler>) -> Self {
        let mut chain = Self {
            slots: Vec::new(),
            free: Vec::new(),
            retired: Vec::new(),
            head: ContextId {
                index: 0,
                generation: 0,
            },
            tail: ContextId {
                index: 1,
                generation: 0,
            },
            len: 0,
        };
        let head_id = chain.allocate(Node::new("head", head, NodeRole::Head));
        let tail_id = chain.allocate(Node::new("tail", tail, NodeRole::Tail));
        if let Some(node) = chain.get_mut(head_id) {
            node.next = Some(tail_id);
            node.linked = true;
        }
        if let Some(node) = chain.get_mut(tail_id) {
            node.prev = Some(head_id);
            node.linked = true;
        }
        chain.head = head_id;
        chain.tail = tail_id;
        chain
    }

    pub(crate) fn head(&self) -> ContextId {
        self.head
    }

    pub(crate) fn tail(&self) -> ContextId {
        self.tail
    }

    /// 已链接的内部节点数量（不含哨兵）。
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn allocate(&mut self, node: Node) -> ContextId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            ContextId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            ContextId {
                index,
                generation: 0,
            }
        }
    }

    pub(crate) fn get(&self, id: ContextId) -> Option<&Node> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn get_mut(&mut self, id: ContextId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    pub(crate) fn next_of(&self, id: ContextId) -> Option<ContextId> {
        self.get(id).and_then(|node| node.next)
    }

    pub(crate) fn prev_of(&self, id: ContextId) -> Option<ContextId> {
        self.get(id).and_then(|node| node.prev)
    }

    pub(crate) fn is_linked(&self, id: ContextId) -> bool {
        self.get(id).is_some_and(|node| node.linked)
    }

    /// 沿 `next` 方向解析首个仍链接的节点；途经已摘除节点时继续沿其保留指针前进。
    pub(crate) fn next_linked(&self, id: ContextId) -> Option<ContextId> {
        self.first_linked(self.next_of(id), Self::next_of)
    }

    /// 沿 `prev` 方向解析首个仍链接的节点，规则同 [`Chain::next_linked`]。
    pub(crate) fn prev_linked(&self, id: ContextId) -> Option<ContextId> {
        self.first_linked(self.prev_of(id), Self::prev_of)
    }

    fn first_linked(
        &self,
        mut cursor: Option<ContextId>,
        step: fn(&Self, ContextId) -> Option<ContextId>,
    ) -> Option<ContextId> {
        // 保留指针只指向摘除时刻的邻居，步数不会超过槽位数量。
        for _ in 0..self.slots.len() {
            let id = cursor?;
            if self.is_linked(id) {
                return Some(id);
            }
            cursor = step(self, id);
        }
        None
    }

    /// 将未链接的 `id` 插入到 `anchor` 之后；`anchor` 必须已链接且不是尾哨兵。
    pub(crate) fn link_after(&mut self, anchor: ContextId, id: ContextId) -> bool {
        if anchor == self.tail || !self.is_linked(anchor) {
            return false;
        }
        let Some(next) = self.next_of(anchor) else {
            return false;
        };
        match self.get_mut(id) {
            Some(node) if !node.linked && node.role == NodeRole::Interior => {
                node.prev = Some(anchor);
                node.next = Some(next);
                node.linked = true;
            }
            _ => return false,
        }
        if let Some(node) = self.get_mut(anchor) {
            node.next = Some(id);
        }
        if let Some(node) = self.get_mut(next) {
            node.prev = Some(id);
        }
        self.len += 1;
        true
    }

    /// 将未链接的 `id` 插入到 `anchor` 之前；`anchor` 必须已链接且不是头哨兵。
    pub(crate) fn link_before(&mut self, anchor: ContextId, id: ContextId) -> bool {
        if anchor == self.head || !self.is_linked(anchor) {
            return false;
        }
        match self.prev_of(anchor) {
            Some(prev) => self.link_after(prev, id),
            None => false,
        }
    }

    /// 摘除内部节点：邻居互指，节点自身保留旧指针。哨兵或未链接节点返回 `false`。
    pub(crate) fn unlink(&mut self, id: ContextId) -> bool {
        let (prev, next) = match self.get(id) {
            Some(node) if node.linked && node.role == NodeRole::Interior => {
                match (node.prev, node.next) {
                    (Some(prev), Some(next)) => (prev, next),
                    _ => return false,
                }
            }
            _ => return false,
        };
        if let Some(node) = self.get_mut(prev) {
            node.next = Some(next);
        }
        if let Some(node) = self.get_mut(next) {
            node.prev = Some(prev);
        }
        if let Some(node) = self.get_mut(id) {
            node.linked = false;
        }
        self.len -= 1;
        true
    }

    /// 登记待释放的已摘除节点。
    pub(crate) fn retire(&mut self, id: ContextId) {
        if !self.is_linked(id) && self.get(id).is_some() {
            self.retired.push(id);
        }
    }

    /// 释放全部待释放槽位，代数加一使旧句柄失效。
    pub(crate) fn release_retired(&mut self) {
        while let Some(id) = self.retired.pop() {
            if let Some(slot) = self.slots.get_mut(id.index as usize)
                && slot.generation == id.generation
                && slot.node.as_ref().is_some_and(|node| !node.linked)
            {
                slot.node = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(id.index);
            }
        }
    }

    /// 自头向尾单次扫描内部节点，返回首个满足条件的节点。
    pub(crate) fn find(&self, mut matches: impl FnMut(&Node) -> bool) -> Option<ContextId> {
        let mut cursor = self.next_of(self.head);
        while let Some(id) = cursor {
            if id == self.tail {
                break;
            }
            let node = self.get(id)?;
            if matches(node) {
                return Some(id);
            }
            cursor = node.next;
        }
        None
    }

    /// 按正向顺序列出内部节点。
    pub(crate) fn interior(&self) -> Vec<ContextId> {
        let mut ids = Vec::with_capacity(self.len);
        let mut cursor = self.next_of(self.head);
        while let Some(id) = cursor {
            if id == self.tail {
                break;
            }
            ids.push(id);
            cursor = self.next_of(id);
        }
        ids
    }

    /// 按正向顺序列出内部节点名称。
    pub(crate) fn names(&self) -> Vec<String> {
        self.interior()
            .into_iter()
            .filter_map(|id| self.get(id).map(|node| String::from(&*node.name)))
            .collect()
    }

    /// 自尾向头列出内部节点名称，用于校验反向可达性。
    #[cfg(test)]
    pub(crate) fn names_reversed(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.len);
        let mut cursor = self.prev_of(self.tail);
        while let Some(id) = cursor {
            if id == self.head {
                break;
            }
            if let Some(node) = self.get(id) {
                names.push(String::from(&*node.name));
            }
            cursor = self.prev_of(id);
        }
        names
    }
}
