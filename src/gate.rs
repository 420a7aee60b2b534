use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;

/// 独占执行门闩，对应规格 C4。
///
/// # 设计背景（Why）
/// - 规格要求“跨所有并发分发，带有某个 `handler_id` 的独占处理器至多同时有一个
///   活动”，且冲突时“静默跳过，不入队不重试”。这是一个经典的
///   compare-and-set 标志位场景，`dashmap` 的分片锁既能承载动态增长的
///   `handler_id` 集合，又能配合 `AtomicBool` 做到无需持锁跨越调用边界。
pub struct ExclusiveGate {
    flags: DashMap<Arc<str>, AtomicBool>,
}

impl Default for ExclusiveGate {
    fn default() -> Self {
        Self {
            flags: DashMap::new(),
        }
    }
}

impl ExclusiveGate {
    /// 尝试获取某个 `handler_id` 的独占权。成功返回 `true`，否则（已被占用）
    /// 返回 `false`，调用方应静默跳过本次调用。
    pub fn try_acquire(&self, handler_id: &Arc<str>) -> bool {
        let flag = self
            .flags
            .entry(handler_id.clone())
            .or_insert_with(|| AtomicBool::new(false));
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// 释放先前获取的独占权。必须由获取它的同一次调用活动触发。
    pub fn release(&self, handler_id: &Arc<str>) {
        if let Some(flag) = self.flags.get(handler_id) {
            flag.store(false, Ordering::Release);
        }
    }

    /// 清理所有当前空闲（未占用）的条目，引擎关闭时的内务维护。
    pub fn prune(&self) {
        self.flags.retain(|_, flag| flag.load(Ordering::Acquire));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_concurrent_acquire_is_rejected() {
        let gate = ExclusiveGate::default();
        let id: Arc<str> = Arc::from("h1");
        assert!(gate.try_acquire(&id));
        assert!(!gate.try_acquire(&id));
        gate.release(&id);
        assert!(gate.try_acquire(&id));
    }

    #[test]
    fn independent_ids_do_not_interfere() {
        let gate = ExclusiveGate::default();
        let a: Arc<str> = Arc::from("a");
        let b: Arc<str> = Arc::from("b");
        assert!(gate.try_acquire(&a));
        assert!(gate.try_acquire(&b));
    }

    #[test]
    fn prune_drops_idle_entries_only() {
        let gate = ExclusiveGate::default();
        let a: Arc<str> = Arc::from("a");
        let b: Arc<str> = Arc::from("b");
        gate.try_acquire(&a);
        gate.try_acquire(&b);
        gate.release(&b);
        gate.prune();
        assert_eq!(gate.flags.len(), 1);
        assert!(gate.flags.contains_key(&a));
    }
}
