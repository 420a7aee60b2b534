use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::descriptor::{HandlerDescriptor, OwnerTag};

/// 一个事件类型键下的处理器有序快照，对应规格 C2。
///
/// # 设计背景（Why）
/// - 规格要求“读者永远不加锁地看到一份一致、已排好序的快照”。这是
///   `spark_core`全篇偏好的“原子指针指向不可变列表，写者 CAS 替换”模式的直接
///   应用（参见 `spark_core::arc_swap` 模块的文档、以及 Design Notes 中“锁自由
///   快照”一条）；这里直接使用真正的 `arc-swap` crate 而不是教学用的自制回退版。
///
/// # 契约说明（What）
/// - 插入：读快照、追加、按优先级降序重排（同优先级按注册顺序稳定），CAS 替换，
///   冲突则重试。
/// - 删除：读快照、过滤掉匹配项，CAS 替换。
/// - 不变量：快照内优先级单调不增；同一个描述符在同一个桶里最多出现一次
///   （按 `handler_id` 去重，由调用方保证 `handler_id` 唯一）。
pub struct HandlerBucket {
    snapshot: ArcSwap<Vec<Arc<HandlerDescriptor>>>,
}

impl Default for HandlerBucket {
    fn default() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(Vec::new()),
        }
    }
}

fn sorted(mut list: Vec<Arc<HandlerDescriptor>>) -> Vec<Arc<HandlerDescriptor>> {
    // 显式以 `(priority desc, seq asc)` 作为排序键，而不是依赖某个排序算法“恰好
    // 稳定”的副作用（见 SPEC_FULL §9 对优先级并列稳定性的决策）。
    list.sort_by(|a, b| {
        b.configuration
            .priority()
            .cmp(&a.configuration.priority())
            .then(a.seq.cmp(&b.seq))
    });
    list
}

impl HandlerBucket {
    pub fn snapshot(&self) -> Arc<Vec<Arc<HandlerDescriptor>>> {
        self.snapshot.load_full()
    }

    /// 插入一个新描述符，按优先级重新排序后 CAS 替换。
    pub fn insert(&self, descriptor: Arc<HandlerDescriptor>) {
        self.snapshot.rcu(|current| {
            let mut next: Vec<Arc<HandlerDescriptor>> = current.as_ref().clone();
            next.push(descriptor.clone());
            sorted(next)
        });
    }

    /// 移除一个具体描述符（按指针身份）。
    pub fn remove_by_handler_id(&self, handler_id: &str) {
        self.snapshot.rcu(|current| {
            let next: Vec<Arc<HandlerDescriptor>> = current
                .iter()
                .filter(|d| d.handler_id.as_ref() != handler_id)
                .cloned()
                .collect();
            next
        });
    }

    /// 移除某个所有者注册的全部描述符。
    pub fn remove_by_owner(&self, owner: OwnerTag) {
        self.snapshot.rcu(|current| {
            let next: Vec<Arc<HandlerDescriptor>> =
                current.iter().filter(|d| d.owner != owner).cloned().collect();
            next
        });
    }

    /// 清空整个桶（引擎关闭时使用）。
    pub fn clear(&self) {
        self.snapshot.store(Arc::new(Vec::new()));
    }

    pub fn len(&self) -> usize {
        self.snapshot.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
