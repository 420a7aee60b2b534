use std::any::TypeId;
use std::sync::Arc;

use dashmap::DashMap;

use crate::bucket::HandlerBucket;
use crate::descriptor::OwnerTag;

/// 事件具体类型 → 处理器桶的并发映射，对应规格 C1。
///
/// # 设计背景（Why）
/// - `spark-switch` 在需要并发安全映射时直接选用 `dashmap`（见其 `Cargo.toml`
///   的 `std` 特性集），这里沿用同样的选择：分片锁的读写吞吐远优于单一
///   `Mutex<HashMap<..>>`，且对外呈现的仍是简单的 `get`/`entry` API。
///
/// # 契约说明（What）
/// - 条目在某个类型键第一次被注册时创建，此后永不因注销而被移除（桶可能变空，
///   但键仍然存在），保证并发读者不需要处理“键忽然消失”的情况。
#[derive(Default)]
pub struct TypeRegistry {
    buckets: DashMap<TypeId, Arc<HandlerBucket>>,
}

impl TypeRegistry {
    pub fn bucket_for(&self, type_id: TypeId) -> Arc<HandlerBucket> {
        self.buckets
            .entry(type_id)
            .or_insert_with(|| Arc::new(HandlerBucket::default()))
            .clone()
    }

    /// 只读地取出一个已存在的桶；不会创建新条目。用于分发路径，分发不应该
    /// 产生从未注册过的桶。
    pub fn existing_bucket(&self, type_id: TypeId) -> Option<Arc<HandlerBucket>> {
        self.buckets.get(&type_id).map(|entry| entry.clone())
    }

    pub fn remove_owner_everywhere(&self, owner: OwnerTag) {
        for entry in self.buckets.iter() {
            entry.value().remove_by_owner(owner);
        }
    }

    /// 关闭引擎时整体清空：所有桶被原子替换为空列表，键本身也被丢弃。
    pub fn clear(&self) {
        self.buckets.clear();
    }

    #[cfg(test)]
    pub fn registered_types(&self) -> Vec<TypeId> {
        self.buckets.iter().map(|e| *e.key()).collect()
    }
}
