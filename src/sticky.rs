use std::any::TypeId;
use std::sync::Arc;

use dashmap::DashMap;

use crate::event::Event;

/// 按具体事件类型保留“最近一次”事件的粘性存储，对应规格 C5。
///
/// # 设计背景（Why）
/// - 规格 §9 的 Open Question 明确指出源实现按“具体类型”存储（不按泛型实参
///   元组区分），这里遵从该结论（见 SPEC_FULL §9 决策记录）；泛型过滤仍在
///   重放时按运行时实参重新评估。
#[derive(Default)]
pub struct StickyStore {
    entries: DashMap<TypeId, Arc<dyn Event>>,
}

impl StickyStore {
    pub fn put(&self, type_id: TypeId, event: Arc<dyn Event>) {
        self.entries.insert(type_id, event);
    }

    pub fn get(&self, type_id: TypeId) -> Option<Arc<dyn Event>> {
        self.entries.get(&type_id).map(|e| e.clone())
    }

    /// 返回所有与 `handler_type` 匹配的存量事件：具体类型相同，或（当
    /// `disallow_subtypes` 为假时）具体类型把 `handler_type` 列为祖先。重放
    /// 因此遵循与实时分发完全相同的类型匹配规则（规格 §4.4）。
    pub fn find_matching(&self, handler_type: TypeId, disallow_subtypes: bool) -> Vec<Arc<dyn Event>> {
        self.entries
            .iter()
            .filter_map(|entry| {
                let event = entry.value().clone();
                let descriptor = event.type_descriptor();
                if descriptor.id == handler_type {
                    Some(event)
                } else if !disallow_subtypes && descriptor.is_or_descends_from(handler_type) {
                    Some(event)
                } else {
                    None
                }
            })
            .collect()
    }

    pub fn remove(&self, type_id: TypeId) {
        self.entries.remove(&type_id);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::TypeDescriptor;
    use std::any::Any;
    use std::borrow::Cow;

    #[derive(Debug)]
    struct Ev(u32);
    impl Event for Ev {
        fn type_descriptor(&self) -> TypeDescriptor {
            TypeDescriptor {
                id: TypeId::of::<Ev>(),
                name: "Ev",
                ancestors: Cow::Borrowed(&[]),
            }
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn keeps_only_latest_per_type() {
        let store = StickyStore::default();
        let id = TypeId::of::<Ev>();
        store.put(id, Arc::new(Ev(1)));
        store.put(id, Arc::new(Ev(2)));
        let latest = store.get(id).unwrap();
        assert_eq!(latest.as_any().downcast_ref::<Ev>().unwrap().0, 2);
    }

    #[derive(Debug)]
    struct Base;
    #[derive(Debug)]
    struct Sub;
    impl Event for Base {
        fn type_descriptor(&self) -> TypeDescriptor {
            TypeDescriptor::leaf::<Base>("Base")
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }
    impl Event for Sub {
        fn type_descriptor(&self) -> TypeDescriptor {
            TypeDescriptor::with_ancestors::<Sub>(
                "Sub",
                crate::event::ancestors_of(vec![TypeId::of::<Base>()]),
            )
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn find_matching_returns_subtype_entries_for_supertype_key() {
        let store = StickyStore::default();
        store.put(TypeId::of::<Sub>(), Arc::new(Sub));
        let found = store.find_matching(TypeId::of::<Base>(), false);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].type_descriptor().id, TypeId::of::<Sub>());
    }

    #[test]
    fn find_matching_excludes_subtypes_when_disallowed() {
        let store = StickyStore::default();
        store.put(TypeId::of::<Sub>(), Arc::new(Sub));
        assert!(store.find_matching(TypeId::of::<Base>(), true).is_empty());
    }

    #[test]
    fn find_matching_always_includes_exact_type() {
        let store = StickyStore::default();
        store.put(TypeId::of::<Base>(), Arc::new(Base));
        assert_eq!(store.find_matching(TypeId::of::<Base>(), true).len(), 1);
    }

    #[test]
    fn remove_and_clear() {
        let store = StickyStore::default();
        let id = TypeId::of::<Ev>();
        store.put(id, Arc::new(Ev(1)));
        store.remove(id);
        assert!(store.get(id).is_none());
        store.put(id, Arc::new(Ev(1)));
        store.clear();
        assert!(store.get(id).is_none());
    }
}
