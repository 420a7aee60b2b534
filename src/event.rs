use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::fmt;

/// 事件的运行时类型描述符。
///
/// # 设计背景（Why）
/// - Rust 在编译期擦除泛型、也没有 JVM 式的运行时类层级，而分发引擎需要在运行时判断
///   “事件 A 是否被某个标记接口/父类型覆盖”。`spark_core` 的契约设计一贯偏好让调用方
///   显式声明它能提供的不变量（参见 `spark_core::configuration::value::ConfigValue` 对
///   元数据的显式建模），而不是依赖反射猜测；这里同样让事件的作者显式列出祖先类型。
///
/// # 契约说明（What）
/// - `id`：事件具体类型的 [`TypeId`]，是类型注册表与粘性存储的主键。
/// - `name`：人类可读的类型名，仅用于日志与诊断，不参与匹配逻辑。
/// - `ancestors`：该具体类型所“实现”的标记接口（类型分类）集合，用于父类型匹配
///   （见分发算法 §4.7.2）。不需要包含 `id` 本身。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub id: TypeId,
    pub name: &'static str,
    pub ancestors: Cow<'static, [TypeId]>,
}

impl TypeDescriptor {
    /// 构造一个没有祖先类型（不属于任何标记接口）的描述符。
    pub fn leaf<T: 'static>(name: &'static str) -> Self {
        Self {
            id: TypeId::of::<T>(),
            name,
            ancestors: Cow::Borrowed(&[]),
        }
    }

    /// 构造一个带有祖先类型列表的描述符。
    pub fn with_ancestors<T: 'static>(
        name: &'static str,
        ancestors: impl Into<Cow<'static, [TypeId]>>,
    ) -> Self {
        Self {
            id: TypeId::of::<T>(),
            name,
            ancestors: ancestors.into(),
        }
    }

    /// `other` 是否是 `self` 所声明的祖先之一（或就是 `self` 本身）。
    pub fn is_or_descends_from(&self, other: TypeId) -> bool {
        self.id == other || self.ancestors.iter().any(|&a| a == other)
    }
}

/// 所有可分发事件的统一契约。
///
/// # 设计背景（Why）
/// - 对应规格中的“Event”数据模型：一个不透明的具体类型 `T` 的值对象，引擎只通过
///   [`TypeDescriptor`] 与其做类型比较，从不关心其字段内容。
/// - “类型分类”（标记接口）与“带泛型参数的事件”都不是 Rust 原生可反射的概念，因此
///   本契约要求事件作者显式提供这两类运行时信息，分别对应 [`Event::type_descriptor`]
///   与 [`Event::generic_args`]。
///
/// # 契约说明（What）
/// - `type_descriptor`：返回该事件实例的具体类型描述符（通常是编译期常量，可以是
///   `'static` 引用构造的值）。
/// - `generic_args`：事件若携带运行时可观察的泛型实参（例如 `Envelope<T>` 中的 `T`），
///   按声明顺序返回；非泛型事件留空切片。
/// - `as_any`：用于分发引擎在构造具体回调参数前做类型下转换。
pub trait Event: Any + Send + Sync + fmt::Debug {
    fn type_descriptor(&self) -> TypeDescriptor;

    fn generic_args(&self) -> &[TypeDescriptor] {
        &[]
    }

    fn as_any(&self) -> &dyn Any;
}

impl dyn Event {
    /// 尝试将事件下转换为具体类型 `T` 的引用。
    pub fn downcast_ref<T: Event>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

/// 事件失配时引擎合成的兜底事件，包裹原始事件。
///
/// # 契约说明（What）
/// - 仅当一次分发没有任何非 `silent` 的处理器完成调用、且原始事件本身不是
///   `DeadEvent`、且死事件特性已启用时才会被合成（见 §4.7.2 第 3 步）。
/// - `DeadEvent` 自身没有祖先类型：它的分发失败不会递归地再产生一个 `DeadEvent`
///   （规格 §8 属性 3）。
pub struct DeadEvent {
    original: std::sync::Arc<dyn Event>,
    original_descriptor: TypeDescriptor,
}

impl DeadEvent {
    pub fn new(original: std::sync::Arc<dyn Event>) -> Self {
        let original_descriptor = original.type_descriptor();
        Self {
            original,
            original_descriptor,
        }
    }

    pub fn original(&self) -> &dyn Event {
        self.original.as_ref()
    }

    pub fn original_type(&self) -> &TypeDescriptor {
        &self.original_descriptor
    }

    pub fn into_original(self) -> std::sync::Arc<dyn Event> {
        self.original
    }
}

impl fmt::Debug for DeadEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeadEvent")
            .field("original_type", &self.original_descriptor.name)
            .finish()
    }
}

impl Event for DeadEvent {
    fn type_descriptor(&self) -> TypeDescriptor {
        TypeDescriptor::leaf::<DeadEvent>("DeadEvent")
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// 方便用户在不引入 `Cow` 样板的情况下声明祖先类型列表。
pub fn ancestors_of(ids: Vec<TypeId>) -> Cow<'static, [TypeId]> {
    Cow::Owned(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

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
            TypeDescriptor::with_ancestors::<Sub>("Sub", ancestors_of(vec![TypeId::of::<Base>()]))
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn sub_descends_from_base() {
        let sub = Sub;
        let desc = sub.type_descriptor();
        assert!(desc.is_or_descends_from(TypeId::of::<Base>()));
        assert!(desc.is_or_descends_from(TypeId::of::<Sub>()));
    }

    #[test]
    fn dead_event_has_no_ancestors() {
        let dead = DeadEvent::new(std::sync::Arc::new(Base));
        assert!(dead.type_descriptor().ancestors.is_empty());
        assert_eq!(dead.original_type().name, "Base");
    }
}
