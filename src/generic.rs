use crate::event::TypeDescriptor;

/// 运行时泛型实参的方差约束，对应规格 §4.5。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Variance {
    Invariant,
    Covariant,
    Contravariant,
    Unconstrained,
}

/// 处理器对事件单个泛型位的声明：方差 + 可选的绑定类型。
///
/// `bound` 为 `None` 仅在 `Unconstrained` 下有意义（通配符不需要绑定）。
#[derive(Clone, Debug)]
pub struct GenericParamSpec {
    pub variance: Variance,
    pub bound: Option<TypeDescriptor>,
}

impl GenericParamSpec {
    pub fn unconstrained() -> Self {
        Self {
            variance: Variance::Unconstrained,
            bound: None,
        }
    }

    pub fn invariant(bound: TypeDescriptor) -> Self {
        Self {
            variance: Variance::Invariant,
            bound: Some(bound),
        }
    }

    pub fn covariant(bound: TypeDescriptor) -> Self {
        Self {
            variance: Variance::Covariant,
            bound: Some(bound),
        }
    }

    pub fn contravariant(bound: TypeDescriptor) -> Self {
        Self {
            variance: Variance::Contravariant,
            bound: Some(bound),
        }
    }

    /// 单个位置的接受判定，见规格 §4.5。
    ///
    /// Rust 没有运行时类层级，因此协变/逆变均通过 [`TypeDescriptor::ancestors`]
    /// 这一由事件/绑定类型作者显式声明的祖先集合来近似：
    /// - 协变接受“运行时类型就是绑定类型，或运行时类型的祖先里有绑定类型”（运行时类型
    ///   是绑定类型的子类型）。
    /// - 逆变接受“运行时类型就是绑定类型，或绑定类型的祖先里有运行时类型”（绑定类型是
    ///   运行时类型的子类型，即运行时类型是绑定类型的父类型）。
    fn accepts(&self, runtime: &TypeDescriptor) -> bool {
        match self.variance {
            Variance::Unconstrained => true,
            Variance::Invariant => {
                self.bound.as_ref().is_some_and(|bound| bound.id == runtime.id)
            }
            Variance::Covariant => self.bound.as_ref().is_some_and(|bound| {
                bound.id == runtime.id || runtime.is_or_descends_from(bound.id)
            }),
            Variance::Contravariant => self.bound.as_ref().is_some_and(|bound| {
                bound.id == runtime.id || bound.is_or_descends_from(runtime.id)
            }),
        }
    }
}

/// 对整个泛型实参列表按位置比较，要求先验证长度相等（规格：“若泛型元数不匹配，拒绝”）。
pub fn matches(spec: &[GenericParamSpec], runtime_args: &[TypeDescriptor]) -> bool {
    if spec.len() != runtime_args.len() {
        return false;
    }
    spec.iter()
        .zip(runtime_args.iter())
        .all(|(s, r)| s.accepts(r))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::TypeId;
    use std::borrow::Cow;

    fn leaf<T: 'static>(name: &'static str) -> TypeDescriptor {
        TypeDescriptor {
            id: TypeId::of::<T>(),
            name,
            ancestors: Cow::Borrowed(&[]),
        }
    }

    #[test]
    fn invariant_requires_exact_match() {
        let string_desc = leaf::<String>("String");
        let int_desc = leaf::<i64>("i64");
        let spec = GenericParamSpec::invariant(string_desc.clone());
        assert!(matches(&[spec.clone()], &[string_desc.clone()]));
        assert!(!matches(&[spec], &[int_desc]));
    }

    #[test]
    fn unconstrained_accepts_anything() {
        let spec = GenericParamSpec::unconstrained();
        assert!(matches(&[spec], &[leaf::<i64>("i64")]));
    }

    #[test]
    fn arity_mismatch_rejects() {
        let spec = GenericParamSpec::unconstrained();
        assert!(!matches(&[spec], &[]));
    }

    #[test]
    fn covariant_accepts_subtype() {
        struct Base;
        struct Sub;
        let base = leaf::<Base>("Base");
        let sub = TypeDescriptor {
            id: TypeId::of::<Sub>(),
            name: "Sub",
            ancestors: Cow::Owned(vec![TypeId::of::<Base>()]),
        };
        let spec = GenericParamSpec::covariant(base);
        assert!(matches(&[spec.clone()], &[sub]));
        assert!(!matches(&[spec], &[leaf::<i64>("i64")]));
    }

    #[test]
    fn contravariant_accepts_supertype() {
        struct Base;
        struct Sub;
        let base = leaf::<Base>("Base");
        let sub = TypeDescriptor {
            id: TypeId::of::<Sub>(),
            name: "Sub",
            ancestors: Cow::Owned(vec![TypeId::of::<Base>()]),
        };
        // bound = Sub, runtime = Base: Base is a supertype of Sub, so contravariant accepts.
        let spec = GenericParamSpec::contravariant(sub);
        assert!(matches(&[spec], &[base]));
    }
}
