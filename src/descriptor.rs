use std::any::TypeId;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::EventConfiguration;
use crate::error::{EventBusError, HandlerError};
use crate::event::Event;
use crate::generic::GenericParamSpec;
use crate::resolver::{ArgStrategy, ArgValue, ResolveContext};
use crate::scheduler::BoxFuture;

/// 注册来源的不透明身份，用于按所有者批量撤销描述符（规格 Design Notes：
/// “在每个描述符中存储一个稳定的不透明 `owner_tag`”）。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OwnerTag(u64);

static NEXT_OWNER: AtomicU64 = AtomicU64::new(1);

impl OwnerTag {
    pub fn fresh() -> Self {
        Self(NEXT_OWNER.fetch_add(1, Ordering::Relaxed))
    }
}

static NEXT_SEQ: AtomicU64 = AtomicU64::new(0);

/// 处理器被调用的方式，对应规格 Design Notes 的“多态处理器族”建议：用一个
/// 标签加一份描述符取代类继承体系。
pub enum InvokeKind {
    /// 非挂起处理器：同步调用，立即返回。
    Plain(Arc<dyn Fn(&dyn Event, &[ArgValue]) -> Result<(), HandlerError> + Send + Sync>),
    /// 挂起处理器：同步 `dispatch` 下以“发后即忘”方式启动，`dispatch_await` 下按序等待。
    Suspending(
        Arc<
            dyn Fn(&dyn Event, &[ArgValue], bool) -> BoxFuture<'static, Result<(), HandlerError>>
                + Send
                + Sync,
        >,
    ),
}

impl InvokeKind {
    pub fn suspends(&self) -> bool {
        matches!(self, InvokeKind::Suspending(_))
    }
}

/// 一次注册产生的不可变处理器描述符，对应规格 C3。
///
/// # 设计背景（Why）
/// - 规格明确描述符由核心范围之外的适配器（反射、代码生成或手写）构造；核心只做
///   最小校验并在分发时消费它。字段划分直接取自规格 §3。
pub struct HandlerDescriptor {
    pub event_type: TypeId,
    pub event_type_name: &'static str,
    pub configuration: EventConfiguration,
    pub handler_id: Arc<str>,
    pub generic_spec: Option<Vec<GenericParamSpec>>,
    pub invoke_kind: InvokeKind,
    pub arg_strategies: Vec<Arc<dyn ArgStrategy>>,
    pub owner: OwnerTag,
    pub(crate) seq: u64,
}

impl HandlerDescriptor {
    pub fn builder(event_type: TypeId, event_type_name: &'static str, handler_id: impl Into<Arc<str>>) -> HandlerDescriptorBuilder {
        HandlerDescriptorBuilder {
            event_type,
            event_type_name,
            handler_id: handler_id.into(),
            configuration: EventConfiguration::default(),
            generic_spec: None,
            invoke_kind: None,
            arg_strategies: Vec::new(),
            owner: OwnerTag::fresh(),
        }
    }

    pub fn suspends(&self) -> bool {
        self.invoke_kind.suspends()
    }

    pub(crate) fn resolve_args(&self, ctx: &ResolveContext<'_>) -> Vec<ArgValue> {
        crate::resolver::resolve_all(&self.arg_strategies, ctx)
    }
}

/// 构造 [`HandlerDescriptor`] 的构建器，供外部适配器使用。
pub struct HandlerDescriptorBuilder {
    event_type: TypeId,
    event_type_name: &'static str,
    handler_id: Arc<str>,
    configuration: EventConfiguration,
    generic_spec: Option<Vec<GenericParamSpec>>,
    invoke_kind: Option<InvokeKind>,
    arg_strategies: Vec<Arc<dyn ArgStrategy>>,
    owner: OwnerTag,
}

impl HandlerDescriptorBuilder {
    pub fn configuration(mut self, configuration: EventConfiguration) -> Self {
        self.configuration = configuration;
        self
    }

    pub fn generic_spec(mut self, spec: Vec<GenericParamSpec>) -> Self {
        self.generic_spec = Some(spec);
        self
    }

    pub fn plain(
        mut self,
        f: impl Fn(&dyn Event, &[ArgValue]) -> Result<(), HandlerError> + Send + Sync + 'static,
    ) -> Self {
        self.invoke_kind = Some(InvokeKind::Plain(Arc::new(f)));
        self
    }

    pub fn suspending(
        mut self,
        f: impl Fn(&dyn Event, &[ArgValue], bool) -> BoxFuture<'static, Result<(), HandlerError>>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.invoke_kind = Some(InvokeKind::Suspending(Arc::new(f)));
        self
    }

    pub fn arg_strategy(mut self, strategy: Arc<dyn ArgStrategy>) -> Self {
        self.arg_strategies.push(strategy);
        self
    }

    pub fn owner(mut self, owner: OwnerTag) -> Self {
        self.owner = owner;
        self
    }

    pub fn build(self) -> Result<HandlerDescriptor, EventBusError> {
        if self.handler_id.is_empty() {
            return Err(EventBusError::InvalidDescriptor {
                reason: "handler_id must not be empty",
            });
        }
        let invoke_kind = self.invoke_kind.ok_or(EventBusError::InvalidDescriptor {
            reason: "descriptor must provide an invocation closure",
        })?;
        Ok(HandlerDescriptor {
            event_type: self.event_type,
            event_type_name: self.event_type_name,
            configuration: self.configuration,
            handler_id: self.handler_id,
            generic_spec: self.generic_spec,
            invoke_kind,
            arg_strategies: self.arg_strategies,
            owner: self.owner,
            seq: NEXT_SEQ.fetch_add(1, Ordering::Relaxed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_handler_id() {
        let result = HandlerDescriptor::builder(TypeId::of::<()>(), "unit", "")
            .plain(|_, _| Ok(()))
            .build();
        assert!(matches!(
            result,
            Err(EventBusError::InvalidDescriptor { .. })
        ));
    }

    #[test]
    fn rejects_missing_invocation() {
        let result = HandlerDescriptor::builder(TypeId::of::<()>(), "unit", "h1").build();
        assert!(matches!(
            result,
            Err(EventBusError::InvalidDescriptor { .. })
        ));
    }

    #[test]
    fn successive_builds_get_increasing_sequence_numbers() {
        let a = HandlerDescriptor::builder(TypeId::of::<()>(), "unit", "h1")
            .plain(|_, _| Ok(()))
            .build()
            .unwrap();
        let b = HandlerDescriptor::builder(TypeId::of::<()>(), "unit", "h2")
            .plain(|_, _| Ok(()))
            .build()
            .unwrap();
        assert!(b.seq > a.seq);
    }
}
