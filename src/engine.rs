use std::any::TypeId;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::FutureExt;

use crate::bucket::HandlerBucket;
use crate::descriptor::{HandlerDescriptor, InvokeKind, OwnerTag};
use crate::error::{ErrorSink, EventBusError, HandlerError, TracingErrorSink};
use crate::event::{DeadEvent, Event, TypeDescriptor};
use crate::gate::ExclusiveGate;
use crate::registry::TypeRegistry;
use crate::resolver::{ArgValue, ResolveContext};
use crate::scheduler::{BoxFuture, InlineScheduler, Scheduler};
use crate::sticky::StickyStore;

/// 一次 `dispatch`/`dispatch_await` 调用的可选项，对应规格 §6。
#[derive(Clone, Copy, Debug)]
pub struct DispatchOptions {
    pub sticky: bool,
    pub dead_event: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            sticky: false,
            dead_event: true,
        }
    }
}

/// 引擎装配所需的可插拔组件，对应规格 §6 `Engine::new(components)`。
pub struct EngineComponents {
    pub error_sink: Arc<dyn ErrorSink>,
    pub scheduler: Arc<dyn Scheduler>,
    pub dead_event_enabled: bool,
    pub sticky_enabled: bool,
}

impl Default for EngineComponents {
    fn default() -> Self {
        Self {
            error_sink: Arc::new(TracingErrorSink),
            scheduler: Arc::new(InlineScheduler::default()),
            dead_event_enabled: true,
            sticky_enabled: true,
        }
    }
}

/// 构造 [`EngineComponents`] 的构建器，省去调用方手写结构体字面量的样板。
pub struct EngineComponentsBuilder {
    inner: EngineComponents,
}

impl Default for EngineComponentsBuilder {
    fn default() -> Self {
        Self {
            inner: EngineComponents::default(),
        }
    }
}

impl EngineComponentsBuilder {
    pub fn error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.inner.error_sink = sink;
        self
    }

    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.inner.scheduler = scheduler;
        self
    }

    pub fn dead_event_enabled(mut self, enabled: bool) -> Self {
        self.inner.dead_event_enabled = enabled;
        self
    }

    pub fn sticky_enabled(mut self, enabled: bool) -> Self {
        self.inner.sticky_enabled = enabled;
        self
    }

    pub fn build(self) -> EngineComponents {
        self.inner
    }
}

struct EngineInner {
    registry: TypeRegistry,
    sticky: StickyStore,
    gate: ExclusiveGate,
    open: AtomicBool,
    components: EngineComponents,
}

/// 分发引擎，对应规格 C7 及整体 §4.7/§4.9/§5 的状态机与并发契约。
///
/// # 设计背景（Why）
/// - `Engine` 本身只是一个指向 [`EngineInner`] 的 `Arc` 句柄：克隆成本是一次原子
///   引用计数递增，便于在注册令牌、调度任务闭包之间自由传递。
#[derive(Clone)]
pub struct Engine(Arc<EngineInner>);

/// 一次注册产生的撤销凭证，对应规格 §6 `token.unregister()`。
#[derive(Clone)]
pub struct RegistrationToken {
    engine: Engine,
    event_type: TypeId,
    handler_id: Arc<str>,
}

impl RegistrationToken {
    /// 撤销本次注册对应的处理器描述符。
    pub fn unregister(&self) -> Result<(), EventBusError> {
        self.engine.ensure_open()?;
        if let Some(bucket) = self.engine.0.registry.existing_bucket(self.event_type) {
            bucket.remove_by_handler_id(&self.handler_id);
        }
        Ok(())
    }
}

/// 由外部适配器实现：把一个来源对象（带注解的类、手写结构体等）展开为一组
/// [`HandlerDescriptor`]。核心对它的内部逻辑一无所知，只负责调用并持有返回的
/// 描述符（规格 §1：反射/注解扫描被视为核心所消费的外部协作方）。
pub trait SourceAdapter: Send + Sync {
    fn build_descriptors(&self, owner: OwnerTag) -> Vec<HandlerDescriptor>;
}

/// `register_source`/`unregister_source` 返回的批量句柄。
pub struct SourceRegistration {
    pub owner: OwnerTag,
    pub tokens: Vec<RegistrationToken>,
}

/// 一次处理器调用的结果：同步完成是否应计入"已处理"，或已转入后台任务。
enum Invocation {
    Done(bool),
    Spawned,
}

impl Engine {
    pub fn new(components: EngineComponents) -> Self {
        Self(Arc::new(EngineInner {
            registry: TypeRegistry::default(),
            sticky: StickyStore::default(),
            gate: ExclusiveGate::default(),
            open: AtomicBool::new(true),
            components,
        }))
    }

    pub fn builder() -> EngineComponentsBuilder {
        EngineComponentsBuilder::default()
    }

    fn ensure_open(&self) -> Result<(), EventBusError> {
        if self.0.open.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(EventBusError::EngineClosed)
        }
    }

    fn try_acquire_gate(&self, handler_id: &Arc<str>) -> bool {
        self.0.gate.try_acquire(handler_id)
    }

    fn release_gate(&self, handler_id: &Arc<str>) {
        self.0.gate.release(handler_id);
    }

    /// 注册一个处理器描述符，若命中粘性重放条件会在返回前同步重放一次。
    pub fn register(&self, descriptor: HandlerDescriptor) -> Result<RegistrationToken, EventBusError> {
        self.ensure_open()?;
        let event_type = descriptor.event_type;
        let handler_id = descriptor.handler_id.clone();
        let bucket = self.0.registry.bucket_for(event_type);
        let descriptor = Arc::new(descriptor);
        bucket.insert(descriptor.clone());
        tracing::debug!(handler.id = %handler_id, event.type = descriptor.event_type_name, "handler registered");

        if self.0.components.sticky_enabled && !descriptor.configuration.ignore_sticky() {
            let matches = self
                .0
                .sticky
                .find_matching(event_type, descriptor.configuration.disallow_subtypes());
            for sticky_event in matches {
                self.replay_one(&descriptor, sticky_event);
            }
        }

        Ok(RegistrationToken {
            engine: self.clone(),
            event_type,
            handler_id,
        })
    }

    /// 将一个来源对象展开的全部描述符注册进引擎，返回可用于整体撤销的句柄。
    pub fn register_source(&self, source: &dyn SourceAdapter) -> Result<SourceRegistration, EventBusError> {
        self.ensure_open()?;
        let owner = OwnerTag::fresh();
        let mut tokens = Vec::new();
        for descriptor in source.build_descriptors(owner) {
            tokens.push(self.register(descriptor)?);
        }
        Ok(SourceRegistration { owner, tokens })
    }

    pub fn unregister_source(&self, registration: &SourceRegistration) -> Result<(), EventBusError> {
        self.ensure_open()?;
        self.0.registry.remove_owner_everywhere(registration.owner);
        Ok(())
    }

    pub fn unregister_owner(&self, owner: OwnerTag) -> Result<(), EventBusError> {
        self.ensure_open()?;
        self.0.registry.remove_owner_everywhere(owner);
        Ok(())
    }

    pub fn clear_sticky(&self) {
        self.0.sticky.clear();
    }

    pub fn remove_sticky(&self, event_type: TypeId) {
        self.0.sticky.remove(event_type);
    }

    /// 关闭引擎。幂等失败：第二次调用返回 [`EventBusError::EngineClosed`]。
    pub fn close(&self) -> Result<(), EventBusError> {
        if self
            .0
            .open
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(EventBusError::EngineClosed);
        }
        self.0.registry.clear();
        self.0.sticky.clear();
        self.0.gate.prune();
        self.0.components.scheduler.shutdown();
        tracing::info!("event bus engine closed");
        Ok(())
    }

    /// 非阻塞分发：挂起式处理器以发后即忘方式启动，调用在所有非挂起处理器
    /// 执行完毕后返回（规格 §4.7.1）。
    pub fn dispatch<E: Event + 'static>(
        &self,
        event: E,
        opts: DispatchOptions,
    ) -> Result<bool, EventBusError> {
        self.dispatch_dyn(Arc::new(event), opts)
    }

    /// 协作式分发：按优先级顺序依次等待每个挂起处理器完成（规格 §4.7.1）。
    pub async fn dispatch_await<E: Event + 'static>(
        &self,
        event: E,
        opts: DispatchOptions,
    ) -> Result<bool, EventBusError> {
        self.dispatch_await_dyn(Arc::new(event), opts).await
    }

    fn candidate_buckets(&self, descriptor: &TypeDescriptor) -> Vec<(Arc<HandlerBucket>, bool)> {
        let mut out = Vec::new();
        if let Some(bucket) = self.0.registry.existing_bucket(descriptor.id) {
            out.push((bucket, true));
        }
        for &ancestor in descriptor.ancestors.iter() {
            if let Some(bucket) = self.0.registry.existing_bucket(ancestor) {
                out.push((bucket, false));
            }
        }
        out
    }

    fn route_outcome(
        &self,
        outcome: std::thread::Result<Result<(), HandlerError>>,
        handler_id: &Arc<str>,
        event_name: &'static str,
    ) {
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => self.0.components.error_sink.handle(handler_id, event_name, err),
            Err(panic) => self
                .0
                .components
                .error_sink
                .handle(handler_id, event_name, panic_message(panic)),
        }
    }

    fn spawn_suspending(
        &self,
        f: Arc<dyn Fn(&dyn Event, &[ArgValue], bool) -> BoxFuture<'static, Result<(), HandlerError>> + Send + Sync>,
        event: Arc<dyn Event>,
        args: Vec<ArgValue>,
        handler_id: Arc<str>,
        event_name: &'static str,
        gate_acquired: bool,
    ) {
        let error_sink = self.0.components.error_sink.clone();
        let engine = self.clone();
        self.0.components.scheduler.spawn(Box::pin(async move {
            let outcome = AssertUnwindSafe(f(event.as_ref(), &args, false))
                .catch_unwind()
                .await;
            if gate_acquired {
                engine.release_gate(&handler_id);
            }
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(err)) => error_sink.handle(&handler_id, event_name, err),
                Err(panic) => error_sink.handle(&handler_id, event_name, panic_message(panic)),
            }
        }));
    }

    /// 粘性重放：仅对单个新注册的描述符回放一次存量事件，不计入死事件统计
    /// （规格 §4.4："重放绝不会触发 DeadEvent"）。重放套用与实时分发完全相同的
    /// 子类型/泛型匹配规则（规格 §4.4），而不是要求具体类型完全一致——`self.0.sticky
    /// .find_matching` 已经按该规则筛过一遍，这里重复校验一次以便 `replay_one`
    /// 在被直接调用时（例如未来的单测）也不会绕过匹配规则。
    fn replay_one(&self, d: &Arc<HandlerDescriptor>, event: Arc<dyn Event>) {
        let event_descriptor = event.type_descriptor();
        let exact = event_descriptor.id == d.event_type;
        if !exact {
            if d.configuration.disallow_subtypes() {
                return;
            }
            if !event_descriptor.is_or_descends_from(d.event_type) {
                return;
            }
        }
        if exact && !event.generic_args().is_empty() {
            if let Some(spec) = &d.generic_spec {
                if !crate::generic::matches(spec, event.generic_args()) {
                    return;
                }
            }
        }
        let _ = self.invoke_one(d, &event, event_descriptor.name);
    }

    fn invoke_one(
        &self,
        d: &Arc<HandlerDescriptor>,
        event: &Arc<dyn Event>,
        event_name: &'static str,
    ) -> Invocation {
        let mut acquired = false;
        if d.configuration.exclusive() {
            if !self.try_acquire_gate(&d.handler_id) {
                return Invocation::Done(false);
            }
            acquired = true;
        }

        let ctx = ResolveContext {
            event: event.as_ref(),
            is_waiting: false,
            configuration: &d.configuration,
        };
        let args = d.resolve_args(&ctx);

        match &d.invoke_kind {
            InvokeKind::Plain(f) => {
                let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| f(event.as_ref(), &args)));
                if acquired {
                    self.release_gate(&d.handler_id);
                }
                self.route_outcome(outcome, &d.handler_id, event_name);
                Invocation::Done(true)
            }
            InvokeKind::Suspending(f) => {
                self.spawn_suspending(f.clone(), event.clone(), args, d.handler_id.clone(), event_name, acquired);
                Invocation::Spawned
            }
        }
    }

    fn dispatch_dyn(&self, event: Arc<dyn Event>, opts: DispatchOptions) -> Result<bool, EventBusError> {
        self.ensure_open()?;
        let descriptor = event.type_descriptor();
        let mut handled = false;

        for (bucket, exact) in self.candidate_buckets(&descriptor) {
            let snapshot = bucket.snapshot();
            for d in snapshot.iter() {
                if d.configuration.disallow_subtypes() && !exact {
                    continue;
                }
                if exact && !event.generic_args().is_empty() {
                    if let Some(spec) = &d.generic_spec {
                        if !crate::generic::matches(spec, event.generic_args()) {
                            continue;
                        }
                    }
                }

                // 挂起处理器在同步路径下即启即记：按 SPEC_FULL §9 的决策，发后即忘
                // 的任务一经启动就计入"已处理"，不等待其完成。
                let invocation = self.invoke_one(d, &event, descriptor.name);
                let counted = matches!(invocation, Invocation::Done(true) | Invocation::Spawned);
                if counted && !d.configuration.silent() {
                    handled = true;
                }
            }
        }

        if opts.sticky && self.0.components.sticky_enabled {
            self.0.sticky.put(descriptor.id, event.clone());
        }

        if !handled
            && descriptor.id != TypeId::of::<DeadEvent>()
            && self.0.components.dead_event_enabled
            && opts.dead_event
        {
            tracing::trace!(event.type = descriptor.name, "synthesizing dead event");
            let dead = DeadEvent::new(event.clone());
            self.dispatch_dyn(Arc::new(dead), opts)?;
        }

        Ok(handled)
    }

    fn dispatch_await_dyn(
        &self,
        event: Arc<dyn Event>,
        opts: DispatchOptions,
    ) -> BoxFuture<'_, Result<bool, EventBusError>> {
        Box::pin(async move {
            self.ensure_open()?;
            let descriptor = event.type_descriptor();
            let mut handled = false;

            for (bucket, exact) in self.candidate_buckets(&descriptor) {
                let snapshot = bucket.snapshot();
                for d in snapshot.iter() {
                    if d.configuration.disallow_subtypes() && !exact {
                        continue;
                    }
                    if exact && !event.generic_args().is_empty() {
                        if let Some(spec) = &d.generic_spec {
                            if !crate::generic::matches(spec, event.generic_args()) {
                                continue;
                            }
                        }
                    }

                    let mut acquired = false;
                    if d.configuration.exclusive() {
                        if !self.try_acquire_gate(&d.handler_id) {
                            continue;
                        }
                        acquired = true;
                    }

                    let ctx = ResolveContext {
                        event: event.as_ref(),
                        is_waiting: d.suspends(),
                        configuration: &d.configuration,
                    };
                    let args = d.resolve_args(&ctx);

                    match &d.invoke_kind {
                        InvokeKind::Plain(f) => {
                            let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
                                f(event.as_ref(), &args)
                            }));
                            if acquired {
                                self.release_gate(&d.handler_id);
                            }
                            self.route_outcome(outcome, &d.handler_id, descriptor.name);
                        }
                        InvokeKind::Suspending(f) => {
                            // 协作式路径下就地等待每一个挂起处理器，而不是发后即忘。
                            let outcome = AssertUnwindSafe(f(event.as_ref(), &args, true))
                                .catch_unwind()
                                .await;
                            if acquired {
                                self.release_gate(&d.handler_id);
                            }
                            self.route_outcome(outcome, &d.handler_id, descriptor.name);
                        }
                    }

                    if !d.configuration.silent() {
                        handled = true;
                    }
                }
            }

            if opts.sticky && self.0.components.sticky_enabled {
                self.0.sticky.put(descriptor.id, event.clone());
            }

            if !handled
                && descriptor.id != TypeId::of::<DeadEvent>()
                && self.0.components.dead_event_enabled
                && opts.dead_event
            {
                let dead = DeadEvent::new(event.clone());
                self.dispatch_await_dyn(Arc::new(dead), opts).await?;
            }

            Ok(handled)
        })
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> HandlerError {
    let message = if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    };
    message.into()
}
