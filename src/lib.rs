#![allow(clippy::result_large_err)]
#![doc = "eventcore: 进程内、类型安全的事件总线分发引擎。"]
#![doc = ""]
#![doc = "== 范围 (Scope) =="]
#![doc = "本 crate 只实现分发核心：类型注册表、处理器桶、独占执行门闩、粘性事件缓存与"]
#![doc = "重放、两种分发模式（发后即忘 / 协作式等待）、以及生命周期受限的注册作用域。"]
#![doc = "反射/注解扫描、参数依赖注入的具体实现、跨进程传输均被视为核心之外的协作方，"]
#![doc = "通过 [`SourceAdapter`]、[`resolver::ArgStrategy`] 等窄接口与核心交互。"]

pub mod bucket;
pub mod config;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod event;
pub mod gate;
pub mod generic;
pub mod registry;
pub mod resolver;
pub mod scheduler;
pub mod scope;
pub mod sticky;

pub use config::{ConfigValue, EventConfiguration, EventConfigurationBuilder};
pub use descriptor::{HandlerDescriptor, HandlerDescriptorBuilder, InvokeKind, OwnerTag};
pub use engine::{
    DispatchOptions, Engine, EngineComponents, EngineComponentsBuilder, RegistrationToken,
    SourceAdapter, SourceRegistration,
};
pub use error::{ErrorSink, EventBusError, HandlerError, NoopErrorSink, RecordingErrorSink, TracingErrorSink};
pub use event::{ancestors_of, DeadEvent, Event, TypeDescriptor};
pub use generic::{GenericParamSpec, Variance};
pub use resolver::{
    ArgStrategy, ArgValue, ConfigurationArg, ExternalResolver, IsWaitingArg, ResolveContext,
    UserResolvedArg,
};
pub use scheduler::{BoxFuture, InlineScheduler, Scheduler, TokioScheduler};
pub use scope::Scope;
