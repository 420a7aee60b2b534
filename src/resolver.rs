use std::any::Any;
use std::sync::Arc;

use crate::config::EventConfiguration;
use crate::event::Event;

/// 一次调用中产出的预解析参数值。核心引擎从不检查其具体类型，只负责按顺序
/// 收集并转交给 [`crate::descriptor::InvokeKind`] 关联的回调（规格 §3：“调用时
/// 接收一组已解析好的参数值”，解析逻辑本身在核心范围外）。
pub type ArgValue = Arc<dyn Any + Send + Sync>;

/// 一次调用时可见的解析上下文。
pub struct ResolveContext<'a> {
    pub event: &'a dyn Event,
    pub is_waiting: bool,
    pub configuration: &'a EventConfiguration,
}

/// 单个参数的生成策略，对应规格 C10。
///
/// # 设计背景（Why）
/// - 规格明确将“参数注入”列为核心之外的协作方：核心只调用一个 trait，不关心参数
///   究竟如何产生。借鉴 `spark_core::service::Service` 将协议细节完全交给实现方
///   的做法，这里把“产生一个参数值”抽成最小接口，方便反射/代码生成/手写三种
///   适配器分别实现。
pub trait ArgStrategy: Send + Sync {
    fn resolve(&self, ctx: &ResolveContext<'_>) -> ArgValue;
}

/// 内置策略：注入 `is_waiting` 标志（`bool`）。
pub struct IsWaitingArg;

impl ArgStrategy for IsWaitingArg {
    fn resolve(&self, ctx: &ResolveContext<'_>) -> ArgValue {
        Arc::new(ctx.is_waiting)
    }
}

/// 内置策略：注入处理器自身的配置快照。
pub struct ConfigurationArg;

impl ArgStrategy for ConfigurationArg {
    fn resolve(&self, ctx: &ResolveContext<'_>) -> ArgValue {
        Arc::new(ctx.configuration.clone())
    }
}

/// 外部解析器契约：允许宿主（反射层、DI 容器等）按键提供任意值。
///
/// 核心引擎只在 [`UserResolvedArg`] 策略命中时调用它；找不到值时核心不会失败，
/// 由策略自行决定兜底（见 `UserResolvedArg::resolve` 的 `unwrap_or_else`）。
pub trait ExternalResolver: Send + Sync {
    fn resolve(&self, key: &str, event: &dyn Event) -> Option<ArgValue>;
}

/// 委托给宿主提供的 [`ExternalResolver`] 的策略。
pub struct UserResolvedArg {
    pub key: String,
    pub resolver: Arc<dyn ExternalResolver>,
}

impl ArgStrategy for UserResolvedArg {
    fn resolve(&self, ctx: &ResolveContext<'_>) -> ArgValue {
        self.resolver
            .resolve(&self.key, ctx.event)
            .unwrap_or_else(|| Arc::new(()))
    }
}

/// 按顺序对一组策略求值，产出调用参数列表。
pub fn resolve_all(strategies: &[Arc<dyn ArgStrategy>], ctx: &ResolveContext<'_>) -> Vec<ArgValue> {
    strategies.iter().map(|s| s.resolve(ctx)).collect()
}
