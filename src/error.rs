use std::fmt;
use std::sync::Arc;

/// 分发引擎对外暴露的错误域。
///
/// # 设计背景（Why）
/// - 对应规格 §7：`EngineClosed`、`InvalidDescriptor`、`NoSuchRegistration` 三类错误
///   必须可被调用方以结构化方式识别，而不是靠解析字符串。`spark_core::error::SparkError`
///   采用“稳定错误码 + 人类可读信息”的组合，这里改用更符合 Rust 生态习惯的
///   `thiserror` 派生枚举，但保留同样的“每个错误域都有一个固定、可匹配的标识”理念。
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    /// 在已关闭的引擎上调用公开操作，或对引擎/Scope 进行第二次 `close()`。
    #[error("event bus engine is closed")]
    EngineClosed,

    /// 描述符缺少必填字段（`handler_id` 为空，或事件类型信息不完整）。
    #[error("invalid handler descriptor: {reason}")]
    InvalidDescriptor { reason: &'static str },

    /// 尝试撤销一个未知的注册（按设计可被调用方忽略，仅在需要严格模式时使用）。
    #[error("no such registration for owner")]
    NoSuchRegistration,
}

pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// 处理器（或错误汇）自身抛出异常时的落地终点。
///
/// # 契约说明（What）
/// - 处理器内部的错误永远不会传播给 `dispatch`/`dispatch_await` 的调用方，而是路由到
///   这里（§4.9）。
/// - 错误汇自身失败不可再向上传播；实现方应在 `handle` 内部吞掉二次失败（例如记录到
///   进程内日志）。
pub trait ErrorSink: Send + Sync {
    fn handle(&self, handler_id: &str, event_type: &'static str, error: HandlerError);
}

/// 默认错误汇：通过 `tracing` 记录结构化错误事件。
///
/// # 设计背景（Why）
/// - 镜像 `spark_core::observability` 将错误与指标输出到统一可观测性通道的做法，
///   这里选用生态中最常见的 `tracing` 而非自建 facade。
#[derive(Default)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn handle(&self, handler_id: &str, event_type: &'static str, error: HandlerError) {
        tracing::error!(
            handler.id = handler_id,
            event.type = event_type,
            error = %error,
            "handler invocation failed"
        );
    }
}

/// 测试与嵌入式场景下的空操作错误汇。
#[derive(Default)]
pub struct NoopErrorSink;

impl ErrorSink for NoopErrorSink {
    fn handle(&self, _handler_id: &str, _event_type: &'static str, _error: HandlerError) {}
}

/// 便于在测试中断言错误是否被路由到错误汇的记录型实现。
#[derive(Default, Clone)]
pub struct RecordingErrorSink {
    records: Arc<std::sync::Mutex<Vec<(String, &'static str, String)>>>,
}

impl RecordingErrorSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<(String, &'static str, String)> {
        self.records
            .lock()
            .expect("error sink lock poisoned")
            .clone()
    }
}

impl ErrorSink for RecordingErrorSink {
    fn handle(&self, handler_id: &str, event_type: &'static str, error: HandlerError) {
        self.records
            .lock()
            .expect("error sink lock poisoned")
            .push((handler_id.to_string(), event_type, error.to_string()));
    }
}

impl fmt::Debug for RecordingErrorSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingErrorSink").finish_non_exhaustive()
    }
}
