use std::sync::{Arc, Mutex};

use crate::descriptor::HandlerDescriptor;
use crate::engine::{Engine, RegistrationToken};
use crate::error::EventBusError;

/// 一个 `Scope` 要么直接挂在引擎下，要么嵌套在另一个 `Scope` 下；两种情况下
/// 注册最终都落到同一个 [`Engine`] 上，嵌套只影响"谁负责在关闭时撤销谁"。
enum ScopeParent {
    Root(Engine),
    Nested(Arc<Scope>),
}

impl ScopeParent {
    fn engine(&self) -> &Engine {
        match self {
            ScopeParent::Root(engine) => engine,
            ScopeParent::Nested(parent) => parent.parent.engine(),
        }
    }
}

/// 生命周期受限、可批量撤销的注册作用域，对应规格 §4.8。
///
/// # 设计背景（Why）
/// - 规格要求"关闭一个 Scope 撤销它直接持有的全部注册，并递归关闭子 Scope"，
///   同时撤销操作必须能脱离 Scope 嵌套深度直接定位到引擎——这里让每个
///   [`RegistrationToken`] 始终持有一份指向根 [`Engine`] 的句柄（而不是指向
///   创建它的 `Scope`），嵌套的 `Scope` 本身只做"记账"。
///
/// # 契约说明（What）
/// - `close()` 幂等失败：对已关闭的 `Scope` 再次调用返回
///   [`EventBusError::EngineClosed`]。
/// - 关闭顺序不保证，但保证关闭完成后，该 `Scope`（及其所有子 `Scope`）注册的
///   全部处理器都已从引擎中移除。
pub struct Scope {
    parent: ScopeParent,
    tokens: Mutex<Vec<RegistrationToken>>,
    children: Mutex<Vec<Arc<Scope>>>,
    closed: std::sync::atomic::AtomicBool,
}

impl Scope {
    /// 直接挂在引擎根部创建一个新的 `Scope`。
    pub fn new(engine: Engine) -> Arc<Self> {
        Arc::new(Self {
            parent: ScopeParent::Root(engine),
            tokens: Mutex::new(Vec::new()),
            children: Mutex::new(Vec::new()),
            closed: std::sync::atomic::AtomicBool::new(false),
        })
    }

    /// 在当前 `Scope` 下创建一个子 `Scope`；子 `Scope` 关闭不影响父 `Scope`，
    /// 但父 `Scope` 关闭会级联关闭所有仍然存活的子 `Scope`。
    pub fn child(self: &Arc<Self>) -> Result<Arc<Self>, EventBusError> {
        self.ensure_open()?;
        let child = Arc::new(Self {
            parent: ScopeParent::Nested(self.clone()),
            tokens: Mutex::new(Vec::new()),
            children: Mutex::new(Vec::new()),
            closed: std::sync::atomic::AtomicBool::new(false),
        });
        self.children
            .lock()
            .expect("scope lock poisoned")
            .push(child.clone());
        Ok(child)
    }

    fn ensure_open(&self) -> Result<(), EventBusError> {
        if self.closed.load(std::sync::atomic::Ordering::Acquire) {
            Err(EventBusError::EngineClosed)
        } else {
            Ok(())
        }
    }

    /// 在该 `Scope` 下注册一个处理器描述符，撤销凭证同时被本 `Scope` 记录。
    pub fn register(&self, descriptor: HandlerDescriptor) -> Result<RegistrationToken, EventBusError> {
        self.ensure_open()?;
        let token = self.parent.engine().register(descriptor)?;
        self.tokens
            .lock()
            .expect("scope lock poisoned")
            .push(token.clone());
        Ok(token)
    }

    /// 关闭该 `Scope`：撤销它直接持有的全部注册，并递归关闭所有子 `Scope`。
    /// 第二次调用返回 [`EventBusError::EngineClosed`]。
    pub fn close(&self) -> Result<(), EventBusError> {
        if self
            .closed
            .compare_exchange(
                false,
                true,
                std::sync::atomic::Ordering::AcqRel,
                std::sync::atomic::Ordering::Acquire,
            )
            .is_err()
        {
            return Err(EventBusError::EngineClosed);
        }

        for child in self.children.lock().expect("scope lock poisoned").drain(..) {
            // 子 Scope 可能已经被调用方显式关闭，此处忽略 `EngineClosed`。
            let _ = child.close();
        }

        for token in self.tokens.lock().expect("scope lock poisoned").drain(..) {
            // 引擎本身若已关闭，撤销操作自然是多余的，同样忽略该错误。
            let _ = token.unregister();
        }

        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(std::sync::atomic::Ordering::Acquire)
    }
}
