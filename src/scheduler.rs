use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::task::JoinHandle;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 引擎自有的协作式调度器契约。
///
/// # 设计背景（Why）
/// - 规格 §5 明确只有一个“引擎自有”的调度器：用于把同步 `dispatch` 中挂起式
///   处理器以“发后即忘”的方式启动。对齐 `spark_transport_tcp` 在
///   `runtime-tokio` 特性后面隐藏具体运行时的做法，这里把调度行为收敛成一个
///   小 trait，默认用 Tokio 实现，但允许宿主替换为其他运行时。
///
/// # 契约说明（What）
/// - `spawn`：启动一个后台任务，调用方不等待其完成。
/// - `shutdown`：引擎 `close()` 时调用，取消所有仍在运行的已调度任务
///   （规格 §5：“`close()` 取消引擎自有的调度器”）。
pub trait Scheduler: Send + Sync {
    fn spawn(&self, future: BoxFuture<'static, ()>);

    fn shutdown(&self);
}

/// 基于 Tokio 的默认调度器实现。
///
/// 持有已启动任务的句柄，以便 `shutdown` 时能够 `abort` 它们；已完成的句柄会
/// 在下一次 `spawn` 时被惰性清理，避免无界增长。
pub struct TokioScheduler {
    handle: tokio::runtime::Handle,
    tasks: std::sync::Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl TokioScheduler {
    /// 绑定到当前 Tokio 运行时。调用方必须在一个 Tokio 运行时上下文中构造。
    pub fn current() -> Arc<Self> {
        Arc::new(Self {
            handle: tokio::runtime::Handle::current(),
            tasks: std::sync::Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    pub fn with_handle(handle: tokio::runtime::Handle) -> Arc<Self> {
        Arc::new(Self {
            handle,
            tasks: std::sync::Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }
}

impl Scheduler for TokioScheduler {
    fn spawn(&self, future: BoxFuture<'static, ()>) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let handle = self.handle.spawn(future);
        let mut tasks = self.tasks.lock().expect("scheduler lock poisoned");
        tasks.retain(|h| !h.is_finished());
        tasks.push(handle);
    }

    fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        let mut tasks = self.tasks.lock().expect("scheduler lock poisoned");
        for task in tasks.drain(..) {
            task.abort();
        }
    }
}

/// 用于无运行时场景的默认调度器：每次 `spawn` 在一个新的、被丢弃的
/// (detached) 系统线程上 `block_on` future，调用方所在线程立即返回。
///
/// # 设计背景（Why）
/// - 规格 §4.7.3 要求同步 `dispatch` 路径“启动后立即返回，不等待挂起处理器
///   完成”，因此即便没有 Tokio 运行时可用，`spawn` 也不能阻塞调用方——这里
///   用一次性系统线程换取真正的发后即忘语义，而不是退化为同步调用。
pub struct InlineScheduler {
    closed: AtomicBool,
}

impl Default for InlineScheduler {
    fn default() -> Self {
        Self {
            closed: AtomicBool::new(false),
        }
    }
}

impl Scheduler for InlineScheduler {
    fn spawn(&self, future: BoxFuture<'static, ()>) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        std::thread::spawn(move || {
            futures::executor::block_on(future);
        });
    }

    fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
    }
}
