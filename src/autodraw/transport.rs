//! # 传输句柄与连接桥
//!
//! ## 设计思路
//!
//! 核心只依赖两个最小接口：
//! - `Transport`：发送单个文本帧，并报告自身是否处于打开状态
//! - `TransportSource`：随时读取“当前可用的句柄”，允许返回 `None`
//!
//! 句柄如何被发现（拦截、注入、直连）不是核心关心的问题。
//!
//! ## 实现思路
//!
//! `SocketBridge` 负责追踪零个或多个句柄，对外只暴露“最近活跃且仍打开的句柄”。
//! 多个使用方通过 `acquire()` 共享同一个桥，`BridgeLease` 采用 RAII 引用计数：
//! 最后一个租约释放时清空全部追踪的句柄，桥回到未安装状态。

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;

use super::TransportError;

/// 远端渲染器的双向消息通道。
pub trait Transport: Send + Sync {
    /// 发送一个文本帧。失败只影响这一帧。
    fn send(&self, frame: &str) -> Result<(), TransportError>;

    /// 句柄当前是否处于打开状态。由外部管理，核心只做轮询。
    fn is_open(&self) -> bool;
}

pub type TransportHandle = Arc<dyn Transport>;

/// 核心读取传输句柄的唯一入口。
pub trait TransportSource: Send + Sync {
    fn current(&self) -> Option<TransportHandle>;
}

impl TransportSource for Option<TransportHandle> {
    fn current(&self) -> Option<TransportHandle> {
        self.clone()
    }
}

#[derive(Default)]
struct BridgeInner {
    handles: Mutex<Vec<TransportHandle>>,
    ref_count: AtomicUsize,
}

impl BridgeInner {
    fn lock_handles(&self) -> MutexGuard<'_, Vec<TransportHandle>> {
        // 句柄列表在任何写入点都保持一致，中毒后继续使用是安全的
        match self.handles.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// 追踪活跃传输句柄的共享桥。
#[derive(Clone, Default)]
pub struct SocketBridge {
    inner: Arc<BridgeInner>,
}

impl SocketBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取一个租约，桥在至少存在一个租约期间保持安装状态。
    ///
    /// # 示例
    /// ```rust
    /// use pixel_autodraw::autodraw::{SocketBridge, TransportSource};
    ///
    /// let bridge = SocketBridge::new();
    /// let lease = bridge.acquire();
    /// assert!(bridge.is_installed());
    /// assert!(lease.current().is_none());
    /// drop(lease);
    /// assert!(!bridge.is_installed());
    /// ```
    pub fn acquire(&self) -> BridgeLease {
        let previous = self.inner.ref_count.fetch_add(1, Ordering::SeqCst);
        if previous == 0 {
            log::debug!("🔌 连接桥已安装");
        }
        BridgeLease {
            bridge: self.clone(),
        }
    }

    pub fn is_installed(&self) -> bool {
        self.inner.ref_count.load(Ordering::SeqCst) > 0
    }

    pub fn ref_count(&self) -> usize {
        self.inner.ref_count.load(Ordering::SeqCst)
    }

    /// 记录一次句柄活动。新句柄加入末尾，已知句柄被移到末尾成为“最近活跃”。
    ///
    /// 桥未安装时忽略。
    pub fn track(&self, handle: TransportHandle) {
        if !self.is_installed() {
            log::debug!("🔌 连接桥未安装，忽略句柄");
            return;
        }
        let mut handles = self.inner.lock_handles();
        handles.retain(|known| !std::ptr::addr_eq(Arc::as_ptr(known), Arc::as_ptr(&handle)));
        handles.push(handle);
    }

    /// 当前追踪的句柄数量（包含尚未清理的已关闭句柄）。
    pub fn tracked(&self) -> usize {
        self.inner.lock_handles().len()
    }

    fn release(&self) {
        let previous = self.inner.ref_count.fetch_sub(1, Ordering::SeqCst);
        if previous == 1 {
            self.inner.lock_handles().clear();
            log::debug!("🔌 连接桥已卸载，追踪的句柄已清空");
        }
    }
}

impl TransportSource for SocketBridge {
    fn current(&self) -> Option<TransportHandle> {
        let mut handles = self.inner.lock_handles();
        handles.retain(|handle| handle.is_open());
        handles.last().cloned()
    }
}

/// 连接桥租约，`Drop` 时自动释放引用计数。
pub struct BridgeLease {
    bridge: SocketBridge,
}

impl BridgeLease {
    pub fn bridge(&self) -> &SocketBridge {
        &self.bridge
    }
}

impl TransportSource for BridgeLease {
    fn current(&self) -> Option<TransportHandle> {
        self.bridge.current()
    }
}

impl Drop for BridgeLease {
    fn drop(&mut self) {
        self.bridge.release();
    }
}

/// 基于 tokio 无界通道的传输实现，接收端拿到的就是完整文本帧。
pub struct ChannelTransport {
    sender: mpsc::UnboundedSender<String>,
    open: AtomicBool,
}

impl ChannelTransport {
    pub fn pair() -> (Arc<ChannelTransport>, mpsc::UnboundedReceiver<String>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let transport = Arc::new(ChannelTransport {
            sender,
            open: AtomicBool::new(true),
        });
        (transport, receiver)
    }

    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

impl Transport for ChannelTransport {
    fn send(&self, frame: &str) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }
        self.sender
            .send(frame.to_string())
            .map_err(|_| TransportError::Closed)
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst) && !self.sender.is_closed()
    }
}
