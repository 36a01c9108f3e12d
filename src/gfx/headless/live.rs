//! 存活对象计数
//!
//! 每个由无窗口设备创建的对象持有一个 [`LiveGuard`]，释放时计数减一。
//! 关闭后计数不为零说明有对象泄漏，相当于 DXGI 的 `ReportLiveObjects`。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// 存活对象计数器的共享句柄，设备释放后仍可读取
#[derive(Debug, Clone, Default)]
pub struct LiveObjects(Arc<AtomicUsize>);

impl LiveObjects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn track(&self) -> LiveGuard {
        self.0.fetch_add(1, Ordering::SeqCst);
        LiveGuard(Arc::clone(&self.0))
    }
}

#[derive(Debug)]
pub(crate) struct LiveGuard(Arc<AtomicUsize>);

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guards_are_counted() {
        let live = LiveObjects::new();
        let a = live.track();
        let b = live.track();
        assert_eq!(live.count(), 2);

        drop(a);
        assert_eq!(live.count(), 1);
        drop(b);
        assert_eq!(live.count(), 0);
    }
}
