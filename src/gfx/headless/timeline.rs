//! GPU 时间线计数器
//!
//! 单调计数器加条件变量：GPU 线程设置值，CPU 线程阻塞等待值达到目标。

use parking_lot::{Condvar, Mutex};

pub struct TimelineCounter {
    value: Mutex<u64>,
    reached: Condvar,
}

impl TimelineCounter {
    pub fn new(initial: u64) -> Self {
        Self {
            value: Mutex::new(initial),
            reached: Condvar::new(),
        }
    }

    pub fn value(&self) -> u64 {
        *self.value.lock()
    }

    /// 设置计数器并唤醒所有等待者
    pub fn signal(&self, value: u64) {
        let mut current = self.value.lock();
        *current = value;
        self.reached.notify_all();
    }

    /// 阻塞直到计数器 >= `target`，没有超时
    pub fn wait_for(&self, target: u64) {
        let mut current = self.value.lock();
        while *current < target {
            self.reached.wait(&mut current);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_wait_returns_immediately_when_reached() {
        let counter = TimelineCounter::new(5);
        counter.wait_for(3);
        counter.wait_for(5);
        assert_eq!(counter.value(), 5);
    }

    #[test]
    fn test_wait_blocks_until_signaled() {
        let counter = Arc::new(TimelineCounter::new(0));
        let gpu = Arc::clone(&counter);

        let handle = std::thread::spawn(move || {
            for value in 1..=3 {
                std::thread::sleep(Duration::from_millis(5));
                gpu.signal(value);
            }
        });

        counter.wait_for(3);
        assert_eq!(counter.value(), 3);
        handle.join().unwrap();
    }
}
