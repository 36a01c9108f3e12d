//! CPU-GPU 同步模块
//!
//! 每个帧槽对应一个 fence。提交时队列把该槽的 fence 设为 `frame_id + 1`，
//! 下次复用同一槽之前比较 fence 的完成值，未完成则阻塞等待。
//!
//! # 状态机
//!
//! ```text
//! Idle ──submit──> Submitted ──GPU 完成──> Completed ──submit──> Submitted ...
//! ```
//!
//! CPU 对同一个槽最多领先 GPU 一帧。

use crate::core::error::{GraphicsError, Result};
use crate::gfx::backend::GpuFence;

/// Fence 值
///
/// 单调递增；GPU 执行完一次提交后把 fence 设为该值。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FenceValue(u64);

impl FenceValue {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// 下一个Fence值
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

/// 帧槽状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// 从未提交过
    Idle,
    /// 已提交，等待 GPU 完成 `FenceValue`
    Submitted(FenceValue),
    /// GPU 已完成最后一次提交
    Completed,
}

/// 帧同步器
pub struct FrameSynchronizer {
    frame_id: u64,
    slots: Vec<SlotState>,
    stalls: u64,
}

impl FrameSynchronizer {
    pub fn new(slot_count: usize) -> Self {
        Self {
            frame_id: 0,
            slots: vec![SlotState::Idle; slot_count],
            stalls: 0,
        }
    }

    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// 当前帧使用的命令槽
    pub fn current_slot(&self) -> usize {
        (self.frame_id % self.slots.len() as u64) as usize
    }

    /// 当前帧提交后要 signal 的值
    pub fn next_fence_value(&self) -> FenceValue {
        FenceValue::new(self.frame_id + 1)
    }

    pub fn slot_state(&self, slot: usize) -> Option<SlotState> {
        self.slots.get(slot).copied()
    }

    /// CPU 因 GPU 未完成而阻塞的次数
    pub fn stall_count(&self) -> u64 {
        self.stalls
    }

    /// 等待槽的最后一次提交完成
    ///
    /// 返回是否发生了阻塞。等待没有超时；等待返回后 fence 仍未达到目标值视为同步错误。
    pub fn wait_for_slot<F: GpuFence>(&mut self, slot: usize, fence: &F) -> Result<bool> {
        let expected = match self.slots.get(slot) {
            Some(SlotState::Submitted(value)) => *value,
            Some(_) => return Ok(false),
            None => {
                return Err(GraphicsError::Synchronization(format!(
                    "Frame slot {} out of range ({} slots)",
                    slot,
                    self.slots.len()
                ))
                .into())
            }
        };

        let stalled = self.wait_for(fence, expected)?;
        self.slots[slot] = SlotState::Completed;
        Ok(stalled)
    }

    /// 等待任意 fence 达到 `expected`，阻塞时计入 [`Self::stall_count`]
    ///
    /// 常量缓冲区环的读者等待也走这里。
    pub fn wait_for<F: GpuFence>(&mut self, fence: &F, expected: FenceValue) -> Result<bool> {
        let stalled = wait_for_value(fence, expected)?;
        if stalled {
            self.stalls += 1;
        }
        Ok(stalled)
    }

    /// 记录槽已提交
    pub fn mark_submitted(&mut self, slot: usize, value: FenceValue) {
        if let Some(state) = self.slots.get_mut(slot) {
            *state = SlotState::Submitted(value);
        }
    }

    /// 进入下一帧
    pub fn advance(&mut self) {
        self.frame_id += 1;
    }

    /// 所有已提交的 (槽, 值)，用于关闭前等待 GPU 空闲
    pub fn pending(&self) -> impl Iterator<Item = (usize, FenceValue)> + '_ {
        self.slots.iter().enumerate().filter_map(|(slot, state)| match state {
            SlotState::Submitted(value) => Some((slot, *value)),
            _ => None,
        })
    }
}

/// 等待 fence 达到 `expected`，返回是否发生了阻塞
pub fn wait_for_value<F: GpuFence>(fence: &F, expected: FenceValue) -> Result<bool> {
    if fence.completed_value() >= expected.value() {
        return Ok(false);
    }

    tracing::debug!(
        expected = expected.value(),
        completed = fence.completed_value(),
        "CPU waiting for GPU"
    );
    fence.wait_for(expected.value())?;

    let completed = fence.completed_value();
    if completed < expected.value() {
        return Err(GraphicsError::Synchronization(format!(
            "Fence reached {} after wait, expected {}",
            completed,
            expected.value()
        ))
        .into());
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// 调用 `wait_for` 时直接完成到目标值的 fence
    struct ManualFence {
        completed: Cell<u64>,
        waits: Cell<u32>,
        broken: bool,
    }

    impl ManualFence {
        fn new(completed: u64) -> Self {
            Self { completed: Cell::new(completed), waits: Cell::new(0), broken: false }
        }
    }

    impl GpuFence for ManualFence {
        fn completed_value(&self) -> u64 {
            self.completed.get()
        }

        fn wait_for(&self, value: u64) -> Result<()> {
            self.waits.set(self.waits.get() + 1);
            if !self.broken {
                self.completed.set(value);
            }
            Ok(())
        }
    }

    #[test]
    fn test_fence_value() {
        let value = FenceValue::new(3);
        assert_eq!(value.next().value(), 4);
        assert!(value < value.next());
    }

    #[test]
    fn test_slot_round_robin() {
        let mut sync = FrameSynchronizer::new(2);
        let slots: Vec<usize> = (0..5)
            .map(|_| {
                let slot = sync.current_slot();
                sync.advance();
                slot
            })
            .collect();
        assert_eq!(slots, vec![0, 1, 0, 1, 0]);
        assert_eq!(sync.next_fence_value(), FenceValue::new(6));
    }

    #[test]
    fn test_idle_slot_does_not_wait() {
        let mut sync = FrameSynchronizer::new(2);
        let fence = ManualFence::new(0);

        assert!(!sync.wait_for_slot(0, &fence).unwrap());
        assert_eq!(fence.waits.get(), 0);
    }

    #[test]
    fn test_submitted_slot_blocks_until_complete() {
        let mut sync = FrameSynchronizer::new(2);
        let fence = ManualFence::new(0);

        sync.mark_submitted(0, FenceValue::new(1));
        assert!(sync.wait_for_slot(0, &fence).unwrap());
        assert_eq!(fence.completed_value(), 1);
        assert_eq!(sync.slot_state(0), Some(SlotState::Completed));
        assert_eq!(sync.stall_count(), 1);

        // 已完成的提交不再等待
        sync.mark_submitted(1, FenceValue::new(2));
        let done = ManualFence::new(2);
        assert!(!sync.wait_for_slot(1, &done).unwrap());
        assert_eq!(sync.stall_count(), 1);
    }

    #[test]
    fn test_direct_wait_counts_stalls() {
        let mut sync = FrameSynchronizer::new(2);
        let fence = ManualFence::new(0);

        assert!(sync.wait_for(&fence, FenceValue::new(3)).unwrap());
        assert!(!sync.wait_for(&fence, FenceValue::new(2)).unwrap());
        assert_eq!(sync.stall_count(), 1);
        // 槽状态不受影响
        assert_eq!(sync.slot_state(0), Some(SlotState::Idle));
    }

    #[test]
    fn test_incomplete_after_wait_is_error() {
        let mut sync = FrameSynchronizer::new(2);
        let fence = ManualFence { broken: true, ..ManualFence::new(0) };

        sync.mark_submitted(1, FenceValue::new(2));
        assert!(sync.wait_for_slot(1, &fence).is_err());
        assert!(sync.wait_for_slot(5, &fence).is_err());
    }

    #[test]
    fn test_pending_lists_submitted_slots() {
        let mut sync = FrameSynchronizer::new(2);
        sync.mark_submitted(1, FenceValue::new(2));
        assert_eq!(sync.pending().collect::<Vec<_>>(), vec![(1, FenceValue::new(2))]);
    }
}
