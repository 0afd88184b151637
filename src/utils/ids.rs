//! 点击事件 ID 生成器
//!
//! 布局：`[unix_millis:43][seq:12][node:8]`，共 63 位，始终为正数。
//! 同一进程内严格递增；不同节点通过 node 位区分。

use std::sync::atomic::{AtomicU64, Ordering};

const NODE_BITS: u32 = 8;
const SEQ_BITS: u32 = 12;
const MILLIS_BITS: u32 = 43;
const MILLIS_MASK: u64 = (1 << MILLIS_BITS) - 1;
const NODE_MASK: u64 = (1 << NODE_BITS) - 1;

/// 单调事件 ID 生成器
///
/// 内部状态为 `[millis][seq]` 组合值，每次生成取 `max(last + 1, now << SEQ_BITS)`，
/// 因此同一毫秒内序号溢出时会借用下一毫秒，时钟回拨时沿用上次的时间戳。
#[derive(Debug)]
pub struct EventIdGenerator {
    node: u64,
    last: AtomicU64,
}

impl EventIdGenerator {
    pub fn new(node: u8) -> Self {
        Self {
            node: node as u64 & NODE_MASK,
            last: AtomicU64::new(0),
        }
    }

    pub fn next_id(&self) -> i64 {
        let now = (chrono::Utc::now().timestamp_millis().max(0) as u64) & MILLIS_MASK;
        let floor = now << SEQ_BITS;

        let mut current = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = floor.max(current + 1);
            match self.last.compare_exchange_weak(
                current,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return ((candidate << NODE_BITS) | self.node) as i64,
                Err(actual) => current = actual,
            }
        }
    }

    /// 从事件 ID 中取出毫秒时间戳
    pub fn millis_of(id: i64) -> i64 {
        ((id as u64) >> (NODE_BITS + SEQ_BITS)) as i64
    }

    /// 从事件 ID 中取出节点号
    pub fn node_of(id: i64) -> u8 {
        ((id as u64) & NODE_MASK) as u8
    }
}
