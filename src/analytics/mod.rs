//! 点击分析：事件构造、摄取管线、汇总与数据清理

pub mod dead_letter;
pub mod event;
pub mod pipeline;
pub mod retention;
pub mod rollup;
pub mod sink;

pub use dead_letter::{DeadLetterRecord, FileDeadLetter, LogDeadLetter};
pub use event::{DeviceClass, RequestContext, build_event};
pub use pipeline::{ClickPipeline, PipelineSettings, PipelineStats};
pub use retention::{CleanupReport, DataRetentionTask};
pub use rollup::{RebuildReport, RollupAggregator, aggregate_events};
pub use sink::{DeadLetter, EventSink};
