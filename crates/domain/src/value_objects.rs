use serde::Serialize;

/// 状态比较并设置的结果
///
/// `Skipped` 表示任务已不处于 PENDING（已被其他扫描处理或已取消），属于正常的空操作。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransitionOutcome {
    Applied,
    Skipped,
}

/// 一次扫描的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub due: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// 批量任务（逐项尽力执行）的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: usize,
}
