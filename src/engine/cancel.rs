// ==========================================
// 矿山生产排程系统 - 协作式取消
// ==========================================
// 用途: FullPass 在周期/迭代边界检查取消请求,
//       保证中止时不留下部分提交的排程
// ==========================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// ==========================================
// CancelToken - 取消令牌
// ==========================================
// 克隆共享同一底层标志; 可从其他线程置位
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// 请求取消 (幂等)
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// 是否已请求取消
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_shared_across_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
