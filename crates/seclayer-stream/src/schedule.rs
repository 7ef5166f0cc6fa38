//! 遅延アドバンスのスケジューリング
//!
//! ハンドシェイク・ネゴシエーションの 1 ステップ（アドバンス）は
//! 呼び出し元の中で同期実行しない。セッションは `AdvanceSlot` に
//! 「次の tick で 1 回進める」ことを記録し、ホストが `run_scheduled()` で実行する。
//!
//! スロットはセッションが所有するため、セッションを破棄すると
//! 予約済みのアドバンスも一緒に消える（破棄済みセッションに対して実行されない）。

/// write / write_incoming がアドバンスを予約するかどうか
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdvanceTrigger {
    /// バッファ操作はキューに積むだけ。アドバンスは呼び出し側が明示的に起こす
    #[default]
    Explicit,
    /// バッファ操作のたびに遅延アドバンスを予約する
    OnWrite,
}

/// 予約済みアドバンス（高々 1 件）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdvanceSlot {
    scheduled: bool,
}

impl AdvanceSlot {
    /// 空のスロットを生成する
    pub fn new() -> Self {
        AdvanceSlot { scheduled: false }
    }

    /// アドバンスを予約する（予約済みなら何もしない）
    pub fn schedule(&mut self) {
        self.scheduled = true;
    }

    /// 予約を取り出す
    ///
    /// # 戻り値
    /// 予約があった場合 `true`（スロットは空になる）
    pub fn take(&mut self) -> bool {
        core::mem::take(&mut self.scheduled)
    }

    /// 予約を取り消す
    pub fn cancel(&mut self) {
        self.scheduled = false;
    }

    /// 予約があるか
    pub fn is_scheduled(&self) -> bool {
        self.scheduled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_is_idempotent() {
        let mut slot = AdvanceSlot::new();
        slot.schedule();
        slot.schedule();

        assert!(slot.take());
        // 2 回予約しても実行は 1 回
        assert!(!slot.take());
    }

    #[test]
    fn test_cancel_neutralizes() {
        let mut slot = AdvanceSlot::new();
        slot.schedule();
        slot.cancel();
        assert!(!slot.is_scheduled());
        assert!(!slot.take());
    }

    #[test]
    fn test_default_trigger_is_explicit() {
        assert_eq!(AdvanceTrigger::default(), AdvanceTrigger::Explicit);
    }
}
