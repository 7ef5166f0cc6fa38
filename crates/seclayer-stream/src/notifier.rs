//! スナップショット差分によるエッジトリガ通知
//!
//! ## 更新サイクル
//!
//! ```text
//! begin(before)          ← 状態を変更する操作の直前
//!   ... バッファ操作・バックエンド呼び出し ...
//! end(after)             ← 直後。before/after を比較してイベントをキューに積む
//!   ↓
//! take_events()          ← ホストのスケジューラが次の tick で取り出す
//! ```
//!
//! `end()` の中でコールバックを呼ぶことはない。通知先がセッションを
//! 変更・破棄しても更新処理の途中に再入しない。

use alloc::vec::Vec;

/// 通知イベントの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamEvent {
    /// アプリ側で読み取れるデータが増えた
    ReadyRead,
    /// ネットワーク側へ送るデータが増えた
    ReadyReadOutgoing,
    /// クローズ状態に遷移した
    Closed,
    /// エラー状態に遷移した（ok が false になった）
    Error,
}

impl StreamEvent {
    /// イベント名（ホスト側へ渡す表記）
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamEvent::ReadyRead => "readyRead",
            StreamEvent::ReadyReadOutgoing => "readyReadOutgoing",
            StreamEvent::Closed => "closed",
            StreamEvent::Error => "error",
        }
    }
}

/// ストリーム状態のスナップショット
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSnapshot {
    /// アプリ側で読み取れるバイト数
    pub readable: usize,
    /// ネットワーク側へ送るバイト数
    pub outgoing_readable: usize,
    /// クローズ済みか
    pub closed: bool,
    /// エラーなしか
    pub ok: bool,
}

impl StreamSnapshot {
    /// before → after で新たに成立した述語をイベント列として返す
    ///
    /// 副作用なし。何度呼んでもよい。
    pub fn changes(before: &StreamSnapshot, after: &StreamSnapshot) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if after.readable > before.readable {
            events.push(StreamEvent::ReadyRead);
        }
        if after.outgoing_readable > before.outgoing_readable {
            events.push(StreamEvent::ReadyReadOutgoing);
        }
        if !before.closed && after.closed {
            events.push(StreamEvent::Closed);
        }
        if before.ok && !after.ok {
            events.push(StreamEvent::Error);
        }
        events
    }
}

/// begin/end の差分からイベントを生成し、配送待ちキューに保持する
///
/// 同じ種類のイベントが未配送のまま残っている場合は重複して積まない。
/// キューの長さはイベントの種類数（4）を超えない。
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    /// begin() で記録したスナップショット
    before: Option<StreamSnapshot>,
    /// false のときイベントを一切生成しない（ポーリング利用者向け）
    emit: bool,
    /// 配送待ちイベント
    pending: Vec<StreamEvent>,
}

impl ChangeNotifier {
    /// イベント生成ありの ChangeNotifier を生成する
    pub fn new() -> Self {
        ChangeNotifier {
            before: None,
            emit: true,
            pending: Vec::new(),
        }
    }

    /// ステートフル専用モードを切り替える
    ///
    /// `true` の間は end() がイベントを積まない。
    pub fn set_stateful_only(&mut self, stateful_only: bool) {
        self.emit = !stateful_only;
    }

    /// ステートフル専用モードか
    pub fn is_stateful_only(&self) -> bool {
        !self.emit
    }

    /// 更新サイクルを開始する
    pub fn begin(&mut self, snapshot: StreamSnapshot) {
        self.before = Some(snapshot);
    }

    /// 更新サイクルを終了し、新たに成立したイベントを配送待ちにする
    ///
    /// 対応する begin() がない場合は何もしない。
    ///
    /// # 戻り値
    /// このサイクルで新たにキューに積んだイベント数
    pub fn end(&mut self, snapshot: StreamSnapshot) -> usize {
        let Some(before) = self.before.take() else {
            return 0;
        };
        if !self.emit {
            return 0;
        }

        let mut queued = 0;
        for event in StreamSnapshot::changes(&before, &snapshot) {
            if !self.pending.contains(&event) {
                tracing::trace!(event = event.as_str(), "queued stream event");
                self.pending.push(event);
                queued += 1;
            }
        }
        queued
    }

    /// 配送待ちイベントをすべて取り出す
    pub fn take_events(&mut self) -> Vec<StreamEvent> {
        core::mem::take(&mut self.pending)
    }

    /// 配送待ちイベントがあるか
    pub fn has_pending_events(&self) -> bool {
        !self.pending.is_empty()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(readable: usize, outgoing: usize, closed: bool, ok: bool) -> StreamSnapshot {
        StreamSnapshot {
            readable,
            outgoing_readable: outgoing,
            closed,
            ok,
        }
    }

    #[test]
    fn test_changes_detects_each_predicate() {
        let before = snap(0, 0, false, true);
        let after = snap(5, 3, true, false);
        let events = StreamSnapshot::changes(&before, &after);
        assert_eq!(
            events,
            alloc::vec![
                StreamEvent::ReadyRead,
                StreamEvent::ReadyReadOutgoing,
                StreamEvent::Closed,
                StreamEvent::Error,
            ]
        );
    }

    #[test]
    fn test_decrease_is_not_an_event() {
        // 読み取りでバッファが減ってもイベントにならない
        let before = snap(10, 10, false, true);
        let after = snap(0, 0, false, true);
        assert!(StreamSnapshot::changes(&before, &after).is_empty());
    }

    #[test]
    fn test_steady_state_is_not_an_event() {
        // すでに closed / error の状態が続いてもイベントにならない
        let before = snap(1, 1, true, false);
        let after = snap(1, 1, true, false);
        assert!(StreamSnapshot::changes(&before, &after).is_empty());
    }

    #[test]
    fn test_end_queues_without_delivering() {
        let mut n = ChangeNotifier::new();
        n.begin(snap(0, 0, false, true));
        assert_eq!(n.end(snap(4, 0, false, true)), 1);

        assert!(n.has_pending_events());
        assert_eq!(n.take_events(), alloc::vec![StreamEvent::ReadyRead]);
        assert!(!n.has_pending_events());
    }

    #[test]
    fn test_pending_event_not_duplicated() {
        let mut n = ChangeNotifier::new();

        // 2 サイクル連続でバッファが増えても、未配送なら 1 件のまま
        n.begin(snap(0, 0, false, true));
        n.end(snap(4, 0, false, true));
        n.begin(snap(4, 0, false, true));
        assert_eq!(n.end(snap(8, 0, false, true)), 0);

        assert_eq!(n.take_events(), alloc::vec![StreamEvent::ReadyRead]);

        // 配送後は再び積まれる
        n.begin(snap(8, 0, false, true));
        n.end(snap(9, 0, false, true));
        assert_eq!(n.take_events(), alloc::vec![StreamEvent::ReadyRead]);
    }

    #[test]
    fn test_stateful_only_suppresses_events() {
        let mut n = ChangeNotifier::new();
        n.set_stateful_only(true);
        assert!(n.is_stateful_only());

        n.begin(snap(0, 0, false, true));
        assert_eq!(n.end(snap(1, 1, true, false)), 0);
        assert!(n.take_events().is_empty());
    }

    #[test]
    fn test_end_without_begin_is_noop() {
        let mut n = ChangeNotifier::new();
        assert_eq!(n.end(snap(1, 1, true, false)), 0);
        assert!(!n.has_pending_events());
    }
}
