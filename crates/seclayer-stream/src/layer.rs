//! SecureStream: プロトコルセッション共通の双方向ストリーム契約

use alloc::vec::Vec;

use crate::notifier::{ChangeNotifier, StreamEvent, StreamSnapshot};

/// セキュアレイヤーの共通インターフェース
///
/// アプリ側（平文）とネットワーク側の二重バッファを持つ。
///
/// ```text
///           write()  ──▶ ┌─────────┐ ──▶ read_outgoing()
///  アプリ                │ session │                    ネットワーク
///           read()   ◀── └─────────┘ ◀── write_incoming()
/// ```
///
/// バッファ操作は失敗しない。キューに積むか、キュー全体を取り出すだけ。
pub trait SecureStream {
    /// アプリ側で読み取れるバイト数
    fn bytes_available(&self) -> usize;

    /// ネットワーク側へ送るバイト数
    fn bytes_outgoing_available(&self) -> usize;

    /// エラー状態でないか
    fn ok(&self) -> bool;

    /// close() に意味があるか
    fn is_closable(&self) -> bool {
        false
    }

    /// クローズが完了したか
    fn have_closed(&self) -> bool {
        false
    }

    /// プロトコルレベルのクローズを開始する
    fn close(&mut self) {}

    /// 受信したがプロトコルが消費していない生バイトを取り出す
    fn read_unprocessed(&mut self) -> Vec<u8> {
        Vec::new()
    }

    /// アプリ側の送信データを積む
    fn write(&mut self, data: &[u8]);

    /// アプリ側の受信データをすべて取り出す
    fn read(&mut self) -> Vec<u8>;

    /// ネットワークから受け取った生バイトを積む
    fn write_incoming(&mut self, data: &[u8]);

    /// ネットワークへ送るバイトをすべて取り出す
    fn read_outgoing(&mut self) -> Vec<u8> {
        self.read_outgoing_counted().0
    }

    /// read_outgoing() と同じだが、取り出した分が表す平文バイト数も返す
    fn read_outgoing_counted(&mut self) -> (Vec<u8>, usize);

    /// 予約済みのアドバンスがあれば 1 回実行する
    ///
    /// ホストのスケジューラが tick ごとに呼び出す。
    ///
    /// # 戻り値
    /// アドバンスを実行した場合 `true`
    fn run_scheduled(&mut self) -> bool;

    /// 通知器への参照
    fn notifier(&self) -> &ChangeNotifier;

    /// 通知器への可変参照
    fn notifier_mut(&mut self) -> &mut ChangeNotifier;

    /// 現在の状態のスナップショット
    fn snapshot(&self) -> StreamSnapshot {
        StreamSnapshot {
            readable: self.bytes_available(),
            outgoing_readable: self.bytes_outgoing_available(),
            closed: self.have_closed(),
            ok: self.ok(),
        }
    }

    /// ステートフル専用モード（イベントを生成しない）を切り替える
    fn set_stateful_only(&mut self, stateful_only: bool) {
        self.notifier_mut().set_stateful_only(stateful_only);
    }

    /// 配送待ちイベントをすべて取り出す
    fn take_events(&mut self) -> Vec<StreamEvent> {
        self.notifier_mut().take_events()
    }

    /// 更新サイクルを開始する
    fn update_begin(&mut self) {
        let snapshot = self.snapshot();
        self.notifier_mut().begin(snapshot);
    }

    /// 更新サイクルを終了する
    fn update_end(&mut self) {
        let snapshot = self.snapshot();
        self.notifier_mut().end(snapshot);
    }
}
