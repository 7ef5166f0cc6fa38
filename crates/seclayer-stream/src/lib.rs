//! # seclayer-stream
//!
//! セキュアレイヤー共通の基盤
//!
//! TLS 系・SASL 系のセッションはどちらもこのクレートの部品で組み立てる。
//!
//! ## 構成
//!
//! ```text
//! ByteQueue       末尾追加・一括取り出しのバッファ
//! ChangeNotifier  begin/end スナップショット差分 → エッジトリガイベント
//! AdvanceSlot     遅延アドバンスの予約（高々 1 件）
//! SecureStream    セッション共通の双方向ストリーム契約
//! ```
//!
//! ## ホスト側の駆動ループ
//!
//! ```text
//! tick:
//!   1. session.run_scheduled()     ← 予約済みのハンドシェイク/ネゴシエーションを 1 ステップ進める
//!   2. session.take_events()       ← readyRead / readyReadOutgoing / closed / error
//!   3. イベントに応じて read() / read_outgoing() を呼ぶ
//! ```

#![no_std]
extern crate alloc;

pub mod buffer;
pub mod layer;
pub mod notifier;
pub mod schedule;

pub use buffer::ByteQueue;
pub use layer::SecureStream;
pub use notifier::{ChangeNotifier, StreamEvent, StreamSnapshot};
pub use schedule::{AdvanceSlot, AdvanceTrigger};
