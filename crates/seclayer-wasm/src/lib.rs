//! # seclayer-wasm
//!
//! wasm-bindgen エクスポート：JS のイベントループを外部スケジューラとして使う公開 API。
//!
//! ## 使用方法（TypeScript）
//!
//! ```typescript
//! import { SecureTls, init_panic_hook } from '../seclayer-wasm-pkg/seclayer_wasm';
//!
//! init_panic_hook();
//!
//! const tls = new SecureTls(JSON.stringify({ psk: "4NeCCgvZFe2RnPgrcU1PQw" }));
//! tls.startClient("example.com");
//!
//! socket.on('data', (buf) => tls.writeIncoming(buf));
//!
//! // 定期タイマー（またはマイクロタスク）
//! const report = JSON.parse(tls.tick());
//! for (const ev of report.events) {
//!     if (ev === "readyReadOutgoing") socket.write(tls.readOutgoing());
//!     if (ev === "readyRead") app.emit(tls.read());
//! }
//! ```

use wasm_bindgen::prelude::*;

pub mod options;
pub mod report;
pub mod sasl;
pub mod tls;

pub use sasl::SecureSasl;
pub use tls::SecureTls;

/// パニック時にブラウザコンソールにスタックトレースを出力する
///
/// 開発時に必ず呼び出すこと。本番ビルドでは feature flag で無効化可能。
#[wasm_bindgen]
pub fn init_panic_hook() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// プロセス全体のアプリケーション名を設定する（1 回だけ）
///
/// SASL サーバーがバックエンドに渡す名前。設定しなければ "seclayer"。
///
/// # エラー
/// 既に設定済み
#[wasm_bindgen(js_name = "setAppName")]
pub fn set_app_name(name: &str) -> Result<(), JsError> {
    seclayer_sasl::config::init_app_name(name).map_err(|e| JsError::new(&alloc::format!("{}", e)))
}

extern crate alloc;
