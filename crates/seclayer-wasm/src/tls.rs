//! SecureTls wasm-bindgen エクスポート
//!
//! JS のイベントループが外部スケジューラを担当する。ソケットから届いた
//! バイト列を `writeIncoming()` に渡し、`tick()` でハンドシェイクと
//! レコード処理を進め、`readOutgoing()` をソケットに書き出す。

extern crate alloc;

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use serde::Serialize;
use wasm_bindgen::prelude::*;

use seclayer_provider::{BuiltinProvider, ProviderRegistry};
use seclayer_stream::SecureStream;
use seclayer_tls::{
    Certificate, CertificateChain, CertificateCollection, IdentityResult, PrivateKey, TlsError,
    TlsSession,
};

use crate::options::{self, TlsOptions};
use crate::report::{to_json, TickReport};

/// TLS 系セッション
///
/// ## 内部アーキテクチャ
///
/// ```text
/// SecureTls
///   └── TlsSession      (seclayer-tls) - 状態遷移・バッファ・通知
///         └── TlsBackend (seclayer-provider) - ハンドシェイク・レコード保護
/// ```
#[wasm_bindgen]
pub struct SecureTls {
    session: TlsSession,
    /// 累計の送信平文バイト数（暗号化済み）
    total_encoded: u64,
    total_sent: u64,
    total_received: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TlsStats<'a> {
    state: String,
    handshaken: bool,
    version: Option<&'static str>,
    cipher_suite: &'a str,
    cipher_bits: u32,
    cipher_max_bits: u32,
    compressed: bool,
    peer_identity: &'static str,
    error: Option<String>,
    total_encoded_bytes: u64,
    total_sent_bytes: u64,
    total_received_bytes: u64,
}

#[wasm_bindgen]
impl SecureTls {
    /// オプション JSON からセッションを生成する（開始はしない）
    ///
    /// # エラー
    /// - オプションの JSON が不正
    /// - PSK のデコード失敗
    /// - 指定したプロバイダーが TLS に対応していない
    #[wasm_bindgen(constructor)]
    pub fn new(options_json: &str) -> Result<SecureTls, JsError> {
        let opts: TlsOptions = options::parse(options_json).map_err(|e| JsError::new(&e))?;
        Self::from_options(opts).map_err(|e| JsError::new(&e))
    }

    /// クライアントとしてハンドシェイクを開始する
    #[wasm_bindgen(js_name = "startClient")]
    pub fn start_client(&mut self, host: &str) -> Result<(), JsError> {
        self.session
            .start_client(host)
            .map_err(|e| JsError::new(&format!("TLS client start failed: {}", e)))
    }

    #[wasm_bindgen(js_name = "startServer")]
    pub fn start_server(&mut self) -> Result<(), JsError> {
        self.session
            .start_server()
            .map_err(|e| JsError::new(&format!("TLS server start failed: {}", e)))
    }

    /// 予約済みのアドバンスを実行し、溜まったイベントを返す
    ///
    /// # 戻り値
    /// ```json
    /// { "advanced": true, "events": ["readyReadOutgoing"] }
    /// ```
    #[wasm_bindgen]
    pub fn tick(&mut self) -> String {
        let advanced = self.session.run_scheduled();
        let events = self.session.take_events();
        to_json(&TickReport::new(advanced, &events))
    }

    /// 1 回だけ明示的に進める（trigger: "explicit" 用）
    #[wasm_bindgen]
    pub fn update(&mut self) {
        self.session.update();
    }

    /// 送信する平文
    #[wasm_bindgen]
    pub fn write(&mut self, data: &[u8]) {
        self.total_sent += data.len() as u64;
        self.session.write(data);
    }

    /// 受信した平文をすべて読み出す
    #[wasm_bindgen]
    pub fn read(&mut self) -> Vec<u8> {
        let data = self.session.read();
        self.total_received += data.len() as u64;
        data
    }

    /// ソケットから届いたバイト列
    #[wasm_bindgen(js_name = "writeIncoming")]
    pub fn write_incoming(&mut self, data: &[u8]) {
        self.session.write_incoming(data);
    }

    /// ソケットに書き出すバイト列
    #[wasm_bindgen(js_name = "readOutgoing")]
    pub fn read_outgoing(&mut self) -> Vec<u8> {
        let (data, encoded) = self.session.read_outgoing_counted();
        self.total_encoded += encoded as u64;
        data
    }

    /// 処理されずに残ったネットワーク側のバイト列（STARTTLS の巻き戻し等）
    #[wasm_bindgen(js_name = "readUnprocessed")]
    pub fn read_unprocessed(&mut self) -> Vec<u8> {
        self.session.read_unprocessed()
    }

    #[wasm_bindgen]
    pub fn close(&mut self) {
        self.session.close();
    }

    #[wasm_bindgen]
    pub fn reset(&mut self) {
        self.session.reset();
    }

    #[wasm_bindgen(js_name = "isHandshaken")]
    pub fn is_handshaken(&self) -> bool {
        self.session.is_handshaken()
    }

    #[wasm_bindgen(js_name = "haveClosed")]
    pub fn have_closed(&self) -> bool {
        self.session.have_closed()
    }

    /// "valid" / "hostMismatch" / "badCert" / "noCert"
    #[wasm_bindgen(js_name = "peerIdentity")]
    pub fn peer_identity(&self) -> String {
        String::from(identity_name(self.session.peer_identity_result()))
    }

    /// バックエンドが対応する暗号スイート
    #[wasm_bindgen(js_name = "supportedCipherSuites")]
    pub fn supported_cipher_suites(&self) -> js_sys::Array {
        self.session
            .supported_cipher_suites()
            .iter()
            .map(|s| JsValue::from_str(s))
            .collect()
    }

    /// セッション統計を JSON 文字列で返す
    ///
    /// # 戻り値
    /// ```json
    /// {
    ///   "state": "Established",
    ///   "handshaken": true,
    ///   "version": "TLSv1.2",
    ///   "cipherSuite": "PSK-AES128-OCB3",
    ///   "cipherBits": 128,
    ///   "cipherMaxBits": 128,
    ///   "compressed": false,
    ///   "peerIdentity": "valid",
    ///   "error": null,
    ///   "totalEncodedBytes": 5,
    ///   "totalSentBytes": 5,
    ///   "totalReceivedBytes": 0
    /// }
    /// ```
    #[wasm_bindgen(js_name = "getStats")]
    pub fn get_stats(&self) -> String {
        let s = &self.session;
        to_json(&TlsStats {
            state: format!("{:?}", s.state()),
            handshaken: s.is_handshaken(),
            version: s.version().map(|v| v.as_str()),
            cipher_suite: s.cipher_suite(),
            cipher_bits: s.cipher_bits(),
            cipher_max_bits: s.cipher_max_bits(),
            compressed: s.is_compressed(),
            peer_identity: identity_name(s.peer_identity_result()),
            error: s.error_code().map(|e| format!("{}", e)),
            total_encoded_bytes: self.total_encoded,
            total_sent_bytes: self.total_sent,
            total_received_bytes: self.total_received,
        })
    }
}

impl SecureTls {
    /// 解析済みオプションからセッションを組み立てる
    ///
    /// # エラー
    /// PSK のデコード失敗、プロバイダーが見つからない（メッセージ文字列）
    pub fn from_options(opts: TlsOptions) -> Result<SecureTls, String> {
        let provider = BuiltinProvider::from_base64_psk(&opts.psk)
            .map_err(|e| format!("Invalid PSK: {}", e))?;
        let mut registry = ProviderRegistry::new();
        registry
            .register(alloc::boxed::Box::new(provider))
            .map_err(|e| format!("{}", e))?;
        let mut session = registry
            .tls_session(opts.provider.as_deref())
            .map_err(|e| format!("{}", e))?;

        match (opts.certificate.is_empty(), opts.private_key) {
            (true, None) => {}
            (false, Some(key)) => {
                let chain: CertificateChain =
                    opts.certificate.into_iter().map(Certificate::from).collect();
                session.set_certificate(chain, PrivateKey::new(key));
            }
            _ => return Err(format!("{}", TlsError::CertKeyMismatch)),
        }
        let trusted: CertificateCollection = opts.trusted.into_iter().map(Certificate::from).collect();
        session.set_trusted_certificates(trusted);
        session.set_constraints(opts.cipher_suites);
        session.set_compression_enabled(opts.compression);
        session.set_trigger(opts.trigger.into());
        session.set_stateful_only(opts.stateful_only);

        Ok(SecureTls {
            session,
            total_encoded: 0,
            total_sent: 0,
            total_received: 0,
        })
    }

    /// 内部セッション（native テスト・組み込み用）
    pub fn session(&self) -> &TlsSession {
        &self.session
    }
}

fn identity_name(result: IdentityResult) -> &'static str {
    match result {
        IdentityResult::Valid => "valid",
        IdentityResult::HostMismatch => "hostMismatch",
        IdentityResult::BadCert => "badCert",
        IdentityResult::NoCert => "noCert",
    }
}
