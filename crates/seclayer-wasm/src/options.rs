//! JS から渡すセッションオプション（JSON）
//!
//! フィールド名は camelCase。省略したフィールドはデフォルト値になる。
//!
//! ```json
//! {
//!   "psk": "4NeCCgvZFe2RnPgrcU1PQw",
//!   "certificate": [{ "commonName": "example.com", "der": [48, 130] }],
//!   "privateKey": [1, 2, 3],
//!   "trusted": [{ "commonName": "example.com", "der": [48, 130] }],
//!   "trigger": "onWrite"
//! }
//! ```

extern crate alloc;

use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use seclayer_sasl::{SecurityFlags, SecurityLevel};
use seclayer_stream::AdvanceTrigger;
use seclayer_tls::Certificate;

/// アドバンスの起こし方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TriggerOption {
    /// update() を呼んだときだけ進める
    Explicit,
    /// バッファ操作のたびに次の tick での実行を予約する
    #[default]
    OnWrite,
}

impl From<TriggerOption> for AdvanceTrigger {
    fn from(trigger: TriggerOption) -> Self {
        match trigger {
            TriggerOption::Explicit => AdvanceTrigger::Explicit,
            TriggerOption::OnWrite => AdvanceTrigger::OnWrite,
        }
    }
}

/// 証明書の記述
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CertificateOptions {
    pub common_name: String,
    pub alt_names: Vec<String>,
    pub der: Vec<u8>,
}

impl From<CertificateOptions> for Certificate {
    fn from(opts: CertificateOptions) -> Self {
        Certificate::new(opts.common_name, opts.alt_names, opts.der)
    }
}

/// `SecureTls` のオプション
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TlsOptions {
    /// 組み込みバックエンドの PSK（Base64, 16 バイト）
    pub psk: String,
    /// 使うプロバイダー名（省略時は登録順で最初のもの）
    pub provider: Option<String>,
    /// 自分の証明書チェーン（先頭がエンドエンティティ）
    pub certificate: Vec<CertificateOptions>,
    pub private_key: Option<Vec<u8>>,
    pub trusted: Vec<CertificateOptions>,
    /// 許可する暗号スイート（空なら制約なし）
    pub cipher_suites: Vec<String>,
    pub compression: bool,
    pub trigger: TriggerOption,
    /// イベントを発行しない
    pub stateful_only: bool,
}

/// SASL 側で設定できる制約
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FlagOptions {
    pub disallow_plain: bool,
    pub disallow_active_vulnerable: bool,
    pub disallow_dictionary_vulnerable: bool,
    pub disallow_anonymous: bool,
    pub require_forward_secrecy: bool,
    pub require_credential_delegation: bool,
    pub require_mutual_auth: bool,
}

impl From<FlagOptions> for SecurityFlags {
    fn from(f: FlagOptions) -> Self {
        SecurityFlags {
            disallow_plain: f.disallow_plain,
            disallow_active_vulnerable: f.disallow_active_vulnerable,
            disallow_dictionary_vulnerable: f.disallow_dictionary_vulnerable,
            disallow_anonymous: f.disallow_anonymous,
            require_forward_secrecy: f.require_forward_secrecy,
            require_credential_delegation: f.require_credential_delegation,
            require_mutual_auth: f.require_mutual_auth,
        }
    }
}

/// アドレスとポート（ポート省略は未設定）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EndpointOptions {
    pub addr: String,
    pub port: Option<u16>,
}

/// `SecureSasl` のオプション
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SaslOptions {
    pub provider: Option<String>,
    /// サーバーとして PLAIN を検証するユーザー表
    pub users: BTreeMap<String, String>,
    pub flags: FlagOptions,
    /// "integrity" / "export" / "baseline" / "high" / "highest"。指定すると ssfMin より優先
    pub level: Option<String>,
    pub ssf_min: u32,
    pub ssf_max: u32,
    pub external_auth_id: Option<String>,
    pub external_ssf: u32,
    pub local: Option<EndpointOptions>,
    pub remote: Option<EndpointOptions>,
    pub app_name: Option<String>,
    pub username: Option<String>,
    pub authzid: Option<String>,
    pub password: Option<String>,
    pub realm: Option<String>,
    pub trigger: TriggerOption,
    pub stateful_only: bool,
}

/// JSON をオプションに変換する
///
/// # エラー
/// JSON の構文エラー・型の不一致（メッセージ文字列）
pub fn parse<T: DeserializeOwned>(json: &str) -> Result<T, String> {
    // 空文字列は {} と同じ扱い
    let json = if json.trim().is_empty() { "{}" } else { json };
    serde_json::from_str(json).map_err(|e| format!("Invalid options: {}", e))
}

/// セキュリティレベル名を解釈する
pub fn parse_level(name: &str) -> Option<SecurityLevel> {
    match name {
        "integrity" => Some(SecurityLevel::Integrity),
        "export" => Some(SecurityLevel::Export),
        "baseline" => Some(SecurityLevel::Baseline),
        "high" => Some(SecurityLevel::High),
        "highest" => Some(SecurityLevel::Highest),
        _ => None,
    }
}
