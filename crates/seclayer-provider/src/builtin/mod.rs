//! 組み込みプロバイダー
//!
//! 事前共有鍵（PSK）で保護する TLS 風トランスポートと、
//! EXTERNAL / PLAIN / ANONYMOUS の SASL 機構を提供する。
//! 外部ライブラリなしでセッション層を端から端まで動かすための参照実装。

mod sasl;
mod tls;

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use seclayer_crypto::CryptoError;

use crate::registry::{BackendContext, Provider, ALG_SASL, ALG_TLS};

pub use sasl::{BuiltinSaslBackend, MechanismInfo, MECHANISMS};
pub use tls::{PskTlsBackend, SUITE_PSK_AES128_OCB3};

/// 組み込みプロバイダーの名前
pub const BUILTIN_PROVIDER: &str = "builtin";

/// 組み込みプロバイダー
///
/// TLS バックエンドは全セッションで同じ PSK を使う。
/// SASL サーバーは登録済みのユーザー表で PLAIN を検証する。
#[derive(Clone)]
pub struct BuiltinProvider {
    psk: [u8; 16],
    users: BTreeMap<String, String>,
}

impl BuiltinProvider {
    pub fn new(psk: [u8; 16]) -> Self {
        BuiltinProvider {
            psk,
            users: BTreeMap::new(),
        }
    }

    /// Base64 の PSK から生成する
    ///
    /// # エラー
    /// PSK のデコードに失敗した場合
    pub fn from_base64_psk(psk_b64: &str) -> Result<Self, CryptoError> {
        seclayer_crypto::decode_base64_key(psk_b64).map(Self::new)
    }

    /// PLAIN で認証できるユーザーを追加する
    pub fn with_user(mut self, user: &str, password: &str) -> Self {
        self.users.insert(String::from(user), String::from(password));
        self
    }
}

impl Provider for BuiltinProvider {
    fn name(&self) -> &str {
        BUILTIN_PROVIDER
    }

    fn features(&self) -> Vec<String> {
        alloc::vec![String::from(ALG_TLS), String::from(ALG_SASL)]
    }

    fn create_context(&self, algorithm: &str) -> Option<BackendContext> {
        match algorithm {
            ALG_TLS => Some(BackendContext::Tls(Box::new(PskTlsBackend::new(self.psk)))),
            ALG_SASL => Some(BackendContext::Sasl(Box::new(BuiltinSaslBackend::new(
                self.users.clone(),
            )))),
            _ => None,
        }
    }
}

impl core::fmt::Debug for BuiltinProvider {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BuiltinProvider")
            .field("users", &self.users.len())
            .finish_non_exhaustive()
    }
}
