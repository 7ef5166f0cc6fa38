//! seclayer-tls エラー型

use thiserror::Error;

/// トランスポートセキュリティのエラーコード
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TlsError {
    /// 初期化失敗（設定不足・暗号スイートの不一致など）
    #[error("TLS initialization failed")]
    Init,
    /// 証明書チェーンと秘密鍵の組み合わせが不正
    #[error("Certificate and private key do not match")]
    CertKeyMismatch,
    /// ハンドシェイク失敗
    #[error("TLS handshake failed")]
    Handshake,
    /// レコードの暗号化・復号失敗
    #[error("TLS record protection failed")]
    Crypt,
    /// エラー状態のセッションに対する開始要求（reset が必要）
    #[error("Session is in the error state; reset it before starting again")]
    Terminal,
}
