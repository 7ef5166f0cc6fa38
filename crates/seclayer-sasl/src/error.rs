//! seclayer-sasl エラー型

use thiserror::Error;

/// 認証ネゴシエーションのエラーコード
///
/// 失敗理由の詳細は `AuthCondition` で別途報告される。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SaslError {
    /// 開始できなかった（候補なし・ポリシー不成立・設定不足）
    #[error("SASL initialization failed")]
    Init,
    /// ネゴシエーション失敗
    #[error("SASL negotiation failed")]
    Handshake,
    /// セキュリティレイヤーの encode / decode 失敗
    #[error("SASL security layer failed")]
    Crypt,
    /// エラー状態のセッションに対する開始要求（reset が必要）
    #[error("Session is in the error state; reset it before starting again")]
    Terminal,
}

/// プロセス全体の設定エラー
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// アプリケーション名は一度しか設定できない
    #[error("Application name is already set")]
    AppNameAlreadySet,
}
