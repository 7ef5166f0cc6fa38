//! 暗号エラー型

use thiserror::Error;

/// 暗号操作のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// 鍵の長さが不正（16バイト以外）
    #[error("Invalid key length (expected 16 bytes)")]
    InvalidKeyLength,
    /// Base64 デコードに失敗
    #[error("Invalid Base64 encoding")]
    InvalidBase64,
    /// 暗号化に失敗
    #[error("Encryption failed")]
    EncryptionFailed,
    /// 復号に失敗（認証タグ検証失敗を含む）
    #[error("Decryption failed (authentication tag mismatch)")]
    DecryptionFailed,
    /// レコードが短すぎる（認証タグ分に満たない）
    #[error("Record too short")]
    RecordTooShort,
    /// シーケンス番号を使い切った
    #[error("Record sequence number exhausted")]
    SequenceExhausted,
    /// 乱数生成に失敗
    #[error("Random number generation failed")]
    RandomUnavailable,
}
