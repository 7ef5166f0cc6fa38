//! seclayer-proto エラー型

use thiserror::Error;

/// Protobuf デコード・検証のエラー
#[derive(Debug, Error)]
pub enum ProtoError {
    /// Protobuf デコード失敗
    #[error("Proto decode failed: {0}")]
    DecodeFailed(prost::DecodeError),
    /// プロトコルバージョン不一致
    #[error("Invalid protocol version: {0} (expected {expected})", expected = super::PROTOCOL_VERSION)]
    InvalidProtocolVersion(u32),
    /// Handshake メッセージに本体がない
    #[error("Handshake message has no body")]
    EmptyHandshake,
    /// 乱数の長さが不正
    #[error("Invalid handshake random length: {0}")]
    InvalidRandom(usize),
}
