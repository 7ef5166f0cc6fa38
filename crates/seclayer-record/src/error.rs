//! seclayer-record エラー型

use thiserror::Error;

/// レコード層のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// 未知の content type
    #[error("Unknown record content type: {0}")]
    UnknownContentType(u8),
    /// 本体長が上限を超えている
    #[error("Record body too long: {0} bytes")]
    BodyTooLong(usize),
}
