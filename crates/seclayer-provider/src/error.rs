//! seclayer-provider エラー型

use alloc::string::String;

use thiserror::Error;

/// プロバイダー選択のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// 要求を満たすプロバイダーがない
    #[error("No provider supports '{algorithm}'")]
    NoProvider { algorithm: String, provider: Option<String> },
    /// 同名のプロバイダーが登録済み
    #[error("Provider '{0}' is already registered")]
    DuplicateName(String),
}
