//! プロセス全体の設定
//!
//! サーバー側バックエンドに渡すアプリケーション名を保持する。
//! 一度だけ設定でき、未設定なら `DEFAULT_APP_NAME` を使う。

use alloc::boxed::Box;
use alloc::string::String;

use once_cell::race::OnceBox;

use crate::error::ConfigError;

/// 未設定時のアプリケーション名
pub const DEFAULT_APP_NAME: &str = "seclayer";

static APP_NAME: OnceBox<String> = OnceBox::new();

/// アプリケーション名を設定する
///
/// # エラー
/// - `ConfigError::AppNameAlreadySet`: 既に設定済み
pub fn init_app_name(name: &str) -> Result<(), ConfigError> {
    APP_NAME
        .set(Box::new(String::from(name)))
        .map_err(|_| ConfigError::AppNameAlreadySet)
}

/// 現在のアプリケーション名
pub fn app_name() -> &'static str {
    APP_NAME.get().map(String::as_str).unwrap_or(DEFAULT_APP_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    // グローバル状態を触るテストはこの 1 つだけにする
    #[test]
    fn test_app_name_set_once() {
        assert_eq!(init_app_name("mail-gateway"), Ok(()));
        assert_eq!(app_name(), "mail-gateway");
        assert_eq!(init_app_name("other"), Err(ConfigError::AppNameAlreadySet));
        assert_eq!(app_name(), "mail-gateway");
    }
}
