//! プロバイダーの登録と選択
//!
//! アルゴリズム名（`"tls"` / `"sasl"`）と任意のプロバイダー名から
//! バックエンドを生成する。名前を省略した場合は登録順で最初に対応したものを使う。

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;

use seclayer_sasl::{SaslBackend, SaslSession};
use seclayer_tls::{TlsBackend, TlsSession};

use crate::error::ProviderError;

/// トランスポートセキュリティのアルゴリズム名
pub const ALG_TLS: &str = "tls";
/// 認証ネゴシエーションのアルゴリズム名
pub const ALG_SASL: &str = "sasl";

/// プロバイダーが生成するバックエンド
pub enum BackendContext {
    Tls(Box<dyn TlsBackend>),
    Sasl(Box<dyn SaslBackend>),
}

/// バックエンドの供給元
pub trait Provider {
    fn name(&self) -> &str;

    /// 対応するアルゴリズム名
    fn features(&self) -> Vec<String>;

    /// 対応していなければ None
    fn create_context(&self, algorithm: &str) -> Option<BackendContext>;
}

/// 登録済みプロバイダーの一覧
#[derive(Default)]
pub struct ProviderRegistry {
    providers: Vec<Box<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        ProviderRegistry {
            providers: Vec::new(),
        }
    }

    /// プロバイダーを登録する
    ///
    /// # エラー
    /// - `ProviderError::DuplicateName`: 同名のプロバイダーが登録済み
    pub fn register(&mut self, provider: Box<dyn Provider>) -> Result<(), ProviderError> {
        if self.providers.iter().any(|p| p.name() == provider.name()) {
            return Err(ProviderError::DuplicateName(String::from(provider.name())));
        }
        tracing::debug!(name = provider.name(), "provider registered");
        self.providers.push(provider);
        Ok(())
    }

    /// 登録順のプロバイダー名
    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// バックエンドを生成する
    ///
    /// # エラー
    /// - `ProviderError::NoProvider`: 対応するプロバイダーがない
    pub fn create(&self, algorithm: &str, provider: Option<&str>) -> Result<BackendContext, ProviderError> {
        self.providers
            .iter()
            .filter(|p| provider.map_or(true, |name| p.name() == name))
            .filter(|p| p.features().iter().any(|f| f == algorithm))
            .find_map(|p| p.create_context(algorithm))
            .ok_or_else(|| {
                tracing::warn!(algorithm, provider, "no provider available");
                ProviderError::NoProvider {
                    algorithm: String::from(algorithm),
                    provider: provider.map(String::from),
                }
            })
    }

    pub fn create_tls(&self, provider: Option<&str>) -> Result<Box<dyn TlsBackend>, ProviderError> {
        match self.create(ALG_TLS, provider)? {
            BackendContext::Tls(backend) => Ok(backend),
            BackendContext::Sasl(_) => Err(no_provider(ALG_TLS, provider)),
        }
    }

    pub fn create_sasl(&self, provider: Option<&str>) -> Result<Box<dyn SaslBackend>, ProviderError> {
        match self.create(ALG_SASL, provider)? {
            BackendContext::Sasl(backend) => Ok(backend),
            BackendContext::Tls(_) => Err(no_provider(ALG_SASL, provider)),
        }
    }

    /// 選択したバックエンドで TLS セッションを生成する
    pub fn tls_session(&self, provider: Option<&str>) -> Result<TlsSession, ProviderError> {
        self.create_tls(provider).map(TlsSession::new)
    }

    /// 選択したバックエンドで SASL セッションを生成する
    pub fn sasl_session(&self, provider: Option<&str>) -> Result<SaslSession, ProviderError> {
        self.create_sasl(provider).map(SaslSession::new)
    }
}

fn no_provider(algorithm: &str, provider: Option<&str>) -> ProviderError {
    ProviderError::NoProvider {
        algorithm: String::from(algorithm),
        provider: provider.map(String::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::BuiltinProvider;
    use alloc::string::ToString;

    /// 何も生成しないプロバイダー
    struct Empty;

    impl Provider for Empty {
        fn name(&self) -> &str {
            "empty"
        }
        fn features(&self) -> Vec<String> {
            alloc::vec![ALG_TLS.to_string()]
        }
        fn create_context(&self, _algorithm: &str) -> Option<BackendContext> {
            None
        }
    }

    #[test]
    fn test_empty_registry_has_no_provider() {
        let registry = ProviderRegistry::new();
        assert_eq!(
            registry.create_tls(None).err(),
            Some(ProviderError::NoProvider {
                algorithm: "tls".to_string(),
                provider: None
            })
        );
    }

    #[test]
    fn test_builtin_creates_both() {
        let mut registry = ProviderRegistry::new();
        registry.register(Box::new(BuiltinProvider::new([0u8; 16]))).unwrap();

        assert!(registry.create_tls(None).is_ok());
        assert!(registry.create_sasl(Some("builtin")).is_ok());
        assert!(registry.tls_session(None).is_ok());
        assert!(registry.sasl_session(None).is_ok());
        assert!(registry.create("x509", None).is_err());
    }

    #[test]
    fn test_named_provider_selection() {
        let mut registry = ProviderRegistry::new();
        registry.register(Box::new(Empty)).unwrap();
        registry.register(Box::new(BuiltinProvider::new([0u8; 16]))).unwrap();
        assert_eq!(registry.names(), alloc::vec!["empty", "builtin"]);

        // empty は生成に失敗するので次のプロバイダーが使われる
        assert!(registry.create_tls(None).is_ok());
        // 名前指定なら empty だけが候補
        assert!(matches!(
            registry.create_tls(Some("empty")),
            Err(ProviderError::NoProvider { provider: Some(_), .. })
        ));
        assert!(registry.create_tls(Some("missing")).is_err());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = ProviderRegistry::new();
        registry.register(Box::new(Empty)).unwrap();
        assert_eq!(
            registry.register(Box::new(Empty)),
            Err(ProviderError::DuplicateName("empty".to_string()))
        );
    }
}
