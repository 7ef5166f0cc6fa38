//! # seclayer-provider
//!
//! バックエンドの供給元（プロバイダー）と、その選択。
//!
//! セッション（`seclayer_tls::TlsSession` / `seclayer_sasl::SaslSession`）は
//! バックエンドのトレイトにしか依存しない。このクレートはアルゴリズム名と
//! プロバイダー名からバックエンドを選び、セッションを組み立てる。
//!
//! ## 組み込みプロバイダー
//!
//! - `tls`: PSK + AES-128-OCB3 でレコードを保護するハンドシェイク
//! - `sasl`: EXTERNAL / PLAIN / ANONYMOUS

#![no_std]
extern crate alloc;

pub mod builtin;
pub mod error;
pub mod registry;

pub use builtin::{BuiltinProvider, BuiltinSaslBackend, PskTlsBackend, BUILTIN_PROVIDER};
pub use error::ProviderError;
pub use registry::{BackendContext, Provider, ProviderRegistry, ALG_SASL, ALG_TLS};
