//! # seclayer-tls
//!
//! TLS 系のトランスポートセキュリティセッション。
//!
//! ハンドシェイク・レコード処理はバックエンド（`TlsBackend`）に委譲し、
//! このクレートはバイトキューの受け渡し、状態遷移、ピア識別の判定、
//! 変化通知を担当する。
//!
//! ## 使い方
//!
//! ```text
//! let mut tls = TlsSession::new(backend);
//! tls.start_client("example.com")?;
//! loop {                               // ホストの tick
//!     tls.run_scheduled();
//!     for ev in tls.take_events() { ... read() / read_outgoing() ... }
//! }
//! ```

#![no_std]
extern crate alloc;

pub mod backend;
pub mod cert;
pub mod error;
pub mod session;

pub use backend::{SessionInfo, TlsBackend, TlsInput, TlsSetup, TlsStatus, TlsUpdate, TlsVersion};
pub use cert::{
    Certificate, CertificateChain, CertificateCollection, IdentityResult, PrivateKey, Validity,
};
pub use error::TlsError;
pub use session::{TlsSession, TlsState};
