//! # seclayer-sasl
//!
//! SASL 系の認証ネゴシエーションセッション。
//!
//! 機構の計算はバックエンド（`SaslBackend`）に委譲する。このクレートは
//! セキュリティ制約の保持、ネゴシエーションの状態遷移、アプリへのシグナル、
//! 確立後のセキュリティレイヤーのバッファを担当する。
//!
//! ## キーコンセプト
//!
//! - **SSF**: Security Strength Factor。セキュリティレイヤーの強度（ビット相当）
//! - **機構**: PLAIN / EXTERNAL / ANONYMOUS などの認証方式
//! - **シグナル**: ネゴシエーションの進行をアプリに知らせる（`SaslSignal`）
//! - **イベント**: バッファの変化通知（`seclayer_stream::StreamEvent`）

#![no_std]
extern crate alloc;

pub mod backend;
pub mod config;
pub mod constraints;
pub mod error;
pub mod session;

pub use backend::{AuthCondition, ClientParams, ClientSendMode, ParamsRequest, SaslBackend, SaslStep};
pub use constraints::{CoreProps, HostPort, SecurityFlags, SecurityLevel, SecurityProps};
pub use error::{ConfigError, SaslError};
pub use session::{Role, SaslSession, SaslSignal, SaslState};
