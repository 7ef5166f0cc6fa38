//! # seclayer-proto
//!
//! 組み込み PSK トランスポートのハンドシェイクメッセージ（Protobuf）と
//! エンコード/デコードユーティリティ。
//!
//! ## メッセージの流れ
//!
//! ```text
//! client                                   server
//!   Handshake{ClientHello}   ───────────▶
//!                            ◀───────────  Handshake{ServerHello}
//!                            ◀───────────  Handshake{Finished}      (暗号化)
//!   Handshake{Finished}      ───────────▶                           (暗号化)
//!   ApplicationData          ◀──────────▶  ApplicationData          (暗号化)
//!   Alert{close_notify}      ◀──────────▶  Alert{close_notify}      (暗号化)
//! ```
//!
//! メッセージは derive で直接定義する（.proto からのコード生成は行わない）。

#![no_std]
extern crate alloc;

use alloc::string::String;
use alloc::vec::Vec;

pub mod error;

pub use error::ProtoError;

/// 組み込みハンドシェイクのプロトコルバージョン
pub const PROTOCOL_VERSION: u32 = 1;

/// Hello の乱数長（バイト）
pub const RANDOM_LEN: usize = 16;

/// Alert の level / description 定数（値は TLS と同じ）
pub mod alert {
    /// 警告レベル
    pub const LEVEL_WARNING: u32 = 1;
    /// 致命的レベル
    pub const LEVEL_FATAL: u32 = 2;

    /// 正常なクローズ通知
    pub const CLOSE_NOTIFY: u32 = 0;
    /// 想定外のメッセージ
    pub const UNEXPECTED_MESSAGE: u32 = 10;
    /// レコードの認証失敗
    pub const BAD_RECORD_MAC: u32 = 20;
    /// ネゴシエーション不成立
    pub const HANDSHAKE_FAILURE: u32 = 40;
    /// Finished の検証失敗
    pub const DECRYPT_ERROR: u32 = 51;
}

/// 証明書の要約（パース済みの識別情報 + 生 DER）
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CertificateEntry {
    #[prost(string, tag = "1")]
    pub common_name: String,
    #[prost(string, repeated, tag = "2")]
    pub alt_names: Vec<String>,
    #[prost(bytes = "vec", tag = "3")]
    pub der: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClientHello {
    #[prost(uint32, tag = "1")]
    pub version: u32,
    #[prost(bytes = "vec", tag = "2")]
    pub random: Vec<u8>,
    #[prost(string, tag = "3")]
    pub server_name: String,
    #[prost(string, repeated, tag = "4")]
    pub cipher_suites: Vec<String>,
    /// クライアント証明書チェーン（任意）
    #[prost(message, repeated, tag = "5")]
    pub certificates: Vec<CertificateEntry>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ServerHello {
    #[prost(uint32, tag = "1")]
    pub version: u32,
    #[prost(bytes = "vec", tag = "2")]
    pub random: Vec<u8>,
    #[prost(string, tag = "3")]
    pub cipher_suite: String,
    #[prost(message, repeated, tag = "4")]
    pub certificates: Vec<CertificateEntry>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Finished {
    /// client_random || server_random
    #[prost(bytes = "vec", tag = "1")]
    pub verify_data: Vec<u8>,
}

/// ハンドシェイクレコードの本体
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Handshake {
    #[prost(oneof = "handshake::Body", tags = "1, 2, 3")]
    pub body: ::core::option::Option<handshake::Body>,
}

pub mod handshake {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Body {
        #[prost(message, tag = "1")]
        ClientHello(super::ClientHello),
        #[prost(message, tag = "2")]
        ServerHello(super::ServerHello),
        #[prost(message, tag = "3")]
        Finished(super::Finished),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Alert {
    #[prost(uint32, tag = "1")]
    pub level: u32,
    #[prost(uint32, tag = "2")]
    pub description: u32,
}

impl Handshake {
    /// ClientHello を包む
    pub fn client_hello(hello: ClientHello) -> Self {
        Handshake {
            body: Some(handshake::Body::ClientHello(hello)),
        }
    }

    /// ServerHello を包む
    pub fn server_hello(hello: ServerHello) -> Self {
        Handshake {
            body: Some(handshake::Body::ServerHello(hello)),
        }
    }

    /// Finished を包む
    pub fn finished(verify_data: Vec<u8>) -> Self {
        Handshake {
            body: Some(handshake::Body::Finished(Finished { verify_data })),
        }
    }

    /// バイト列にエンコードする
    pub fn encode_to_bytes(&self) -> Vec<u8> {
        use prost::Message;
        self.encode_to_vec()
    }

    /// バイト列からデコードし、本体を取り出す
    ///
    /// # エラー
    /// - `ProtoError::DecodeFailed`: protobuf デコード失敗
    /// - `ProtoError::EmptyHandshake`: 本体なし
    /// - `ProtoError::InvalidProtocolVersion`: Hello のバージョン不一致
    /// - `ProtoError::InvalidRandom`: Hello の乱数長が不正
    pub fn decode_body(bytes: &[u8]) -> Result<handshake::Body, ProtoError> {
        use prost::Message;
        let msg = Handshake::decode(bytes).map_err(ProtoError::DecodeFailed)?;
        let body = msg.body.ok_or(ProtoError::EmptyHandshake)?;

        let (version, random) = match &body {
            handshake::Body::ClientHello(h) => (h.version, h.random.len()),
            handshake::Body::ServerHello(h) => (h.version, h.random.len()),
            handshake::Body::Finished(_) => return Ok(body),
        };
        if version != PROTOCOL_VERSION {
            return Err(ProtoError::InvalidProtocolVersion(version));
        }
        if random != RANDOM_LEN {
            return Err(ProtoError::InvalidRandom(random));
        }
        Ok(body)
    }
}

impl Alert {
    /// close_notify（警告レベル）
    pub fn close_notify() -> Self {
        Alert {
            level: alert::LEVEL_WARNING,
            description: alert::CLOSE_NOTIFY,
        }
    }

    /// 致命的 Alert
    pub fn fatal(description: u32) -> Self {
        Alert {
            level: alert::LEVEL_FATAL,
            description,
        }
    }

    /// close_notify か
    pub fn is_close_notify(&self) -> bool {
        self.description == alert::CLOSE_NOTIFY
    }

    /// バイト列にエンコードする
    pub fn encode_to_bytes(&self) -> Vec<u8> {
        use prost::Message;
        self.encode_to_vec()
    }

    /// バイト列からデコードする
    pub fn decode_from_bytes(bytes: &[u8]) -> Result<Self, ProtoError> {
        use prost::Message;
        Alert::decode(bytes).map_err(ProtoError::DecodeFailed)
    }
}

/// Hello の乱数フィールドを固定長配列に変換する
pub fn random_array(random: &[u8]) -> Result<[u8; RANDOM_LEN], ProtoError> {
    if random.len() != RANDOM_LEN {
        return Err(ProtoError::InvalidRandom(random.len()));
    }
    let mut out = [0u8; RANDOM_LEN];
    out.copy_from_slice(random);
    Ok(out)
}
