//! # seclayer-crypto
//!
//! 組み込み PSK トランスポート用の暗号プリミティブ
//!
//! セッション層は暗号計算をバックエンドに委譲する。このクレートは
//! 組み込みバックエンド（`seclayer-provider` の `PskTlsBackend`）が使う部品だけを持つ。
//! `no_std` + `alloc` 環境（WASM を含む）で動作する。
//!
//! ## レコード保護
//!
//! ```text
//! セッション鍵:
//!   key = AES-128_psk( AES-128_psk(client_random) XOR server_random )
//!
//! Nonce（12バイト、ワイヤには載せない）:
//!   bytes[0..4]  = 0x00000000
//!   bytes[4..12] = direction_seq as u64, big-endian
//!
//! direction_seq:
//!   MSB (bit 63) = direction (TO_SERVER=0, TO_CLIENT=1)
//!
//! 暗号化レコード本体:
//!   [ciphertext][tag: 16bytes]   AAD = content type (1 byte)
//! ```

#![no_std]
extern crate alloc;

mod cipher;
mod error;
mod nonce;

pub use cipher::{RecordCipher, TAG_LEN};
pub use error::CryptoError;
pub use nonce::RecordNonce;

/// ハンドシェイク乱数の長さ（バイト）
pub const RANDOM_LEN: usize = 16;

/// レコードの方向（TO_SERVER or TO_CLIENT）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// クライアント → サーバー (bit 63 = 0)
    ToServer = 0,
    /// サーバー → クライアント (bit 63 = 1)
    ToClient = 1,
}

impl Direction {
    /// seq の MSB から方向を判定する
    pub fn from_seq(direction_seq: u64) -> Self {
        if direction_seq >> 63 == 0 {
            Direction::ToServer
        } else {
            Direction::ToClient
        }
    }

    /// direction を seq の MSB に適用する
    pub fn apply_to_seq(&self, seq: u64) -> u64 {
        match self {
            Direction::ToServer => seq & !(1u64 << 63),
            Direction::ToClient => seq | (1u64 << 63),
        }
    }

    /// 逆方向
    pub fn peer(&self) -> Self {
        match self {
            Direction::ToServer => Direction::ToClient,
            Direction::ToClient => Direction::ToServer,
        }
    }
}

/// Base64 文字列（22文字）を 16 バイトの PSK にデコードする
///
/// フォーマット: URL-safe / パディングなし（例: `4NeCCgvZFe2RnPgrcU1PQw`）
pub fn decode_base64_key(key_b64: &str) -> Result<[u8; 16], CryptoError> {
    use base64::Engine as _;
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(key_b64)
        .map_err(|_| CryptoError::InvalidBase64)?;

    if bytes.len() != 16 {
        return Err(CryptoError::InvalidKeyLength);
    }

    let mut key = [0u8; 16];
    key.copy_from_slice(&bytes);
    Ok(key)
}

/// ハンドシェイク乱数を生成する
///
/// WASM では getrandom の `js` feature 経由で `crypto.getRandomValues` を使う。
pub fn random_nonce() -> Result<[u8; RANDOM_LEN], CryptoError> {
    let mut buf = [0u8; RANDOM_LEN];
    getrandom::getrandom(&mut buf).map_err(|_| CryptoError::RandomUnavailable)?;
    Ok(buf)
}

/// PSK と双方の乱数からセッション鍵を導出する
///
/// 2 ブロックの AES-CBC-MAC。引数の順序を入れ替えると別の鍵になる。
pub fn derive_session_key(
    psk: &[u8; 16],
    client_random: &[u8; RANDOM_LEN],
    server_random: &[u8; RANDOM_LEN],
) -> [u8; 16] {
    use aes::cipher::{BlockEncrypt, KeyInit};

    let cipher = aes::Aes128::new(psk.into());
    let mut block = aes::Block::clone_from_slice(client_random);
    cipher.encrypt_block(&mut block);
    for (b, s) in block.iter_mut().zip(server_random.iter()) {
        *b ^= s;
    }
    cipher.encrypt_block(&mut block);

    let mut key = [0u8; 16];
    key.copy_from_slice(&block);
    key
}
