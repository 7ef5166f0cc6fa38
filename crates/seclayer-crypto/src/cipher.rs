//! AES-128-OCB3 レコード保護
//!
//! 組み込み PSK トランスポートの暗号化済みレコード（Finished / アプリデータ / Alert）を扱う。

use alloc::vec::Vec;

use aead::{KeyInit, Payload};
use aes::Aes128;
use ocb3::Ocb3;

use crate::error::CryptoError;
use crate::nonce::RecordNonce;
use crate::Direction;

/// AES-128-OCB3 (12バイト nonce, 16バイト tag) の型エイリアス
type Aes128Ocb3 = Ocb3<Aes128>;

/// 認証タグ長（バイト）
pub const TAG_LEN: usize = 16;

/// direction ビットを除いたシーケンス番号の上限
const SEQ_LIMIT: u64 = 1u64 << 63;

/// 双方向レコード暗号
///
/// 送信・受信それぞれの暗黙シーケンス番号を持つ。
/// レコードの content type を AAD として認証する。
pub struct RecordCipher {
    cipher: Aes128Ocb3,
    /// 自分が送信する方向
    local: Direction,
    /// 次の送信シーケンス番号
    send_seq: u64,
    /// 次に受信を期待するシーケンス番号
    recv_seq: u64,
}

impl RecordCipher {
    /// セッション鍵と送信方向から初期化する
    pub fn new(key: [u8; 16], local: Direction) -> Self {
        RecordCipher {
            cipher: Aes128Ocb3::new((&key).into()),
            local,
            send_seq: 0,
            recv_seq: 0,
        }
    }

    /// レコード本体を暗号化する
    ///
    /// # 戻り値
    /// `ciphertext || tag`（平文長 + 16 バイト）
    ///
    /// # エラー
    /// - `CryptoError::SequenceExhausted`: 送信シーケンス番号を使い切った
    /// - `CryptoError::EncryptionFailed`: AEAD 暗号化失敗
    pub fn seal(&mut self, content_type: u8, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if self.send_seq >= SEQ_LIMIT {
            return Err(CryptoError::SequenceExhausted);
        }
        let nonce = RecordNonce::new(self.local.apply_to_seq(self.send_seq));

        use aead::Aead;
        let sealed = self
            .cipher
            .encrypt(
                nonce.as_bytes().into(),
                Payload {
                    msg: plaintext,
                    aad: &[content_type],
                },
            )
            .map_err(|_| CryptoError::EncryptionFailed)?;

        self.send_seq += 1;
        Ok(sealed)
    }

    /// 相手から届いたレコード本体を復号する
    ///
    /// 失敗した場合、受信シーケンス番号は進まない。
    ///
    /// # エラー
    /// - `CryptoError::RecordTooShort`: 認証タグ長未満
    /// - `CryptoError::DecryptionFailed`: 認証タグ検証失敗（改ざん・鍵不一致・順序違い）
    pub fn open(&mut self, content_type: u8, sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if sealed.len() < TAG_LEN {
            return Err(CryptoError::RecordTooShort);
        }
        if self.recv_seq >= SEQ_LIMIT {
            return Err(CryptoError::SequenceExhausted);
        }
        let nonce = RecordNonce::new(self.local.peer().apply_to_seq(self.recv_seq));

        use aead::Aead;
        let plaintext = self
            .cipher
            .decrypt(
                nonce.as_bytes().into(),
                Payload {
                    msg: sealed,
                    aad: &[content_type],
                },
            )
            .map_err(|_| CryptoError::DecryptionFailed)?;

        self.recv_seq += 1;
        Ok(plaintext)
    }

    /// 次の送信シーケンス番号（テスト用）
    pub fn send_seq(&self) -> u64 {
        self.send_seq
    }

    /// 次の受信シーケンス番号（テスト用）
    pub fn recv_seq(&self) -> u64 {
        self.recv_seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(key: [u8; 16]) -> (RecordCipher, RecordCipher) {
        (
            RecordCipher::new(key, Direction::ToServer),
            RecordCipher::new(key, Direction::ToClient),
        )
    }

    #[test]
    fn test_seal_open_both_directions() {
        let (mut client, mut server) = pair([0u8; 16]);

        let sealed = client.seal(23, b"hello server").unwrap();
        assert_eq!(sealed.len(), 12 + TAG_LEN);
        assert_eq!(server.open(23, &sealed).unwrap(), b"hello server");

        let sealed = server.seal(23, b"hello client").unwrap();
        assert_eq!(client.open(23, &sealed).unwrap(), b"hello client");
    }

    #[test]
    fn test_seq_increments() {
        let (mut client, _) = pair([1u8; 16]);
        assert_eq!(client.send_seq(), 0);
        client.seal(23, b"").unwrap();
        client.seal(23, b"").unwrap();
        assert_eq!(client.send_seq(), 2);
    }

    #[test]
    fn test_content_type_is_authenticated() {
        let (mut client, mut server) = pair([2u8; 16]);
        let sealed = client.seal(23, b"data").unwrap();

        // content type を書き換えると認証失敗
        assert_eq!(server.open(21, &sealed), Err(CryptoError::DecryptionFailed));
        assert_eq!(server.recv_seq(), 0);
    }

    #[test]
    fn test_reordered_record_fails() {
        let (mut client, mut server) = pair([3u8; 16]);
        let first = client.seal(23, b"first").unwrap();
        let second = client.seal(23, b"second").unwrap();

        // 2 番目を先に開くと Nonce が合わない
        assert!(server.open(23, &second).is_err());
        assert_eq!(server.open(23, &first).unwrap(), b"first");
        assert_eq!(server.open(23, &second).unwrap(), b"second");
    }

    #[test]
    fn test_reflected_record_fails() {
        let (mut client, _) = pair([4u8; 16]);
        let mut client_rx = RecordCipher::new([4u8; 16], Direction::ToServer);

        // 自分が送ったレコードを自分宛てとして受け取っても開けない
        let sealed = client.seal(23, b"echo").unwrap();
        assert!(client_rx.open(23, &sealed).is_err());
    }

    #[test]
    fn test_wrong_key_fails() {
        let mut client = RecordCipher::new([5u8; 16], Direction::ToServer);
        let mut server = RecordCipher::new([6u8; 16], Direction::ToClient);
        let sealed = client.seal(23, b"secret").unwrap();
        assert_eq!(server.open(23, &sealed), Err(CryptoError::DecryptionFailed));
    }

    #[test]
    fn test_too_short_fails() {
        let (_, mut server) = pair([0u8; 16]);
        assert_eq!(server.open(23, &[0u8; 10]), Err(CryptoError::RecordTooShort));
    }
}
