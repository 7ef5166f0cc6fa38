//! レコード Nonce 実装
//!
//! ## Nonce 構造（12バイト）
//! ```text
//! bytes[0..4]  = 0x00000000  (ゼロパディング)
//! bytes[4..12] = direction_seq as u64, big-endian
//! ```
//!
//! ストリーム上のレコードは順序どおり届くため、Nonce はワイヤに載せない。
//! 送受信それぞれが暗黙のシーケンス番号から同じ値を組み立てる。
//! セッション鍵はハンドシェイクごとに導出し直すので、先頭 4 バイトはゼロでよい。

/// レコード保護用の Nonce（12バイト）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordNonce([u8; 12]);

impl RecordNonce {
    /// direction ビット込みのシーケンス番号から Nonce を構築する
    ///
    /// # 例
    /// ```
    /// use seclayer_crypto::RecordNonce;
    /// let nonce = RecordNonce::new(42);
    /// assert_eq!(nonce.seq(), 42);
    /// ```
    pub fn new(direction_seq: u64) -> Self {
        let mut bytes = [0u8; 12];
        bytes[4..12].copy_from_slice(&direction_seq.to_be_bytes());
        RecordNonce(bytes)
    }

    /// シーケンス番号（direction ビット込み）を取得する
    pub fn seq(&self) -> u64 {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.0[4..12]);
        u64::from_be_bytes(buf)
    }

    /// 12 バイトの nonce データへの参照を返す
    pub fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }
}
