//! Record の組み立てと逐次読み取り
//!
//! ## Record Wire Format
//! ```text
//! [content_type: u8 (1 byte)]
//! [length: u16 BE (2 bytes)]
//! [body: variable]
//! ```
//!
//! ストリームは任意の位置で分断されて届くため、`RecordReader` は
//! ヘッダーと本体が揃うまでバイトを保持する。

use alloc::vec::Vec;

use crate::error::RecordError;

/// 1 レコードに載せる平文の最大長
pub const MAX_PLAINTEXT_LEN: usize = 16384;

/// 本体の最大長（平文 + 暗号オーバーヘッドの余裕分）
pub const MAX_BODY_LEN: usize = MAX_PLAINTEXT_LEN + 256;

/// レコードの種別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Alert = 21,
    Handshake = 22,
    ApplicationData = 23,
}

impl ContentType {
    /// ワイヤ上の値
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for ContentType {
    type Error = RecordError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            21 => Ok(ContentType::Alert),
            22 => Ok(ContentType::Handshake),
            23 => Ok(ContentType::ApplicationData),
            other => Err(RecordError::UnknownContentType(other)),
        }
    }
}

/// 1 レコード
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub content_type: ContentType,
    pub body: Vec<u8>,
}

impl Record {
    /// ヘッダー長（content_type: 1 + length: 2）
    pub const HEADER_LEN: usize = 3;

    /// レコードを生成する
    ///
    /// # エラー
    /// - `RecordError::BodyTooLong`: 本体が `MAX_BODY_LEN` を超える
    pub fn new(content_type: ContentType, body: Vec<u8>) -> Result<Self, RecordError> {
        if body.len() > MAX_BODY_LEN {
            return Err(RecordError::BodyTooLong(body.len()));
        }
        Ok(Record { content_type, body })
    }

    /// Wire Format に変換する
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(Self::HEADER_LEN + self.body.len());
        bytes.push(self.content_type.as_u8());
        // new() で上限を確認済みなので u16 に収まる
        bytes.extend_from_slice(&(self.body.len() as u16).to_be_bytes());
        bytes.extend_from_slice(&self.body);
        bytes
    }
}

/// ストリームからレコードを逐次取り出す
#[derive(Debug, Default, Clone)]
pub struct RecordReader {
    /// まだレコードにならない受信バイト
    pending: Vec<u8>,
}

impl RecordReader {
    pub fn new() -> Self {
        RecordReader {
            pending: Vec::new(),
        }
    }

    /// 受信バイトを追加する
    pub fn push(&mut self, data: &[u8]) {
        self.pending.extend_from_slice(data);
    }

    /// 完成したレコードを 1 つ取り出す
    ///
    /// # 戻り値
    /// - `Ok(Some(record))`: レコードが 1 つ揃った
    /// - `Ok(None)`: まだバイトが足りない
    ///
    /// # エラー
    /// ヘッダーが不正な場合。不正なバイトは保持されたまま残る。
    pub fn next_record(&mut self) -> Result<Option<Record>, RecordError> {
        if self.pending.len() < Record::HEADER_LEN {
            return Ok(None);
        }

        let content_type = ContentType::try_from(self.pending[0])?;
        let len = u16::from_be_bytes([self.pending[1], self.pending[2]]) as usize;
        if len > MAX_BODY_LEN {
            return Err(RecordError::BodyTooLong(len));
        }

        let total = Record::HEADER_LEN + len;
        if self.pending.len() < total {
            return Ok(None);
        }

        let body = self.pending[Record::HEADER_LEN..total].to_vec();
        self.pending.drain(..total);
        Ok(Some(Record { content_type, body }))
    }

    /// 保持中のバイト数
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// 保持中のバイトをすべて取り出す（未処理データの回収用）
    pub fn take_remaining(&mut self) -> Vec<u8> {
        core::mem::take(&mut self.pending)
    }
}

/// 平文を `MAX_PLAINTEXT_LEN` ごとに分割する
///
/// 空の入力からは何も生成しない。
pub fn chunk_payload(data: &[u8]) -> impl Iterator<Item = &[u8]> {
    data.chunks(MAX_PLAINTEXT_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_wire_format() {
        let record = Record::new(ContentType::Handshake, alloc::vec![1, 2, 3]).unwrap();
        assert_eq!(record.to_bytes(), alloc::vec![22, 0, 3, 1, 2, 3]);
    }

    #[test]
    fn test_body_too_long() {
        let body = alloc::vec![0u8; MAX_BODY_LEN + 1];
        assert_eq!(
            Record::new(ContentType::ApplicationData, body),
            Err(RecordError::BodyTooLong(MAX_BODY_LEN + 1))
        );
    }

    #[test]
    fn test_reader_split_delivery() {
        let bytes = Record::new(ContentType::ApplicationData, alloc::vec![9u8; 10])
            .unwrap()
            .to_bytes();
        let mut reader = RecordReader::new();

        // 1 バイトずつ届いても最後に 1 レコードになる
        for (i, b) in bytes.iter().enumerate() {
            reader.push(&[*b]);
            let got = reader.next_record().unwrap();
            if i + 1 < bytes.len() {
                assert!(got.is_none(), "{} バイト目ではまだ揃わない", i);
            } else {
                let record = got.unwrap();
                assert_eq!(record.content_type, ContentType::ApplicationData);
                assert_eq!(record.body, alloc::vec![9u8; 10]);
            }
        }
        assert_eq!(reader.pending_len(), 0);
    }

    #[test]
    fn test_reader_multiple_records_in_one_push() {
        let mut bytes = Record::new(ContentType::Handshake, alloc::vec![1]).unwrap().to_bytes();
        bytes.extend(Record::new(ContentType::Alert, alloc::vec![2, 3]).unwrap().to_bytes());

        let mut reader = RecordReader::new();
        reader.push(&bytes);

        assert_eq!(reader.next_record().unwrap().unwrap().content_type, ContentType::Handshake);
        assert_eq!(reader.next_record().unwrap().unwrap().body, alloc::vec![2, 3]);
        assert_eq!(reader.next_record().unwrap(), None);
    }

    #[test]
    fn test_reader_unknown_type() {
        let mut reader = RecordReader::new();
        reader.push(&[99, 0, 0]);
        assert_eq!(reader.next_record(), Err(RecordError::UnknownContentType(99)));
        // 不正なバイトは残る
        assert_eq!(reader.take_remaining(), alloc::vec![99, 0, 0]);
    }

    #[test]
    fn test_take_remaining_partial() {
        let mut reader = RecordReader::new();
        reader.push(&[23, 0, 5, 1, 2]);
        assert_eq!(reader.next_record().unwrap(), None);
        assert_eq!(reader.take_remaining(), alloc::vec![23, 0, 5, 1, 2]);
        assert_eq!(reader.pending_len(), 0);
    }

    #[test]
    fn test_chunk_payload() {
        let data = alloc::vec![0u8; MAX_PLAINTEXT_LEN * 2 + 1];
        let sizes: Vec<usize> = chunk_payload(&data).map(|c| c.len()).collect();
        assert_eq!(sizes, alloc::vec![MAX_PLAINTEXT_LEN, MAX_PLAINTEXT_LEN, 1]);
        assert_eq!(chunk_payload(&[]).count(), 0);
    }
}
