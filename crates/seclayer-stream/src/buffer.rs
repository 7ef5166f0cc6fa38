//! バイトキュー実装

use alloc::vec::Vec;

/// 末尾追加・一括取り出しのバイトキュー
///
/// セッションが保持する 4 本（TLS）/ 2 本（SASL）のバッファはすべてこの型。
///
/// ## 不変条件
/// - 追加は常に末尾（`append`）
/// - 取り出しは常にキュー全体を一度に（`take_all`）
///
/// 部分的な取り出しは提供しない。単一オーナーの操作列に対して
/// 取り出しがアトミックであることだけが要件。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ByteQueue {
    /// 未取り出しのバイト列
    buf: Vec<u8>,
    /// 追加された総バイト数（統計用）
    total_appended: u64,
    /// 取り出された総バイト数（統計用）
    total_drained: u64,
}

impl ByteQueue {
    /// 空のキューを生成する
    pub fn new() -> Self {
        ByteQueue {
            buf: Vec::new(),
            total_appended: 0,
            total_drained: 0,
        }
    }

    /// 末尾にバイト列を追加する
    pub fn append(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
        self.total_appended += data.len() as u64;
    }

    /// キュー全体を取り出して空にする
    ///
    /// データがない場合は空の Vec を返す。
    pub fn take_all(&mut self) -> Vec<u8> {
        let data = core::mem::take(&mut self.buf);
        self.total_drained += data.len() as u64;
        data
    }

    /// 未取り出しのバイト数
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// 空かどうか
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// 取り出さずに中身を参照する（診断用）
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// 追加された総バイト数
    pub fn total_appended(&self) -> u64 {
        self.total_appended
    }

    /// 取り出された総バイト数
    pub fn total_drained(&self) -> u64 {
        self.total_drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_take_all() {
        let mut q = ByteQueue::new();
        q.append(b"hello");
        q.append(b" world");

        assert_eq!(q.len(), 11);
        assert_eq!(q.take_all(), b"hello world");

        // 取り出し後は空
        assert!(q.is_empty());
        assert!(q.take_all().is_empty());
    }

    #[test]
    fn test_empty_take_returns_empty() {
        let mut q = ByteQueue::new();
        assert!(q.take_all().is_empty());
        assert_eq!(q.total_drained(), 0);
    }

    #[test]
    fn test_stats() {
        let mut q = ByteQueue::new();
        q.append(b"abc");
        q.append(b"de");
        let _ = q.take_all();
        q.append(b"f");

        assert_eq!(q.total_appended(), 6);
        assert_eq!(q.total_drained(), 5);
        assert_eq!(q.as_slice(), b"f");
    }
}
