//! # seclayer-record
//!
//! 組み込みトランスポートのレコード層。
//!
//! ストリーム上の生バイト列をレコード単位に区切る。暗号化はしない
//! （本体の保護は `seclayer-crypto` が担当する）。
//!
//! ## Record の Wire Format
//!
//! ```text
//! [content_type: u8][length: u16 BE][body: length bytes]
//!
//! content_type:
//!   21 = Alert
//!   22 = Handshake
//!   23 = ApplicationData
//! ```

#![no_std]
extern crate alloc;

pub mod error;
pub mod record;

pub use error::RecordError;
pub use record::{chunk_payload, ContentType, Record, RecordReader, MAX_BODY_LEN, MAX_PLAINTEXT_LEN};
