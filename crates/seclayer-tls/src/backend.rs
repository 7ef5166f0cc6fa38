//! TLS バックエンドの契約
//!
//! 暗号計算・証明書検証・レコード処理はすべてバックエンドが担当する。
//! セッションはバイトの受け渡しと状態遷移だけを行う。

use alloc::string::String;
use alloc::vec::Vec;

use crate::cert::{CertificateChain, CertificateCollection, PrivateKey, Validity};
use crate::error::TlsError;

/// ネゴシエートされたプロトコルバージョン
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsVersion {
    Ssl3,
    Tls1,
    Tls11,
    Tls12,
    Tls13,
    Dtls1,
}

impl TlsVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            TlsVersion::Ssl3 => "SSLv3",
            TlsVersion::Tls1 => "TLSv1",
            TlsVersion::Tls11 => "TLSv1.1",
            TlsVersion::Tls12 => "TLSv1.2",
            TlsVersion::Tls13 => "TLSv1.3",
            TlsVersion::Dtls1 => "DTLSv1",
        }
    }
}

/// ハンドシェイク完了後のパラメータ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub version: TlsVersion,
    pub cipher_suite: String,
    pub cipher_bits: u32,
    pub cipher_max_bits: u32,
    pub compressed: bool,
}

/// ハンドシェイク開始時にバックエンドへ渡す設定
#[derive(Debug, Clone, Default)]
pub struct TlsSetup {
    /// 信頼アンカー
    pub trusted: CertificateCollection,
    /// 自分の証明書チェーン（空 = なし）
    pub local_chain: CertificateChain,
    /// 自分の秘密鍵
    pub local_key: Option<PrivateKey>,
    /// 許可する暗号スイート（空 = バックエンドの既定）
    pub cipher_suites: Vec<String>,
    /// 圧縮を有効にするか
    pub compression: bool,
    /// クライアントが要求するサーバー名（サーバー側は None）
    pub server_name: Option<String>,
}

/// 1 回のアドバンスでバックエンドに渡す入力
#[derive(Debug, Clone, Copy)]
pub struct TlsInput<'a> {
    /// ネットワークから届いた生バイト
    pub from_net: &'a [u8],
    /// 送信する平文（ハンドシェイク完了前は常に空）
    pub from_app: &'a [u8],
    /// クローズが要求されているか
    pub closing: bool,
}

/// アドバンス後のバックエンドの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsStatus {
    Handshaking,
    Established,
    Closed,
    Failed(TlsError),
}

/// 1 回のアドバンスの出力
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsUpdate {
    /// ネットワークへ送るバイト
    pub to_net: Vec<u8>,
    /// アプリへ渡す平文
    pub to_app: Vec<u8>,
    /// 今回暗号化した平文のバイト数
    pub encoded: usize,
    pub status: TlsStatus,
}

impl TlsUpdate {
    /// 出力なしの更新
    pub fn status(status: TlsStatus) -> Self {
        TlsUpdate {
            to_net: Vec::new(),
            to_app: Vec::new(),
            encoded: 0,
            status,
        }
    }
}

/// TLS プロトコルエンジン
pub trait TlsBackend {
    /// 接続ごとの状態を破棄する
    fn reset(&mut self);

    /// サポートする暗号スイート名
    fn supported_cipher_suites(&self) -> Vec<String>;

    /// 圧縮に対応しているか
    fn can_compress(&self) -> bool {
        false
    }

    /// クライアントとしてハンドシェイクを開始する
    ///
    /// # エラー
    /// 設定が不正な場合（`Init` / `CertKeyMismatch`）
    fn start_client(&mut self, setup: TlsSetup) -> Result<(), TlsError>;

    /// サーバーとしてハンドシェイクを開始する
    fn start_server(&mut self, setup: TlsSetup) -> Result<(), TlsError>;

    /// 入力を消費し、出力と状態を返す
    fn update(&mut self, input: TlsInput<'_>) -> TlsUpdate;

    /// ハンドシェイク完了後のパラメータ
    fn session_info(&self) -> Option<SessionInfo>;

    fn peer_certificate_chain(&self) -> CertificateChain;

    fn peer_certificate_validity(&self) -> Validity;

    /// 受信済みだがレコードとして処理していないバイトを取り出す
    fn take_unprocessed(&mut self) -> Vec<u8>;
}
