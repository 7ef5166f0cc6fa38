//! トランスポートセキュリティセッション状態機械
//!
//! 4 本のバイトキューとハンドシェイク状態を管理し、
//! プロトコル処理はバックエンドに委譲する。
//!
//! ```text
//! write()          → plain_out  ─┐
//! write_incoming() → cipher_in  ─┴→ backend.update() ─┬→ cipher_out → read_outgoing()
//!                                                     └→ plain_in   → read()
//! ```
//!
//! ## 状態遷移
//!
//! ```text
//! Idle → Handshaking → Established → Closing → Closed
//!             │             │            │
//!             └─────────────┴────────────┴──→ Error（reset() まで終端）
//! ```

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;

use seclayer_stream::{AdvanceSlot, AdvanceTrigger, ByteQueue, ChangeNotifier, SecureStream};

use crate::backend::{SessionInfo, TlsBackend, TlsInput, TlsSetup, TlsStatus, TlsVersion};
use crate::cert::{
    Certificate, CertificateChain, CertificateCollection, IdentityResult, PrivateKey, Validity,
};
use crate::error::TlsError;

/// セッションの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsState {
    #[default]
    Idle,
    Handshaking,
    Established,
    Closing,
    Closed,
    Error,
}

/// 接続ごとの状態（reset() で Default に戻る）
#[derive(Debug, Default)]
struct Connection {
    state: TlsState,
    /// true → false に戻るのは reset() のみ
    handshaken: bool,
    /// reset() まで単調
    closing: bool,
    requested_host: String,
    host_mismatch: bool,
    peer_chain: CertificateChain,
    peer_validity: Validity,
    error: Option<TlsError>,
    info: Option<SessionInfo>,
    plain_in: ByteQueue,
    plain_out: ByteQueue,
    cipher_in: ByteQueue,
    cipher_out: ByteQueue,
    /// 前回の read_outgoing 以降に暗号化した平文バイト数
    encoded: usize,
}

/// TLS 系セッション
///
/// 資格情報（自分の証明書・鍵・信頼ストア・暗号スイート制約）は
/// reset() をまたいで保持される。
pub struct TlsSession {
    backend: Box<dyn TlsBackend>,
    local_chain: CertificateChain,
    local_key: Option<PrivateKey>,
    trusted: CertificateCollection,
    cipher_suites: Vec<String>,
    compression: bool,
    trigger: AdvanceTrigger,
    conn: Connection,
    slot: AdvanceSlot,
    notifier: ChangeNotifier,
}

impl TlsSession {
    /// バックエンドを指定して新しいセッションを生成する
    pub fn new(backend: Box<dyn TlsBackend>) -> Self {
        TlsSession {
            backend,
            local_chain: CertificateChain::new(),
            local_key: None,
            trusted: CertificateCollection::new(),
            cipher_suites: Vec::new(),
            compression: false,
            trigger: AdvanceTrigger::default(),
            conn: Connection::default(),
            slot: AdvanceSlot::new(),
            notifier: ChangeNotifier::new(),
        }
    }

    /// バッファ操作がアドバンスを予約するかを切り替える
    pub fn set_trigger(&mut self, trigger: AdvanceTrigger) {
        self.trigger = trigger;
    }

    pub fn trigger(&self) -> AdvanceTrigger {
        self.trigger
    }

    // ===== 資格情報・ポリシー =====

    /// 自分の証明書チェーンと秘密鍵を設定する
    pub fn set_certificate(&mut self, chain: CertificateChain, key: PrivateKey) {
        self.local_chain = chain;
        self.local_key = Some(key);
    }

    /// 信頼アンカーを設定する
    pub fn set_trusted_certificates(&mut self, trusted: CertificateCollection) {
        self.trusted = trusted;
    }

    /// 許可する暗号スイートを制限する（空 = バックエンドの既定）
    pub fn set_constraints(&mut self, cipher_suites: Vec<String>) {
        self.cipher_suites = cipher_suites;
    }

    pub fn set_compression_enabled(&mut self, enabled: bool) {
        self.compression = enabled;
    }

    pub fn supported_cipher_suites(&self) -> Vec<String> {
        self.backend.supported_cipher_suites()
    }

    pub fn can_compress(&self) -> bool {
        self.backend.can_compress()
    }

    // ===== ライフサイクル =====

    /// 接続状態を初期値に戻す
    ///
    /// バッファ・フラグ・ピア情報を破棄し、予約済みアドバンスを取り消す。
    /// 資格情報は保持する。
    pub fn reset(&mut self) {
        self.conn = Connection::default();
        self.backend.reset();
        self.slot.cancel();
        self.notifier.take_events();
        tracing::debug!("tls session reset");
    }

    /// クライアントとしてハンドシェイクを開始する
    ///
    /// # 引数
    /// - `host`: 接続先ホスト名（ピア証明書の照合に使う。空なら照合しない）
    ///
    /// # エラー
    /// - `TlsError::Terminal`: エラー状態（先に reset() が必要）
    /// - バックエンドが開始を拒否した場合はそのエラー。セッションは Idle のまま
    pub fn start_client(&mut self, host: &str) -> Result<(), TlsError> {
        self.prepare_start()?;
        self.conn.requested_host = String::from(host);

        let setup = self.setup(if host.is_empty() {
            None
        } else {
            Some(String::from(host))
        });
        let result = self.backend.start_client(setup);
        self.finish_start(result, "client")
    }

    /// サーバーとしてハンドシェイクを開始する
    ///
    /// # エラー
    /// `start_client` と同じ
    pub fn start_server(&mut self) -> Result<(), TlsError> {
        self.prepare_start()?;
        let setup = self.setup(None);
        let result = self.backend.start_server(setup);
        self.finish_start(result, "server")
    }

    /// close_notify を送ってクローズを開始する
    ///
    /// ハンドシェイク前・クローズ中は何もしない。
    pub fn close(&mut self) {
        if !self.conn.handshaken || self.conn.closing || self.conn.state != TlsState::Established {
            tracing::debug!(state = ?self.conn.state, "close ignored");
            return;
        }
        self.conn.closing = true;
        self.conn.state = TlsState::Closing;
        self.slot.schedule();
    }

    /// アドバンスを 1 回明示的に実行する
    pub fn update(&mut self) {
        // 明示的に進めた分の予約は使い切ったものとして扱う
        self.slot.cancel();
        if !matches!(
            self.conn.state,
            TlsState::Handshaking | TlsState::Established | TlsState::Closing
        ) {
            return;
        }

        self.update_begin();
        let completed = self.advance_once();
        // ハンドシェイク完了と同じサイクルで、待っていた平文を送り出す
        if completed && self.conn.state == TlsState::Established && !self.conn.plain_out.is_empty() {
            self.advance_once();
        }
        self.update_end();
    }

    // ===== 問い合わせ =====

    pub fn state(&self) -> TlsState {
        self.conn.state
    }

    pub fn error_code(&self) -> Option<TlsError> {
        self.conn.error
    }

    pub fn is_handshaken(&self) -> bool {
        self.conn.handshaken
    }

    pub fn is_closing(&self) -> bool {
        self.conn.closing
    }

    pub fn requested_host(&self) -> &str {
        &self.conn.requested_host
    }

    pub fn host_mismatch(&self) -> bool {
        self.conn.host_mismatch
    }

    pub fn peer_certificate_chain(&self) -> &CertificateChain {
        &self.conn.peer_chain
    }

    pub fn peer_certificate_validity(&self) -> Validity {
        self.conn.peer_validity
    }

    pub fn local_certificate_chain(&self) -> &CertificateChain {
        &self.local_chain
    }

    /// ピア識別の総合結果
    ///
    /// 証明書なし → 有効性 → ホスト名 の順に判定する。
    pub fn peer_identity_result(&self) -> IdentityResult {
        if self.conn.peer_chain.is_empty() {
            IdentityResult::NoCert
        } else if self.conn.peer_validity != Validity::Valid {
            IdentityResult::BadCert
        } else if self.conn.host_mismatch {
            IdentityResult::HostMismatch
        } else {
            IdentityResult::Valid
        }
    }

    pub fn version(&self) -> Option<TlsVersion> {
        self.info().map(|i| i.version)
    }

    pub fn cipher_suite(&self) -> &str {
        self.info().map(|i| i.cipher_suite.as_str()).unwrap_or("")
    }

    pub fn cipher_bits(&self) -> u32 {
        self.info().map(|i| i.cipher_bits).unwrap_or(0)
    }

    pub fn cipher_max_bits(&self) -> u32 {
        self.info().map(|i| i.cipher_max_bits).unwrap_or(0)
    }

    pub fn is_compressed(&self) -> bool {
        self.info().map(|i| i.compressed).unwrap_or(false)
    }

    // ===== Private メソッド =====

    fn info(&self) -> Option<&SessionInfo> {
        if self.conn.handshaken {
            self.conn.info.as_ref()
        } else {
            None
        }
    }

    fn setup(&self, server_name: Option<String>) -> TlsSetup {
        TlsSetup {
            trusted: self.trusted.clone(),
            local_chain: self.local_chain.clone(),
            local_key: self.local_key.clone(),
            cipher_suites: self.cipher_suites.clone(),
            compression: self.compression,
            server_name,
        }
    }

    fn prepare_start(&mut self) -> Result<(), TlsError> {
        if self.conn.state == TlsState::Error {
            tracing::warn!("start refused: session is in the error state");
            return Err(TlsError::Terminal);
        }
        self.reset();
        Ok(())
    }

    fn finish_start(&mut self, result: Result<(), TlsError>, role: &str) -> Result<(), TlsError> {
        match result {
            Ok(()) => {
                self.conn.state = TlsState::Handshaking;
                self.slot.schedule();
                tracing::debug!(role, host = %self.conn.requested_host, "tls handshake started");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(role, error = %e, "backend refused to start");
                self.conn = Connection::default();
                Err(e)
            }
        }
    }

    /// バックエンドを 1 回呼び出す
    ///
    /// # 戻り値
    /// このパスでハンドシェイクが完了した場合 `true`
    fn advance_once(&mut self) -> bool {
        let from_net = self.conn.cipher_in.take_all();
        let from_app = if self.conn.handshaken && !self.conn.closing {
            self.conn.plain_out.take_all()
        } else {
            Vec::new()
        };

        let out = self.backend.update(TlsInput {
            from_net: &from_net,
            from_app: &from_app,
            closing: self.conn.closing,
        });
        tracing::trace!(
            from_net = from_net.len(),
            from_app = from_app.len(),
            to_net = out.to_net.len(),
            to_app = out.to_app.len(),
            "tls advance"
        );

        self.conn.cipher_out.append(&out.to_net);
        self.conn.plain_in.append(&out.to_app);
        self.conn.encoded += out.encoded;

        match out.status {
            TlsStatus::Handshaking => false,
            TlsStatus::Established => {
                if self.conn.handshaken {
                    return false;
                }
                self.on_handshaken();
                true
            }
            TlsStatus::Closed => {
                self.conn.state = TlsState::Closed;
                tracing::debug!("tls session closed");
                false
            }
            TlsStatus::Failed(e) => {
                self.conn.state = TlsState::Error;
                self.conn.error = Some(e);
                self.slot.cancel();
                tracing::warn!(error = %e, "tls session failed");
                false
            }
        }
    }

    fn on_handshaken(&mut self) {
        self.conn.handshaken = true;
        if !self.conn.closing {
            self.conn.state = TlsState::Established;
        }
        self.conn.info = self.backend.session_info();
        self.conn.peer_chain = self.backend.peer_certificate_chain();
        self.conn.peer_validity = self.backend.peer_certificate_validity();
        self.conn.host_mismatch = match self.conn.peer_chain.primary() {
            Some(cert) if !self.conn.requested_host.is_empty() => {
                !cert.matches_hostname(&self.conn.requested_host)
            }
            _ => false,
        };
        tracing::debug!(
            suite = self.cipher_suite(),
            peer = self.conn.peer_chain.primary().map(Certificate::common_name).unwrap_or(""),
            "tls handshake complete"
        );
    }

    fn schedule_on_write(&mut self) {
        if self.trigger == AdvanceTrigger::OnWrite
            && matches!(
                self.conn.state,
                TlsState::Handshaking | TlsState::Established | TlsState::Closing
            )
        {
            self.slot.schedule();
        }
    }
}

impl SecureStream for TlsSession {
    fn bytes_available(&self) -> usize {
        self.conn.plain_in.len()
    }

    fn bytes_outgoing_available(&self) -> usize {
        self.conn.cipher_out.len()
    }

    fn ok(&self) -> bool {
        self.conn.state != TlsState::Error
    }

    fn is_closable(&self) -> bool {
        true
    }

    fn have_closed(&self) -> bool {
        self.conn.state == TlsState::Closed
    }

    fn close(&mut self) {
        TlsSession::close(self);
    }

    fn read_unprocessed(&mut self) -> Vec<u8> {
        let mut out = self.backend.take_unprocessed();
        out.extend(self.conn.cipher_in.take_all());
        out
    }

    fn write(&mut self, data: &[u8]) {
        self.update_begin();
        self.conn.plain_out.append(data);
        self.schedule_on_write();
        self.update_end();
    }

    fn read(&mut self) -> Vec<u8> {
        self.conn.plain_in.take_all()
    }

    fn write_incoming(&mut self, data: &[u8]) {
        self.update_begin();
        self.conn.cipher_in.append(data);
        self.schedule_on_write();
        self.update_end();
    }

    fn read_outgoing_counted(&mut self) -> (Vec<u8>, usize) {
        let data = self.conn.cipher_out.take_all();
        (data, core::mem::take(&mut self.conn.encoded))
    }

    fn run_scheduled(&mut self) -> bool {
        if !self.slot.take() {
            return false;
        }
        self.update();
        true
    }

    fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    fn notifier_mut(&mut self) -> &mut ChangeNotifier {
        &mut self.notifier
    }
}
