//! PSK トランスポートバックエンド
//!
//! ## ハンドシェイク
//!
//! ```text
//! client                                         server
//!   [22] ClientHello{random_c, suites, certs} ──▶
//!                         ◀── [22] ServerHello{random_s, suite, certs}
//!                         ◀── [22] seal(Finished{random_c || random_s})
//!   [22] seal(Finished{random_c || random_s}) ──▶
//! ```
//!
//! Hello を交換した時点で両者は
//! `key = derive_session_key(psk, random_c, random_s)` を持つ。
//! 以降のレコードはすべて `RecordCipher` で保護される。
//! PSK が違えば Finished の復号に失敗する（`TlsError::Crypt`）。

use alloc::string::String;
use alloc::vec::Vec;

use seclayer_crypto::{derive_session_key, random_nonce, Direction, RecordCipher, RANDOM_LEN};
use seclayer_proto::{
    alert, handshake, Alert, CertificateEntry, ClientHello, Finished, Handshake, ServerHello,
    PROTOCOL_VERSION,
};
use seclayer_record::{chunk_payload, ContentType, Record, RecordReader};
use seclayer_tls::{
    Certificate, CertificateChain, SessionInfo, TlsBackend, TlsError, TlsInput, TlsSetup,
    TlsStatus, TlsUpdate, TlsVersion, Validity,
};

/// 唯一の暗号スイート
pub const SUITE_PSK_AES128_OCB3: &str = "PSK-AES128-OCB3";

const SUITE_BITS: u32 = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Phase {
    #[default]
    Idle,
    /// クライアント: 次の update で ClientHello を送る
    SendClientHello,
    AwaitClientHello,
    AwaitServerHello,
    AwaitFinished,
    Established,
    Closed,
    Failed(TlsError),
}

/// PSK で保護する TLS 風バックエンド
pub struct PskTlsBackend {
    psk: [u8; 16],
    server: bool,
    phase: Phase,
    setup: TlsSetup,
    /// 自分が受け入れる暗号スイート
    offered: Vec<String>,
    suite: String,
    reader: RecordReader,
    cipher: Option<RecordCipher>,
    client_random: [u8; RANDOM_LEN],
    server_random: [u8; RANDOM_LEN],
    peer_chain: CertificateChain,
    peer_validity: Validity,
    close_sent: bool,
}

impl PskTlsBackend {
    pub fn new(psk: [u8; 16]) -> Self {
        PskTlsBackend {
            psk,
            server: false,
            phase: Phase::Idle,
            setup: TlsSetup::default(),
            offered: Vec::new(),
            suite: String::new(),
            reader: RecordReader::new(),
            cipher: None,
            client_random: [0u8; RANDOM_LEN],
            server_random: [0u8; RANDOM_LEN],
            peer_chain: CertificateChain::new(),
            peer_validity: Validity::Unknown,
            close_sent: false,
        }
    }

    /// 開始時の共通検証
    fn prepare(&mut self, setup: TlsSetup, server: bool) -> Result<(), TlsError> {
        self.reset();

        if setup.local_chain.is_empty() != setup.local_key.is_none() {
            tracing::warn!("certificate chain and private key must be set together");
            return Err(TlsError::CertKeyMismatch);
        }
        if server && setup.local_chain.is_empty() {
            tracing::warn!("server requires a certificate chain");
            return Err(TlsError::Init);
        }

        let offered: Vec<String> = self
            .supported_cipher_suites()
            .into_iter()
            .filter(|s| setup.cipher_suites.is_empty() || setup.cipher_suites.contains(s))
            .collect();
        if offered.is_empty() {
            tracing::warn!(constraints = setup.cipher_suites.len(), "no usable cipher suite");
            return Err(TlsError::Init);
        }

        self.offered = offered;
        self.setup = setup;
        self.server = server;
        Ok(())
    }

    fn status(&self) -> TlsStatus {
        match self.phase {
            Phase::Established => TlsStatus::Established,
            Phase::Closed => TlsStatus::Closed,
            Phase::Failed(e) => TlsStatus::Failed(e),
            _ => TlsStatus::Handshaking,
        }
    }

    fn process(&mut self, input: TlsInput<'_>, out: &mut TlsUpdate) -> Result<(), TlsError> {
        match self.phase {
            Phase::Idle | Phase::Closed | Phase::Failed(_) => return Ok(()),
            Phase::SendClientHello => {
                self.send_client_hello(out)?;
                self.phase = Phase::AwaitServerHello;
            }
            _ => {}
        }

        self.reader.push(input.from_net);
        while !matches!(self.phase, Phase::Closed | Phase::Failed(_)) {
            let record = self.reader.next_record().map_err(|e| {
                tracing::warn!(error = %e, "malformed record");
                TlsError::Handshake
            })?;
            let Some(record) = record else {
                break;
            };
            self.handle_record(record, out)?;
        }

        if self.phase == Phase::Established {
            for chunk in chunk_payload(input.from_app) {
                let body = self.seal(ContentType::ApplicationData, chunk)?;
                push_record(out, ContentType::ApplicationData, body)?;
                out.encoded += chunk.len();
            }
            if input.closing && !self.close_sent {
                self.send_alert(Alert::close_notify(), out)?;
                self.close_sent = true;
                tracing::debug!("close_notify sent");
            }
        }
        Ok(())
    }

    fn handle_record(&mut self, record: Record, out: &mut TlsUpdate) -> Result<(), TlsError> {
        let content_type = record.content_type;
        let body = match self.cipher.as_mut() {
            Some(cipher) => cipher
                .open(content_type.as_u8(), &record.body)
                .map_err(|e| {
                    tracing::warn!(error = %e, "record authentication failed");
                    TlsError::Crypt
                })?,
            None => record.body,
        };

        match content_type {
            ContentType::Alert => self.on_alert(&body, out),
            ContentType::Handshake => self.on_handshake(&body, out),
            ContentType::ApplicationData => {
                if self.phase != Phase::Established {
                    tracing::warn!(phase = ?self.phase, "application data before handshake");
                    return Err(TlsError::Handshake);
                }
                out.to_app.extend_from_slice(&body);
                Ok(())
            }
        }
    }

    fn on_alert(&mut self, body: &[u8], out: &mut TlsUpdate) -> Result<(), TlsError> {
        let received = Alert::decode_from_bytes(body).map_err(|_| TlsError::Handshake)?;
        if !received.is_close_notify() {
            tracing::warn!(description = received.description, "fatal alert received");
            // 相手は既に切断しているので返信しない
            self.phase = Phase::Failed(TlsError::Handshake);
            return Ok(());
        }
        if self.phase != Phase::Established {
            return Err(TlsError::Handshake);
        }
        if !self.close_sent {
            self.send_alert(Alert::close_notify(), out)?;
            self.close_sent = true;
        }
        self.phase = Phase::Closed;
        Ok(())
    }

    fn on_handshake(&mut self, body: &[u8], out: &mut TlsUpdate) -> Result<(), TlsError> {
        let message = Handshake::decode_body(body).map_err(|e| {
            tracing::warn!(error = %e, "handshake decode failed");
            TlsError::Handshake
        })?;

        match (self.phase, message) {
            (Phase::AwaitClientHello, handshake::Body::ClientHello(hello)) => {
                self.on_client_hello(hello, out)
            }
            (Phase::AwaitServerHello, handshake::Body::ServerHello(hello)) => {
                self.on_server_hello(hello)
            }
            (Phase::AwaitFinished, handshake::Body::Finished(finished)) => {
                self.on_finished(finished, out)
            }
            (phase, _) => {
                tracing::warn!(?phase, "unexpected handshake message");
                Err(TlsError::Handshake)
            }
        }
    }

    fn send_client_hello(&mut self, out: &mut TlsUpdate) -> Result<(), TlsError> {
        self.client_random = random_nonce().map_err(|_| TlsError::Init)?;
        let hello = ClientHello {
            version: PROTOCOL_VERSION,
            random: self.client_random.to_vec(),
            server_name: self.setup.server_name.clone().unwrap_or_default(),
            cipher_suites: self.offered.clone(),
            certificates: to_entries(&self.setup.local_chain),
        };
        push_record(out, ContentType::Handshake, Handshake::client_hello(hello).encode_to_bytes())
    }

    /// サーバー: スイートを選び、ServerHello と Finished を返す
    fn on_client_hello(&mut self, hello: ClientHello, out: &mut TlsUpdate) -> Result<(), TlsError> {
        let Some(suite) = self.offered.iter().find(|s| hello.cipher_suites.contains(*s)).cloned() else {
            tracing::warn!(offered = hello.cipher_suites.len(), "no common cipher suite");
            return Err(TlsError::Handshake);
        };

        self.client_random = seclayer_proto::random_array(&hello.random).map_err(|_| TlsError::Handshake)?;
        self.server_random = random_nonce().map_err(|_| TlsError::Handshake)?;
        self.accept_peer(&hello.certificates);
        tracing::debug!(server_name = %hello.server_name, suite = %suite, "client hello accepted");

        let reply = ServerHello {
            version: PROTOCOL_VERSION,
            random: self.server_random.to_vec(),
            cipher_suite: suite.clone(),
            certificates: to_entries(&self.setup.local_chain),
        };
        self.suite = suite;
        // ServerHello は平文、Finished から暗号化する
        push_record(out, ContentType::Handshake, Handshake::server_hello(reply).encode_to_bytes())?;
        self.install_cipher(Direction::ToClient);

        let finished = Handshake::finished(self.verify_data()).encode_to_bytes();
        let body = self.seal(ContentType::Handshake, &finished)?;
        push_record(out, ContentType::Handshake, body)?;
        self.phase = Phase::AwaitFinished;
        Ok(())
    }

    /// クライアント: サーバーの選択を検証し、鍵を導出する
    fn on_server_hello(&mut self, hello: ServerHello) -> Result<(), TlsError> {
        if !self.offered.contains(&hello.cipher_suite) {
            tracing::warn!(suite = %hello.cipher_suite, "server chose a suite that was not offered");
            return Err(TlsError::Handshake);
        }
        self.server_random = seclayer_proto::random_array(&hello.random).map_err(|_| TlsError::Handshake)?;
        self.accept_peer(&hello.certificates);
        self.suite = hello.cipher_suite;
        self.install_cipher(Direction::ToServer);
        self.phase = Phase::AwaitFinished;
        Ok(())
    }

    fn on_finished(&mut self, finished: Finished, out: &mut TlsUpdate) -> Result<(), TlsError> {
        if finished.verify_data != self.verify_data() {
            tracing::warn!("finished verify_data mismatch");
            return Err(TlsError::Handshake);
        }
        if !self.server {
            let reply = Handshake::finished(self.verify_data()).encode_to_bytes();
            let body = self.seal(ContentType::Handshake, &reply)?;
            push_record(out, ContentType::Handshake, body)?;
        }
        self.phase = Phase::Established;
        tracing::debug!(server = self.server, suite = %self.suite, "psk handshake complete");
        Ok(())
    }

    fn install_cipher(&mut self, local: Direction) {
        let key = derive_session_key(&self.psk, &self.client_random, &self.server_random);
        self.cipher = Some(RecordCipher::new(key, local));
    }

    fn verify_data(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(RANDOM_LEN * 2);
        data.extend_from_slice(&self.client_random);
        data.extend_from_slice(&self.server_random);
        data
    }

    fn accept_peer(&mut self, entries: &[CertificateEntry]) {
        self.peer_chain = entries.iter().map(from_entry).collect();
        self.peer_validity = if self.peer_chain.iter().any(|c| self.setup.trusted.contains(c)) {
            Validity::Valid
        } else {
            Validity::Untrusted
        };
    }

    fn seal(&mut self, content_type: ContentType, data: &[u8]) -> Result<Vec<u8>, TlsError> {
        let cipher = self.cipher.as_mut().ok_or(TlsError::Handshake)?;
        cipher.seal(content_type.as_u8(), data).map_err(|e| {
            tracing::warn!(error = %e, "record sealing failed");
            TlsError::Crypt
        })
    }

    fn send_alert(&mut self, message: Alert, out: &mut TlsUpdate) -> Result<(), TlsError> {
        let mut body = message.encode_to_bytes();
        if self.cipher.is_some() {
            body = self.seal(ContentType::Alert, &body)?;
        }
        push_record(out, ContentType::Alert, body)
    }

    fn fail(&mut self, error: TlsError, out: &mut TlsUpdate) {
        if matches!(self.phase, Phase::Failed(_)) {
            return;
        }
        tracing::warn!(error = %error, phase = ?self.phase, "psk transport failed");
        let description = match error {
            TlsError::Crypt => alert::BAD_RECORD_MAC,
            _ => alert::HANDSHAKE_FAILURE,
        };
        if let Err(e) = self.send_alert(Alert::fatal(description), out) {
            tracing::debug!(error = %e, "fatal alert not sent");
        }
        self.phase = Phase::Failed(error);
    }
}

impl TlsBackend for PskTlsBackend {
    fn reset(&mut self) {
        *self = PskTlsBackend::new(self.psk);
    }

    fn supported_cipher_suites(&self) -> Vec<String> {
        alloc::vec![String::from(SUITE_PSK_AES128_OCB3)]
    }

    fn start_client(&mut self, setup: TlsSetup) -> Result<(), TlsError> {
        self.prepare(setup, false)?;
        self.phase = Phase::SendClientHello;
        Ok(())
    }

    fn start_server(&mut self, setup: TlsSetup) -> Result<(), TlsError> {
        self.prepare(setup, true)?;
        self.phase = Phase::AwaitClientHello;
        Ok(())
    }

    fn update(&mut self, input: TlsInput<'_>) -> TlsUpdate {
        let mut out = TlsUpdate::status(TlsStatus::Handshaking);
        if let Err(error) = self.process(input, &mut out) {
            self.fail(error, &mut out);
        }
        out.status = self.status();
        out
    }

    fn session_info(&self) -> Option<SessionInfo> {
        if !matches!(self.phase, Phase::Established | Phase::Closed) || self.suite.is_empty() {
            return None;
        }
        Some(SessionInfo {
            version: TlsVersion::Tls12,
            cipher_suite: self.suite.clone(),
            cipher_bits: SUITE_BITS,
            cipher_max_bits: SUITE_BITS,
            compressed: false,
        })
    }

    fn peer_certificate_chain(&self) -> CertificateChain {
        self.peer_chain.clone()
    }

    fn peer_certificate_validity(&self) -> Validity {
        self.peer_validity
    }

    fn take_unprocessed(&mut self) -> Vec<u8> {
        self.reader.take_remaining()
    }
}

fn push_record(out: &mut TlsUpdate, content_type: ContentType, body: Vec<u8>) -> Result<(), TlsError> {
    let record = Record::new(content_type, body).map_err(|_| TlsError::Handshake)?;
    out.to_net.extend_from_slice(&record.to_bytes());
    Ok(())
}

fn to_entries(chain: &CertificateChain) -> Vec<CertificateEntry> {
    chain
        .iter()
        .map(|c| CertificateEntry {
            common_name: String::from(c.common_name()),
            alt_names: c.alt_names().to_vec(),
            der: c.der().to_vec(),
        })
        .collect()
}

fn from_entry(entry: &CertificateEntry) -> Certificate {
    Certificate::new(entry.common_name.clone(), entry.alt_names.clone(), entry.der.clone())
}
