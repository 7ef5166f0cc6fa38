//! 認証ネゴシエーションセッション状態機械
//!
//! ## 状態遷移
//!
//! ```text
//! Idle ──start_client / start_server──▶ Negotiating(role) ──Success──▶ Established
//!                                             │
//!                                             └──Failed──▶ Error（reset() まで終端）
//! ```
//!
//! ## ネゴシエーションの流れ（クライアント）
//!
//! ```text
//! start_client()          → 予約 → client_first_step → ClientStarted シグナル
//! put_step(challenge)     → 予約 → next_step         → NextStep / Authenticated
//! NeedParams シグナル     → set_username() 等 → continue_after_params() → try_again
//! ```
//!
//! サーバーは start_server() で機構一覧を返し、put_server_first_step() から進む。
//! AuthCheck シグナルで止まり、continue_after_auth_check() で再開する。

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;

use seclayer_stream::{AdvanceSlot, AdvanceTrigger, ByteQueue, ChangeNotifier, SecureStream};

use crate::backend::{AuthCondition, ClientParams, ClientSendMode, ParamsRequest, SaslBackend, SaslStep};
use crate::config;
use crate::constraints::{CoreProps, HostPort, SecurityFlags, SecurityLevel, SecurityProps};
use crate::error::SaslError;

/// セッションの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaslState {
    #[default]
    Idle,
    Negotiating,
    Established,
    Error,
}

/// この試行での役割（1 試行に 1 回だけ設定される）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    #[default]
    Unset,
    Client,
    Server,
}

/// アプリケーションへのネゴシエーション通知
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaslSignal {
    /// クライアントの機構が決まった
    ClientStarted {
        mechanism: String,
        initial: Option<Vec<u8>>,
    },
    /// 相手に送るトークン
    NextStep(Vec<u8>),
    /// 資格情報を設定して continue_after_params() を呼ぶ
    NeedParams(ParamsRequest),
    /// 認証 ID を確認して continue_after_auth_check() を呼ぶ
    AuthCheck { user: String, authzid: String },
    Authenticated,
}

/// 次のアドバンスで実行するバックエンド呼び出し
#[derive(Debug, Clone)]
enum PendingOp {
    ClientFirst,
    ServerFirst {
        mechanism: String,
        client_init: Option<Vec<u8>>,
    },
    Step(Vec<u8>),
    TryAgain,
}

/// ステップが中断している理由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Suspend {
    Params,
    AuthCheck,
}

/// 試行ごとの状態（reset() で Default に戻る）
#[derive(Debug, Default)]
struct Attempt {
    state: SaslState,
    role: Role,
    first_step_done: bool,
    pending: Option<PendingOp>,
    suspended: Option<Suspend>,
    error: Option<SaslError>,
    condition: Option<AuthCondition>,
    mechanism: String,
    ssf: u32,
    negotiation_in: ByteQueue,
    negotiation_out: ByteQueue,
    /// 確立前に渡されたアプリ側データ
    held_app: ByteQueue,
    /// 確立前に届いたネットワーク側データ
    held_net: ByteQueue,
    /// 前回の read_outgoing 以降に encode した平文バイト数
    encoded: usize,
    signals: Vec<SaslSignal>,
}

/// 制約・エンドポイント・資格情報（reset() で Default に戻る）
#[derive(Default)]
struct Policy {
    flags: SecurityFlags,
    ssf_min: u32,
    ssf_max: u32,
    external_auth_id: String,
    external_ssf: u32,
    local: Option<HostPort>,
    remote: Option<HostPort>,
    app_name: Option<String>,
    params: ClientParams,
}

/// SASL 系セッション
///
/// 開始操作は試行の状態だけを作り直す。reset() はポリシーと資格情報も初期値に戻す。
pub struct SaslSession {
    backend: Box<dyn SaslBackend>,
    policy: Policy,
    trigger: AdvanceTrigger,
    attempt: Attempt,
    slot: AdvanceSlot,
    notifier: ChangeNotifier,
}

impl SaslSession {
    pub fn new(backend: Box<dyn SaslBackend>) -> Self {
        SaslSession {
            backend,
            policy: Policy::default(),
            trigger: AdvanceTrigger::default(),
            attempt: Attempt::default(),
            slot: AdvanceSlot::new(),
            notifier: ChangeNotifier::new(),
        }
    }

    /// バッファ操作がアドバンスを予約するかを切り替える
    pub fn set_trigger(&mut self, trigger: AdvanceTrigger) {
        self.trigger = trigger;
    }

    // ===== ポリシー =====

    /// 制約フラグと SSF の範囲を設定する（`ssf_max` = 0 は上限なし）
    pub fn set_constraints(&mut self, flags: SecurityFlags, ssf_min: u32, ssf_max: u32) {
        if self.policy_locked("set_constraints") {
            return;
        }
        self.policy.flags = flags;
        self.policy.ssf_min = ssf_min;
        self.policy.ssf_max = ssf_max;
    }

    /// 制約フラグと名前付きの SSF 下限を設定する
    pub fn set_constraints_level(&mut self, flags: SecurityFlags, level: SecurityLevel) {
        self.set_constraints(flags, level.min_ssf(), SecurityLevel::MAX_SSF);
    }

    pub fn set_external_auth_id(&mut self, auth_id: &str) {
        if self.policy_locked("set_external_auth_id") {
            return;
        }
        self.policy.external_auth_id = String::from(auth_id);
    }

    pub fn set_external_ssf(&mut self, ssf: u32) {
        if self.policy_locked("set_external_ssf") {
            return;
        }
        self.policy.external_ssf = ssf;
    }

    /// ローカルのエンドポイント（`port` が None なら未設定）
    pub fn set_local_addr(&mut self, addr: &str, port: Option<u16>) {
        self.policy.local = HostPort::new(addr, port);
    }

    /// リモートのエンドポイント（`port` が None なら未設定）
    pub fn set_remote_addr(&mut self, addr: &str, port: Option<u16>) {
        self.policy.remote = HostPort::new(addr, port);
    }

    /// このセッションだけアプリケーション名を上書きする
    pub fn set_application_name(&mut self, name: &str) {
        self.policy.app_name = Some(String::from(name));
    }

    /// 現在のポリシー
    pub fn security_props(&self) -> SecurityProps {
        SecurityProps {
            flags: self.policy.flags,
            ssf_min: self.policy.ssf_min,
            ssf_max: self.policy.ssf_max,
            external_auth_id: self.policy.external_auth_id.clone(),
            external_ssf: self.policy.external_ssf,
        }
    }

    // ===== 資格情報 =====

    pub fn set_username(&mut self, username: &str) {
        self.policy.params.username = Some(String::from(username));
        self.backend.set_client_params(&self.policy.params);
    }

    pub fn set_authzid(&mut self, authzid: &str) {
        self.policy.params.authzid = Some(String::from(authzid));
        self.backend.set_client_params(&self.policy.params);
    }

    pub fn set_password(&mut self, password: &str) {
        self.policy.params.password = Some(String::from(password));
        self.backend.set_client_params(&self.policy.params);
    }

    pub fn set_realm(&mut self, realm: &str) {
        self.policy.params.realm = Some(String::from(realm));
        self.backend.set_client_params(&self.policy.params);
    }

    // ===== ライフサイクル =====

    /// セッションを生成直後の状態に戻す
    ///
    /// 試行の状態に加えて、制約・外部認証・エンドポイント・アプリケーション名・
    /// 資格情報も破棄する。
    pub fn reset(&mut self) {
        self.clear_attempt();
        self.policy = Policy::default();
        self.backend.set_client_params(&self.policy.params);
        tracing::debug!("sasl session reset");
    }

    /// クライアントとしてネゴシエーションを開始する
    ///
    /// # 引数
    /// - `mechanisms`: サーバーが提示した機構の一覧
    /// - `mode`: 初期レスポンスを送るか
    ///
    /// # エラー
    /// - `SaslError::Terminal`: エラー状態（先に reset() が必要）
    /// - `SaslError::Init`: 候補が空、またはポリシーを満たす機構がない。
    ///   理由は `auth_condition()`。セッションは Idle のまま
    pub fn start_client(
        &mut self,
        service: &str,
        host: &str,
        mechanisms: &[String],
        mode: ClientSendMode,
    ) -> Result<(), SaslError> {
        self.prepare_start()?;
        if mechanisms.is_empty() {
            tracing::warn!("sasl client start refused: no candidate mechanisms");
            self.attempt.condition = Some(AuthCondition::NoMechanism);
            return Err(SaslError::Init);
        }

        self.forward_props(service, host);
        self.backend.set_client_params(&self.policy.params);
        if !self.backend.client_start(mechanisms, mode) {
            let condition = self.backend.auth_error().unwrap_or(AuthCondition::NoMechanism);
            tracing::warn!(?condition, "sasl client start refused by backend");
            self.attempt = Attempt::default();
            self.attempt.condition = Some(condition);
            return Err(SaslError::Init);
        }

        self.attempt.role = Role::Client;
        self.attempt.state = SaslState::Negotiating;
        self.schedule(PendingOp::ClientFirst);
        tracing::debug!(service, host, "sasl client started");
        Ok(())
    }

    /// サーバーとしてネゴシエーションを開始する
    ///
    /// # 戻り値
    /// クライアントに提示する機構の一覧
    ///
    /// # エラー
    /// `start_client` と同じ
    pub fn start_server(
        &mut self,
        service: &str,
        host: &str,
        realm: Option<&str>,
    ) -> Result<Vec<String>, SaslError> {
        self.prepare_start()?;
        self.forward_props(service, host);

        let app_name = match &self.policy.app_name {
            Some(name) => name.as_str(),
            None => config::app_name(),
        };
        let Some(mechanisms) = self.backend.server_start(realm, app_name) else {
            let condition = self.backend.auth_error().unwrap_or(AuthCondition::NoMechanism);
            tracing::warn!(?condition, "sasl server start refused by backend");
            self.attempt = Attempt::default();
            self.attempt.condition = Some(condition);
            return Err(SaslError::Init);
        };

        self.attempt.role = Role::Server;
        self.attempt.state = SaslState::Negotiating;
        tracing::debug!(service, host, offered = mechanisms.len(), "sasl server started");
        Ok(mechanisms)
    }

    /// サーバー: クライアントが選んだ機構と初期レスポンスを渡す
    pub fn put_server_first_step(&mut self, mechanism: &str, client_init: Option<&[u8]>) {
        if self.attempt.role != Role::Server
            || self.attempt.state != SaslState::Negotiating
            || self.attempt.first_step_done
        {
            tracing::warn!(role = ?self.attempt.role, "put_server_first_step ignored");
            return;
        }
        self.schedule(PendingOp::ServerFirst {
            mechanism: String::from(mechanism),
            client_init: client_init.map(<[u8]>::to_vec),
        });
    }

    /// 相手から届いたトークンを渡す
    pub fn put_step(&mut self, data: &[u8]) {
        if self.attempt.state != SaslState::Negotiating || !self.attempt.first_step_done {
            tracing::warn!(state = ?self.attempt.state, "put_step ignored");
            return;
        }
        self.schedule(PendingOp::Step(data.to_vec()));
    }

    /// NeedParams で中断したステップを再開する
    pub fn continue_after_params(&mut self) {
        self.resume(Suspend::Params);
    }

    /// AuthCheck で中断したステップを再開する
    pub fn continue_after_auth_check(&mut self) {
        self.resume(Suspend::AuthCheck);
    }

    /// 予約済みの操作を明示的に 1 回実行する
    pub fn update(&mut self) {
        // 明示的に進めた分の予約は使い切ったものとして扱う
        self.slot.cancel();
        let Some(op) = self.attempt.pending.take() else {
            return;
        };
        if self.attempt.state != SaslState::Negotiating {
            return;
        }

        self.update_begin();
        let step = match op {
            PendingOp::ClientFirst => self.backend.client_first_step(),
            PendingOp::ServerFirst {
                mechanism,
                client_init,
            } => {
                self.attempt.mechanism = mechanism.clone();
                self.backend.server_first_step(&mechanism, client_init.as_deref())
            }
            PendingOp::Step(data) => self.backend.next_step(&data),
            PendingOp::TryAgain => self.backend.try_again(),
        };
        self.apply_step(step);
        self.update_end();
    }

    // ===== 問い合わせ =====

    pub fn state(&self) -> SaslState {
        self.attempt.state
    }

    pub fn role(&self) -> Role {
        self.attempt.role
    }

    pub fn error_code(&self) -> Option<SaslError> {
        self.attempt.error
    }

    /// 確立したセキュリティレイヤーの SSF（確立前は 0）
    pub fn ssf(&self) -> u32 {
        if self.attempt.state == SaslState::Established {
            self.attempt.ssf
        } else {
            0
        }
    }

    pub fn auth_condition(&self) -> Option<AuthCondition> {
        self.attempt.condition
    }

    pub fn mechanism(&self) -> &str {
        &self.attempt.mechanism
    }

    /// 配送待ちのシグナルをすべて取り出す
    pub fn take_signals(&mut self) -> Vec<SaslSignal> {
        core::mem::take(&mut self.attempt.signals)
    }

    // ===== Private メソッド =====

    fn policy_locked(&self, setter: &str) -> bool {
        let locked = self.attempt.role != Role::Unset;
        if locked {
            tracing::warn!(setter, "policy change ignored until reset");
        }
        locked
    }

    fn prepare_start(&mut self) -> Result<(), SaslError> {
        if self.attempt.state == SaslState::Error {
            tracing::warn!("start refused: session is in the error state");
            return Err(SaslError::Terminal);
        }
        self.clear_attempt();
        Ok(())
    }

    /// 試行の状態だけを初期値に戻す（ポリシーは保持）
    fn clear_attempt(&mut self) {
        self.attempt = Attempt::default();
        self.backend.reset();
        self.slot.cancel();
        self.notifier.take_events();
    }

    fn forward_props(&mut self, service: &str, host: &str) {
        let core = CoreProps {
            service: String::from(service),
            host: String::from(host),
            local: self.policy.local.clone(),
            remote: self.policy.remote.clone(),
        };
        self.backend.set_core_props(&core);
        let security = self.security_props();
        self.backend.set_security_props(&security);
    }

    fn schedule(&mut self, op: PendingOp) {
        self.attempt.pending = Some(op);
        self.slot.schedule();
    }

    fn resume(&mut self, reason: Suspend) {
        if self.attempt.suspended != Some(reason) || self.attempt.state != SaslState::Negotiating {
            tracing::warn!(?reason, "continue ignored: step is not suspended for this reason");
            return;
        }
        self.attempt.suspended = None;
        self.schedule(PendingOp::TryAgain);
    }

    fn apply_step(&mut self, step: SaslStep) {
        match step {
            SaslStep::ClientStarted(initial) => {
                self.attempt.first_step_done = true;
                self.attempt.mechanism = self.backend.mechanism();
                tracing::debug!(mechanism = %self.attempt.mechanism, "sasl mechanism selected");
                self.attempt.signals.push(SaslSignal::ClientStarted {
                    mechanism: self.attempt.mechanism.clone(),
                    initial,
                });
            }
            SaslStep::Continue(token) => {
                self.attempt.first_step_done = true;
                self.attempt.signals.push(SaslSignal::NextStep(token));
            }
            SaslStep::NeedParams(request) => {
                self.attempt.suspended = Some(Suspend::Params);
                self.attempt.signals.push(SaslSignal::NeedParams(request));
            }
            SaslStep::AuthCheck { user, authzid } => {
                self.attempt.first_step_done = true;
                self.attempt.suspended = Some(Suspend::AuthCheck);
                self.attempt.signals.push(SaslSignal::AuthCheck { user, authzid });
            }
            SaslStep::Success => {
                self.attempt.first_step_done = true;
                self.attempt.state = SaslState::Established;
                self.attempt.ssf = self.backend.security();
                let mechanism = self.backend.mechanism();
                if !mechanism.is_empty() {
                    self.attempt.mechanism = mechanism;
                }
                tracing::debug!(mechanism = %self.attempt.mechanism, ssf = self.attempt.ssf, "sasl authenticated");
                self.attempt.signals.push(SaslSignal::Authenticated);
                self.flush_held();
            }
            SaslStep::Failed(condition) => self.fail(SaslError::Handshake, Some(condition)),
        }
    }

    fn fail(&mut self, error: SaslError, condition: Option<AuthCondition>) {
        tracing::warn!(error = %error, ?condition, "sasl session failed");
        self.attempt.state = SaslState::Error;
        self.attempt.error = Some(error);
        if condition.is_some() {
            self.attempt.condition = condition;
        }
        self.attempt.pending = None;
        self.slot.cancel();
    }

    /// 確立前に保留していたデータをセキュリティレイヤーに通す
    fn flush_held(&mut self) {
        let app = self.attempt.held_app.take_all();
        let net = self.attempt.held_net.take_all();
        self.encode_app(&app);
        self.decode_net(&net);
    }

    fn encode_app(&mut self, data: &[u8]) {
        if data.is_empty() || self.attempt.state != SaslState::Established {
            return;
        }
        match self.backend.encode(data) {
            Ok(out) => {
                self.attempt.negotiation_out.append(&out);
                self.attempt.encoded += data.len();
            }
            Err(e) => self.fail(e, None),
        }
    }

    fn decode_net(&mut self, data: &[u8]) {
        if data.is_empty() || self.attempt.state != SaslState::Established {
            return;
        }
        match self.backend.decode(data) {
            Ok(out) => self.attempt.negotiation_in.append(&out),
            Err(e) => self.fail(e, None),
        }
    }
}

impl SecureStream for SaslSession {
    fn bytes_available(&self) -> usize {
        self.attempt.negotiation_in.len()
    }

    fn bytes_outgoing_available(&self) -> usize {
        self.attempt.negotiation_out.len()
    }

    fn ok(&self) -> bool {
        self.attempt.state != SaslState::Error
    }

    /// 確立後はセキュリティレイヤーに直接通し、確立前は保留する
    fn write(&mut self, data: &[u8]) {
        self.update_begin();
        if self.attempt.state == SaslState::Established {
            self.encode_app(data);
        } else {
            self.attempt.held_app.append(data);
            if self.trigger == AdvanceTrigger::OnWrite && self.attempt.pending.is_some() {
                self.slot.schedule();
            }
        }
        self.update_end();
    }

    fn read(&mut self) -> Vec<u8> {
        self.attempt.negotiation_in.take_all()
    }

    fn write_incoming(&mut self, data: &[u8]) {
        self.update_begin();
        if self.attempt.state == SaslState::Established {
            self.decode_net(data);
        } else {
            self.attempt.held_net.append(data);
            if self.trigger == AdvanceTrigger::OnWrite && self.attempt.pending.is_some() {
                self.slot.schedule();
            }
        }
        self.update_end();
    }

    fn read_outgoing_counted(&mut self) -> (Vec<u8>, usize) {
        let data = self.attempt.negotiation_out.take_all();
        (data, core::mem::take(&mut self.attempt.encoded))
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

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::collections::VecDeque;
    use alloc::rc::Rc;
    use alloc::string::ToString;
    use core::cell::RefCell;
    use seclayer_stream::StreamEvent;

    /// バックエンドが受け取った設定の記録
    #[derive(Default)]
    struct Seen {
        core: Option<CoreProps>,
        security: Option<SecurityProps>,
        params: ClientParams,
        app_name: String,
        try_again: usize,
    }

    /// 台本どおりのステップを返すバックエンド
    ///
    /// encode は "E:" を、decode は "D:" を先頭に付ける。
    #[derive(Default)]
    struct Scripted {
        seen: Rc<RefCell<Seen>>,
        steps: VecDeque<SaslStep>,
        refuse: Option<AuthCondition>,
        offered: Vec<String>,
        security: u32,
    }

    impl Scripted {
        fn with_steps(steps: Vec<SaslStep>) -> (Self, Rc<RefCell<Seen>>) {
            let seen = Rc::new(RefCell::new(Seen::default()));
            let backend = Scripted {
                seen: seen.clone(),
                steps: steps.into(),
                offered: alloc::vec!["PLAIN".to_string()],
                security: 56,
                ..Scripted::default()
            };
            (backend, seen)
        }

        fn next(&mut self) -> SaslStep {
            self.steps.pop_front().unwrap_or(SaslStep::Failed(AuthCondition::BadProtocol))
        }
    }

    impl SaslBackend for Scripted {
        fn reset(&mut self) {}

        fn set_core_props(&mut self, props: &CoreProps) {
            self.seen.borrow_mut().core = Some(props.clone());
        }

        fn set_security_props(&mut self, props: &SecurityProps) {
            self.seen.borrow_mut().security = Some(props.clone());
        }

        fn set_client_params(&mut self, params: &ClientParams) {
            self.seen.borrow_mut().params = params.clone();
        }

        fn client_start(&mut self, _mechanisms: &[String], _mode: ClientSendMode) -> bool {
            self.refuse.is_none()
        }

        fn client_first_step(&mut self) -> SaslStep {
            self.next()
        }

        fn server_start(&mut self, _realm: Option<&str>, app_name: &str) -> Option<Vec<String>> {
            self.seen.borrow_mut().app_name = app_name.to_string();
            self.refuse.is_none().then(|| self.offered.clone())
        }

        fn server_first_step(&mut self, _mechanism: &str, _client_init: Option<&[u8]>) -> SaslStep {
            self.next()
        }

        fn next_step(&mut self, _data: &[u8]) -> SaslStep {
            self.next()
        }

        fn try_again(&mut self) -> SaslStep {
            self.seen.borrow_mut().try_again += 1;
            self.next()
        }

        fn mechanism(&self) -> String {
            "PLAIN".to_string()
        }

        fn security(&self) -> u32 {
            self.security
        }

        fn auth_error(&self) -> Option<AuthCondition> {
            self.refuse
        }

        fn encode(&mut self, plain: &[u8]) -> Result<Vec<u8>, SaslError> {
            let mut out = b"E:".to_vec();
            out.extend_from_slice(plain);
            Ok(out)
        }

        fn decode(&mut self, data: &[u8]) -> Result<Vec<u8>, SaslError> {
            let mut out = b"D:".to_vec();
            out.extend_from_slice(data);
            Ok(out)
        }
    }

    fn mechs() -> Vec<String> {
        alloc::vec!["PLAIN".to_string(), "ANONYMOUS".to_string()]
    }

    fn start(steps: Vec<SaslStep>) -> (SaslSession, Rc<RefCell<Seen>>) {
        let (backend, seen) = Scripted::with_steps(steps);
        let mut session = SaslSession::new(Box::new(backend));
        session
            .start_client("imap", "mail.example.com", &mechs(), ClientSendMode::AllowClientSendFirst)
            .unwrap();
        (session, seen)
    }

    #[test]
    fn test_empty_mechanism_list_fails() {
        let (backend, seen) = Scripted::with_steps(alloc::vec![]);
        let mut session = SaslSession::new(Box::new(backend));
        let result = session.start_client("imap", "host", &[], ClientSendMode::AllowClientSendFirst);

        assert_eq!(result, Err(SaslError::Init));
        assert_eq!(session.state(), SaslState::Idle);
        assert_eq!(session.role(), Role::Unset);
        assert_eq!(session.ssf(), 0);
        assert_eq!(session.auth_condition(), Some(AuthCondition::NoMechanism));
        assert!(!session.run_scheduled());
        assert!(seen.borrow().core.is_none(), "バックエンドには何も渡さない");
    }

    #[test]
    fn test_backend_refusal_stays_idle() {
        let (mut backend, _) = Scripted::with_steps(alloc::vec![]);
        backend.refuse = Some(AuthCondition::TooWeak);
        let mut session = SaslSession::new(Box::new(backend));
        let result = session.start_client("imap", "host", &mechs(), ClientSendMode::AllowClientSendFirst);

        assert_eq!(result, Err(SaslError::Init));
        assert_eq!(session.state(), SaslState::Idle);
        assert_eq!(session.auth_condition(), Some(AuthCondition::TooWeak));
    }

    #[test]
    fn test_client_flow() {
        let (mut session, _) = start(alloc::vec![
            SaslStep::ClientStarted(Some(b"\0user\0pass".to_vec())),
            SaslStep::Success,
        ]);
        assert_eq!(session.role(), Role::Client);
        assert!(session.take_signals().is_empty(), "開始時点ではまだ実行しない");

        assert!(session.run_scheduled());
        assert_eq!(
            session.take_signals(),
            alloc::vec![SaslSignal::ClientStarted {
                mechanism: "PLAIN".to_string(),
                initial: Some(b"\0user\0pass".to_vec()),
            }]
        );
        assert_eq!(session.ssf(), 0);

        session.put_step(b"");
        assert!(session.run_scheduled());
        assert_eq!(session.take_signals(), alloc::vec![SaslSignal::Authenticated]);
        assert_eq!(session.state(), SaslState::Established);
        assert_eq!(session.ssf(), 56);
        assert_eq!(session.mechanism(), "PLAIN");
    }

    #[test]
    fn test_put_step_before_first_step_ignored() {
        let (mut session, _) = start(alloc::vec![SaslStep::ClientStarted(None)]);
        session.put_step(b"early");
        assert!(session.run_scheduled());
        // ClientFirst がそのまま実行される
        assert!(matches!(
            session.take_signals().as_slice(),
            [SaslSignal::ClientStarted { initial: None, .. }]
        ));
    }

    #[test]
    fn test_need_params_then_continue() {
        let (mut session, seen) = start(alloc::vec![
            SaslStep::NeedParams(ParamsRequest {
                user: true,
                password: true,
                ..ParamsRequest::default()
            }),
            SaslStep::ClientStarted(None),
        ]);
        session.run_scheduled();
        assert!(matches!(
            session.take_signals().as_slice(),
            [SaslSignal::NeedParams(req)] if req.user && req.password
        ));

        // 中断理由が違う continue は無視
        session.continue_after_auth_check();
        assert!(!session.run_scheduled());

        session.set_username("alice");
        session.set_password("secret");
        assert_eq!(seen.borrow().params.username.as_deref(), Some("alice"));

        session.continue_after_params();
        assert!(session.run_scheduled());
        assert_eq!(seen.borrow().try_again, 1);
        assert!(matches!(
            session.take_signals().as_slice(),
            [SaslSignal::ClientStarted { .. }]
        ));
    }

    #[test]
    fn test_server_flow_with_auth_check() {
        let (backend, seen) = Scripted::with_steps(alloc::vec![
            SaslStep::AuthCheck {
                user: "alice".to_string(),
                authzid: String::new(),
            },
            SaslStep::Success,
        ]);
        let mut session = SaslSession::new(Box::new(backend));
        session.set_application_name("test-app");

        let offered = session.start_server("imap", "mail.example.com", None).unwrap();
        assert_eq!(offered, alloc::vec!["PLAIN".to_string()]);
        assert_eq!(seen.borrow().app_name, "test-app");
        assert!(!session.run_scheduled(), "サーバー開始では何も予約しない");

        session.put_server_first_step("PLAIN", Some(b"\0alice\0pw"));
        session.run_scheduled();
        assert_eq!(
            session.take_signals(),
            alloc::vec![SaslSignal::AuthCheck {
                user: "alice".to_string(),
                authzid: String::new(),
            }]
        );

        // 2 回目の first step は無視
        session.put_server_first_step("PLAIN", None);
        assert!(!session.run_scheduled());

        session.continue_after_auth_check();
        session.run_scheduled();
        assert_eq!(session.take_signals(), alloc::vec![SaslSignal::Authenticated]);
        assert_eq!(session.state(), SaslState::Established);
    }

    #[test]
    fn test_failure_reports_condition_and_error_event() {
        let (mut session, _) = start(alloc::vec![SaslStep::Failed(AuthCondition::BadAuth)]);
        session.run_scheduled();

        assert_eq!(session.state(), SaslState::Error);
        assert!(!session.ok());
        assert_eq!(session.error_code(), Some(SaslError::Handshake));
        assert_eq!(session.auth_condition(), Some(AuthCondition::BadAuth));
        assert_eq!(session.ssf(), 0);
        assert_eq!(session.take_events(), alloc::vec![StreamEvent::Error]);

        let again = session.start_client("imap", "host", &mechs(), ClientSendMode::AllowClientSendFirst);
        assert_eq!(again, Err(SaslError::Terminal));
    }

    #[test]
    fn test_policy_locked_after_start() {
        let (mut session, seen) = start(alloc::vec![]);
        session.set_constraints(SecurityFlags::NONE, 200, 300);
        session.set_external_ssf(99);
        assert_eq!(session.security_props().ssf_min, 0);
        assert_eq!(session.security_props().external_ssf, 0);
        assert_eq!(seen.borrow().security.as_ref().map(|p| p.ssf_min), Some(0));

        session.reset();
        let flags = SecurityFlags {
            disallow_plain: true,
            ..SecurityFlags::NONE
        };
        session.set_constraints_level(flags, SecurityLevel::Baseline);
        let props = session.security_props();
        assert_eq!((props.ssf_min, props.ssf_max), (128, 256));
        assert!(props.flags.disallow_plain);
    }

    #[test]
    fn test_unset_port_is_not_forwarded() {
        let (backend, seen) = Scripted::with_steps(alloc::vec![]);
        let mut session = SaslSession::new(Box::new(backend));
        session.set_local_addr("10.0.0.1", None);
        session.set_remote_addr("10.0.0.2", Some(143));
        session
            .start_client("imap", "host", &mechs(), ClientSendMode::AllowClientSendFirst)
            .unwrap();

        let seen = seen.borrow();
        let core = seen.core.as_ref().unwrap();
        assert_eq!(core.local, None);
        assert_eq!(core.remote.as_ref().map(|r| r.port), Some(143));
        assert_eq!(core.service, "imap");
    }

    #[test]
    fn test_held_data_flushed_on_establishment() {
        let (mut session, _) = start(alloc::vec![SaslStep::ClientStarted(None), SaslStep::Success]);
        session.run_scheduled();
        session.write(b"early");
        session.write_incoming(b"net");
        assert_eq!(session.bytes_outgoing_available(), 0);
        assert_eq!(session.bytes_available(), 0);

        session.put_step(b"");
        session.run_scheduled();
        assert_eq!(
            session.take_events(),
            alloc::vec![StreamEvent::ReadyRead, StreamEvent::ReadyReadOutgoing]
        );
        assert_eq!(session.read_outgoing_counted(), (b"E:early".to_vec(), 5));
        assert_eq!(session.read(), b"D:net");

        // 確立後は直接通る
        session.write(b"x");
        assert_eq!(session.read_outgoing(), b"E:x");
    }

    #[test]
    fn test_reset_clears_attempt() {
        let (mut session, _) = start(alloc::vec![SaslStep::ClientStarted(None)]);
        session.reset();
        assert_eq!(session.state(), SaslState::Idle);
        assert_eq!(session.role(), Role::Unset);
        assert!(!session.run_scheduled());
        assert!(session.take_signals().is_empty());
        assert_eq!(session.mechanism(), "");
    }

    #[test]
    fn test_reset_restores_policy_defaults() {
        let (backend, seen) = Scripted::with_steps(alloc::vec![]);
        let mut session = SaslSession::new(Box::new(backend));
        let flags = SecurityFlags {
            disallow_plain: true,
            ..SecurityFlags::NONE
        };
        session.set_constraints(flags, 40, 128);
        session.set_external_auth_id("cn=alice");
        session.set_external_ssf(56);
        session.set_local_addr("10.0.0.1", Some(1));
        session.set_remote_addr("10.0.0.2", Some(143));
        session.set_application_name("test-app");
        session.set_username("alice");
        session.set_password("secret");
        session.set_realm("example.com");

        session.reset();
        assert_eq!(seen.borrow().params, ClientParams::default(), "資格情報の破棄もバックエンドへ伝わる");

        session.start_server("imap", "mail.example.com", None).unwrap();
        let seen = seen.borrow();
        assert_eq!(seen.security, Some(SecurityProps::default()));
        let core = seen.core.as_ref().unwrap();
        assert_eq!(core.local, None);
        assert_eq!(core.remote, None);
        assert_ne!(seen.app_name, "test-app");
        assert_eq!(session.security_props(), SecurityProps::default());
    }

    #[test]
    fn test_start_keeps_policy() {
        let (backend, seen) = Scripted::with_steps(alloc::vec![]);
        let mut session = SaslSession::new(Box::new(backend));
        session.set_constraints(SecurityFlags::NONE, 40, 128);
        session.set_username("alice");
        session
            .start_client("imap", "mail.example.com", &mechs(), ClientSendMode::AllowClientSendFirst)
            .unwrap();

        let seen = seen.borrow();
        assert_eq!(seen.security.as_ref().map(|p| (p.ssf_min, p.ssf_max)), Some((40, 128)));
        assert_eq!(seen.params.username.as_deref(), Some("alice"));
    }

    #[test]
    fn test_explicit_update_consumes_schedule() {
        let (mut session, _) = start(alloc::vec![SaslStep::ClientStarted(None)]);
        session.update();
        assert_eq!(session.take_signals().len(), 1);
        assert!(!session.run_scheduled(), "明示的に進めた後は予約が残らない");
        assert!(session.take_signals().is_empty());
    }
}
