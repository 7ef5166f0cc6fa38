//! SecureSasl wasm-bindgen エクスポート
//!
//! ネゴシエーションのトークンはシグナル（`tick()` の `signals`）として JS に渡り、
//! JS がアプリケーションプロトコルで相手に届ける。相手のトークンは
//! `putStep()` / `putServerFirstStep()` で戻す。

extern crate alloc;

use alloc::boxed::Box;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use serde::Serialize;
use wasm_bindgen::prelude::*;

use seclayer_provider::{BuiltinProvider, ProviderRegistry};
use seclayer_sasl::{ClientSendMode, SaslError, SaslSession, SecurityFlags};
use seclayer_stream::SecureStream;

use crate::options::{self, SaslOptions};
use crate::report::{to_json, SignalReport, TickReport};

/// SASL には PSK を使わない
const UNUSED_PSK: [u8; 16] = [0u8; 16];

/// SASL 系セッション
#[wasm_bindgen]
pub struct SecureSasl {
    session: SaslSession,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SaslStats<'a> {
    state: String,
    role: String,
    mechanism: &'a str,
    ssf: u32,
    auth_condition: Option<String>,
    error: Option<String>,
}

#[wasm_bindgen]
impl SecureSasl {
    /// オプション JSON からセッションを生成する
    ///
    /// # エラー
    /// - オプションの JSON が不正
    /// - 指定したプロバイダーが SASL に対応していない
    #[wasm_bindgen(constructor)]
    pub fn new(options_json: &str) -> Result<SecureSasl, JsError> {
        let opts: SaslOptions = options::parse(options_json).map_err(|e| JsError::new(&e))?;
        Self::from_options(opts).map_err(|e| JsError::new(&e))
    }

    /// クライアントとしてネゴシエーションを開始する
    ///
    /// # 引数
    /// - `mechanisms`: サーバーが提示した機構
    /// - `send_first`: 初期レスポンスを最初のメッセージに含めるか
    #[wasm_bindgen(js_name = "startClient")]
    pub fn start_client(
        &mut self,
        service: &str,
        host: &str,
        mechanisms: Vec<String>,
        send_first: bool,
    ) -> Result<(), JsError> {
        let mode = if send_first {
            ClientSendMode::AllowClientSendFirst
        } else {
            ClientSendMode::DisableClientSendFirst
        };
        self.session
            .start_client(service, host, &mechanisms, mode)
            .map_err(|e| JsError::new(&self.start_error(e)))
    }

    /// サーバーとして開始し、提示する機構を返す
    #[wasm_bindgen(js_name = "startServer")]
    pub fn start_server(
        &mut self,
        service: &str,
        host: &str,
        realm: Option<String>,
    ) -> Result<Vec<String>, JsError> {
        self.session
            .start_server(service, host, realm.as_deref())
            .map_err(|e| JsError::new(&self.start_error(e)))
    }

    #[wasm_bindgen(js_name = "putServerFirstStep")]
    pub fn put_server_first_step(&mut self, mechanism: &str, client_init: Option<Vec<u8>>) {
        self.session.put_server_first_step(mechanism, client_init.as_deref());
    }

    #[wasm_bindgen(js_name = "putStep")]
    pub fn put_step(&mut self, data: &[u8]) {
        self.session.put_step(data);
    }

    #[wasm_bindgen(js_name = "setUsername")]
    pub fn set_username(&mut self, username: &str) {
        self.session.set_username(username);
    }

    #[wasm_bindgen(js_name = "setAuthzid")]
    pub fn set_authzid(&mut self, authzid: &str) {
        self.session.set_authzid(authzid);
    }

    #[wasm_bindgen(js_name = "setPassword")]
    pub fn set_password(&mut self, password: &str) {
        self.session.set_password(password);
    }

    #[wasm_bindgen(js_name = "setRealm")]
    pub fn set_realm(&mut self, realm: &str) {
        self.session.set_realm(realm);
    }

    #[wasm_bindgen(js_name = "continueAfterParams")]
    pub fn continue_after_params(&mut self) {
        self.session.continue_after_params();
    }

    #[wasm_bindgen(js_name = "continueAfterAuthCheck")]
    pub fn continue_after_auth_check(&mut self) {
        self.session.continue_after_auth_check();
    }

    /// 予約済みのステップを実行し、イベントとシグナルを返す
    ///
    /// # 戻り値
    /// ```json
    /// {
    ///   "advanced": true,
    ///   "events": [],
    ///   "signals": [{ "kind": "clientStarted", "mechanism": "PLAIN", "data": [0, 97] }]
    /// }
    /// ```
    #[wasm_bindgen]
    pub fn tick(&mut self) -> String {
        let advanced = self.session.run_scheduled();
        let events = self.session.take_events();
        let mut report = TickReport::new(advanced, &events);
        report.signals = self
            .session
            .take_signals()
            .into_iter()
            .map(SignalReport::from)
            .collect();
        to_json(&report)
    }

    #[wasm_bindgen]
    pub fn update(&mut self) {
        self.session.update();
    }

    #[wasm_bindgen]
    pub fn write(&mut self, data: &[u8]) {
        self.session.write(data);
    }

    #[wasm_bindgen]
    pub fn read(&mut self) -> Vec<u8> {
        self.session.read()
    }

    #[wasm_bindgen(js_name = "writeIncoming")]
    pub fn write_incoming(&mut self, data: &[u8]) {
        self.session.write_incoming(data);
    }

    #[wasm_bindgen(js_name = "readOutgoing")]
    pub fn read_outgoing(&mut self) -> Vec<u8> {
        self.session.read_outgoing()
    }

    #[wasm_bindgen]
    pub fn reset(&mut self) {
        self.session.reset();
    }

    /// セッション統計を JSON 文字列で返す
    ///
    /// ```json
    /// { "state": "Established", "role": "Client", "mechanism": "PLAIN", "ssf": 0,
    ///   "authCondition": null, "error": null }
    /// ```
    #[wasm_bindgen(js_name = "getStats")]
    pub fn get_stats(&self) -> String {
        let s = &self.session;
        to_json(&SaslStats {
            state: format!("{:?}", s.state()),
            role: format!("{:?}", s.role()),
            mechanism: s.mechanism(),
            ssf: s.ssf(),
            auth_condition: s.auth_condition().map(|c| format!("{:?}", c)),
            error: s.error_code().map(|e| format!("{}", e)),
        })
    }
}

impl SecureSasl {
    /// 解析済みオプションからセッションを組み立てる
    ///
    /// # エラー
    /// プロバイダーが見つからない（メッセージ文字列）
    pub fn from_options(opts: SaslOptions) -> Result<SecureSasl, String> {
        let provider = opts
            .users
            .iter()
            .fold(BuiltinProvider::new(UNUSED_PSK), |p, (user, password)| {
                p.with_user(user, password)
            });
        let mut registry = ProviderRegistry::new();
        registry
            .register(Box::new(provider))
            .map_err(|e| format!("{}", e))?;
        let mut session = registry
            .sasl_session(opts.provider.as_deref())
            .map_err(|e| format!("{}", e))?;

        let flags: SecurityFlags = opts.flags.into();
        match opts.level.as_deref() {
            Some(name) => {
                let level = options::parse_level(name)
                    .ok_or_else(|| format!("Unknown security level '{}'", name))?;
                session.set_constraints_level(flags, level);
            }
            None => session.set_constraints(flags, opts.ssf_min, opts.ssf_max),
        }
        if let Some(id) = &opts.external_auth_id {
            session.set_external_auth_id(id);
        }
        session.set_external_ssf(opts.external_ssf);
        if let Some(local) = &opts.local {
            session.set_local_addr(&local.addr, local.port);
        }
        if let Some(remote) = &opts.remote {
            session.set_remote_addr(&remote.addr, remote.port);
        }
        if let Some(name) = &opts.app_name {
            session.set_application_name(name);
        }
        if let Some(user) = &opts.username {
            session.set_username(user);
        }
        if let Some(authzid) = &opts.authzid {
            session.set_authzid(authzid);
        }
        if let Some(password) = &opts.password {
            session.set_password(password);
        }
        if let Some(realm) = &opts.realm {
            session.set_realm(realm);
        }
        session.set_trigger(opts.trigger.into());
        session.set_stateful_only(opts.stateful_only);

        Ok(SecureSasl { session })
    }

    /// 内部セッション（native テスト・組み込み用）
    pub fn session(&self) -> &SaslSession {
        &self.session
    }

    fn start_error(&self, error: SaslError) -> String {
        match self.session.auth_condition() {
            Some(condition) => format!("SASL start failed: {} ({:?})", error, condition),
            None => format!("SASL start failed: {}", error),
        }
    }
}
