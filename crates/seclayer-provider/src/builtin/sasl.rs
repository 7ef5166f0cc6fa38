//! 組み込み SASL バックエンド（EXTERNAL / PLAIN / ANONYMOUS）
//!
//! どの機構も独自のセキュリティレイヤーを持たない。encode / decode は素通しで、
//! SSF は外部レイヤー（EXTERNAL のみ）から引き継ぐ。
//!
//! ## PLAIN の初期レスポンス
//!
//! ```text
//! [authzid] 0x00 [username] 0x00 [password]
//! ```

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use seclayer_sasl::{
    AuthCondition, ClientParams, ClientSendMode, CoreProps, ParamsRequest, SaslBackend, SaslError,
    SaslStep, SecurityProps,
};

/// 機構の性質
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MechanismInfo {
    pub name: &'static str,
    /// 平文の秘密を送る
    pub plaintext: bool,
    pub active_vulnerable: bool,
    pub dictionary_vulnerable: bool,
    pub anonymous: bool,
    pub forward_secrecy: bool,
    pub credential_delegation: bool,
    pub mutual_auth: bool,
}

impl MechanismInfo {
    /// フラグに違反しないか
    fn allowed_by(&self, props: &SecurityProps) -> bool {
        let f = &props.flags;
        !(f.disallow_plain && self.plaintext
            || f.disallow_active_vulnerable && self.active_vulnerable
            || f.disallow_dictionary_vulnerable && self.dictionary_vulnerable
            || f.disallow_anonymous && self.anonymous
            || f.require_forward_secrecy && !self.forward_secrecy
            || f.require_credential_delegation && !self.credential_delegation
            || f.require_mutual_auth && !self.mutual_auth)
    }
}

/// 優先順の組み込み機構
pub const MECHANISMS: [MechanismInfo; 3] = [
    MechanismInfo {
        name: "EXTERNAL",
        plaintext: false,
        active_vulnerable: true,
        dictionary_vulnerable: false,
        anonymous: false,
        forward_secrecy: false,
        credential_delegation: false,
        mutual_auth: false,
    },
    MechanismInfo {
        name: "PLAIN",
        plaintext: true,
        active_vulnerable: true,
        dictionary_vulnerable: true,
        anonymous: false,
        forward_secrecy: false,
        credential_delegation: false,
        mutual_auth: false,
    },
    MechanismInfo {
        name: "ANONYMOUS",
        plaintext: false,
        active_vulnerable: true,
        dictionary_vulnerable: true,
        anonymous: true,
        forward_secrecy: false,
        credential_delegation: false,
        mutual_auth: false,
    },
];

/// ネゴシエーションの進行
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Stage {
    #[default]
    Idle,
    /// クライアント: 機構を選んだ、最初のステップ待ち
    ClientSelected,
    /// クライアント: サーバーの空チャレンジを待っている
    ClientAwaitChallenge,
    /// クライアント: レスポンスを送った、完了待ち
    ClientSent,
    /// サーバー: 機構一覧を提示した
    ServerOffered,
    /// サーバー: 空チャレンジを送った、レスポンス待ち
    ServerAwaitResponse,
    /// サーバー: アプリの AuthCheck 待ち
    ServerAuthCheck,
    Done,
    Failed,
}

/// 組み込み SASL バックエンド
#[derive(Debug, Default)]
pub struct BuiltinSaslBackend {
    /// PLAIN の検証に使うユーザー表
    users: BTreeMap<String, String>,
    core: CoreProps,
    props: SecurityProps,
    params: ClientParams,
    stage: Stage,
    mode: ClientSendMode,
    mechanism: Option<MechanismInfo>,
    offered: Vec<String>,
    condition: Option<AuthCondition>,
}

impl BuiltinSaslBackend {
    pub fn new(users: BTreeMap<String, String>) -> Self {
        BuiltinSaslBackend {
            users,
            ..BuiltinSaslBackend::default()
        }
    }

    /// ポリシーを満たす機構（優先順）
    ///
    /// # エラー
    /// SSF 範囲が矛盾している場合、または SSF 下限を満たせない場合は `TooWeak`
    fn permitted(&self) -> Result<Vec<MechanismInfo>, AuthCondition> {
        let props = &self.props;
        if props.ssf_max > 0 && props.ssf_min > props.ssf_max {
            return Err(AuthCondition::TooWeak);
        }
        // 組み込み機構は外部レイヤーの SSF しか提供できない
        if props.ssf_min > props.external_ssf {
            return Err(AuthCondition::TooWeak);
        }
        Ok(MECHANISMS
            .iter()
            .filter(|m| m.allowed_by(props))
            .filter(|m| m.name != "EXTERNAL" || !props.external_auth_id.is_empty())
            .copied()
            .collect())
    }

    fn fail(&mut self, condition: AuthCondition) -> SaslStep {
        tracing::debug!(?condition, "builtin sasl step failed");
        self.stage = Stage::Failed;
        self.condition = Some(condition);
        SaslStep::Failed(condition)
    }

    fn mechanism_name(&self) -> &'static str {
        self.mechanism.map(|m| m.name).unwrap_or("")
    }

    /// クライアントの初期レスポンス
    fn client_response(&self) -> Result<Vec<u8>, ParamsRequest> {
        let p = &self.params;
        match self.mechanism_name() {
            "PLAIN" => {
                let request = ParamsRequest {
                    user: p.username.is_none(),
                    password: p.password.is_none(),
                    ..ParamsRequest::default()
                };
                if !request.is_empty() {
                    return Err(request);
                }
                let mut out = Vec::new();
                out.extend_from_slice(p.authzid.as_deref().unwrap_or("").as_bytes());
                out.push(0);
                out.extend_from_slice(p.username.as_deref().unwrap_or("").as_bytes());
                out.push(0);
                out.extend_from_slice(p.password.as_deref().unwrap_or("").as_bytes());
                Ok(out)
            }
            "ANONYMOUS" => Ok(p.username.as_deref().unwrap_or("").as_bytes().to_vec()),
            _ => Ok(p.authzid.as_deref().unwrap_or("").as_bytes().to_vec()),
        }
    }

    /// サーバー: クライアントのレスポンスを検証する
    fn verify(&mut self, response: &[u8]) -> SaslStep {
        let Ok(text) = core::str::from_utf8(response) else {
            return self.fail(AuthCondition::BadProtocol);
        };

        let (user, authzid) = match self.mechanism_name() {
            "PLAIN" => {
                let mut parts = text.split('\0');
                let (Some(authzid), Some(user), Some(password), None) =
                    (parts.next(), parts.next(), parts.next(), parts.next())
                else {
                    return self.fail(AuthCondition::BadProtocol);
                };
                let verdict = match self.users.get(user) {
                    None => Some(AuthCondition::NoUser),
                    Some(expected) if expected.as_str() != password => Some(AuthCondition::BadAuth),
                    Some(_) => None,
                };
                if let Some(condition) = verdict {
                    return self.fail(condition);
                }
                (String::from(user), String::from(authzid))
            }
            "ANONYMOUS" => {
                tracing::debug!(trace = text, "anonymous login");
                (String::from("anonymous"), String::new())
            }
            "EXTERNAL" => {
                if self.props.external_auth_id.is_empty() {
                    return self.fail(AuthCondition::BadAuth);
                }
                (self.props.external_auth_id.clone(), String::from(text))
            }
            _ => return self.fail(AuthCondition::NoMechanism),
        };

        self.stage = Stage::ServerAuthCheck;
        SaslStep::AuthCheck { user, authzid }
    }

    fn client_first(&mut self) -> SaslStep {
        match self.client_response() {
            Err(request) => SaslStep::NeedParams(request),
            Ok(_) if self.mode == ClientSendMode::DisableClientSendFirst => {
                self.stage = Stage::ClientAwaitChallenge;
                SaslStep::ClientStarted(None)
            }
            Ok(response) => {
                self.stage = Stage::ClientSent;
                SaslStep::ClientStarted(Some(response))
            }
        }
    }
}

impl SaslBackend for BuiltinSaslBackend {
    fn reset(&mut self) {
        self.stage = Stage::Idle;
        self.mechanism = None;
        self.offered.clear();
        self.condition = None;
    }

    fn set_core_props(&mut self, props: &CoreProps) {
        self.core = props.clone();
    }

    fn set_security_props(&mut self, props: &SecurityProps) {
        self.props = props.clone();
    }

    fn set_client_params(&mut self, params: &ClientParams) {
        self.params = params.clone();
    }

    fn client_start(&mut self, mechanisms: &[String], mode: ClientSendMode) -> bool {
        let permitted = match self.permitted() {
            Ok(permitted) => permitted,
            Err(condition) => {
                self.condition = Some(condition);
                return false;
            }
        };
        let chosen = permitted
            .into_iter()
            .find(|m| mechanisms.iter().any(|c| c.eq_ignore_ascii_case(m.name)));
        let Some(chosen) = chosen else {
            self.condition = Some(AuthCondition::NoMechanism);
            return false;
        };

        tracing::debug!(mechanism = chosen.name, service = %self.core.service, "builtin sasl client selected");
        self.mechanism = Some(chosen);
        self.mode = mode;
        self.stage = Stage::ClientSelected;
        true
    }

    fn client_first_step(&mut self) -> SaslStep {
        if self.stage != Stage::ClientSelected {
            return self.fail(AuthCondition::BadProtocol);
        }
        self.client_first()
    }

    fn server_start(&mut self, realm: Option<&str>, app_name: &str) -> Option<Vec<String>> {
        let permitted = match self.permitted() {
            Ok(permitted) if !permitted.is_empty() => permitted,
            Ok(_) => {
                self.condition = Some(AuthCondition::NoMechanism);
                return None;
            }
            Err(condition) => {
                self.condition = Some(condition);
                return None;
            }
        };
        tracing::debug!(app_name, realm, "builtin sasl server started");
        self.offered = permitted.iter().map(|m| String::from(m.name)).collect();
        self.stage = Stage::ServerOffered;
        Some(self.offered.clone())
    }

    fn server_first_step(&mut self, mechanism: &str, client_init: Option<&[u8]>) -> SaslStep {
        if self.stage != Stage::ServerOffered {
            return self.fail(AuthCondition::BadProtocol);
        }
        if !self.offered.iter().any(|m| m.eq_ignore_ascii_case(mechanism)) {
            return self.fail(AuthCondition::NoMechanism);
        }
        self.mechanism = MECHANISMS
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(mechanism))
            .copied();

        match client_init {
            Some(response) => self.verify(response),
            None => {
                self.stage = Stage::ServerAwaitResponse;
                SaslStep::Continue(Vec::new())
            }
        }
    }

    fn next_step(&mut self, data: &[u8]) -> SaslStep {
        match self.stage {
            Stage::ClientAwaitChallenge if data.is_empty() => match self.client_response() {
                Ok(response) => {
                    self.stage = Stage::ClientSent;
                    SaslStep::Continue(response)
                }
                Err(request) => SaslStep::NeedParams(request),
            },
            Stage::ClientSent if data.is_empty() => {
                self.stage = Stage::Done;
                SaslStep::Success
            }
            Stage::ServerAwaitResponse => self.verify(data),
            _ => self.fail(AuthCondition::BadProtocol),
        }
    }

    fn try_again(&mut self) -> SaslStep {
        match self.stage {
            Stage::ClientSelected => self.client_first(),
            Stage::ClientAwaitChallenge => self.next_step(&[]),
            Stage::ServerAuthCheck => {
                self.stage = Stage::Done;
                SaslStep::Success
            }
            _ => self.fail(AuthCondition::BadProtocol),
        }
    }

    fn mechanism(&self) -> String {
        String::from(self.mechanism_name())
    }

    fn security(&self) -> u32 {
        match (self.stage, self.mechanism_name()) {
            (Stage::Done, "EXTERNAL") => self.props.external_ssf,
            _ => 0,
        }
    }

    fn auth_error(&self) -> Option<AuthCondition> {
        self.condition
    }

    fn encode(&mut self, plain: &[u8]) -> Result<Vec<u8>, SaslError> {
        Ok(plain.to_vec())
    }

    fn decode(&mut self, data: &[u8]) -> Result<Vec<u8>, SaslError> {
        Ok(data.to_vec())
    }
}
