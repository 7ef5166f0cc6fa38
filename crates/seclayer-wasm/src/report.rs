//! tick() / getStats() が返す JSON

extern crate alloc;

use alloc::string::String;
use alloc::vec::Vec;

use serde::Serialize;

use seclayer_sasl::{ParamsRequest, SaslSignal};
use seclayer_stream::StreamEvent;

/// tick() の結果
#[derive(Debug, Default, Serialize)]
pub struct TickReport {
    /// 予約済みのアドバンスを実行したか
    pub advanced: bool,
    pub events: Vec<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub signals: Vec<SignalReport>,
}

impl TickReport {
    pub fn new(advanced: bool, events: &[StreamEvent]) -> Self {
        TickReport {
            advanced,
            events: events.iter().map(StreamEvent::as_str).collect(),
            signals: Vec::new(),
        }
    }
}

/// SASL シグナルの JSON 表現
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalReport {
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mechanism: Option<String>,
    /// 相手に送るトークン（clientStarted の初期レスポンス / nextStep）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authzid: Option<String>,
    /// needParams で要求された項目
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<&'static str>,
}

impl From<SaslSignal> for SignalReport {
    fn from(signal: SaslSignal) -> Self {
        match signal {
            SaslSignal::ClientStarted { mechanism, initial } => SignalReport {
                kind: "clientStarted",
                mechanism: Some(mechanism),
                data: initial,
                ..SignalReport::default()
            },
            SaslSignal::NextStep(data) => SignalReport {
                kind: "nextStep",
                data: Some(data),
                ..SignalReport::default()
            },
            SaslSignal::NeedParams(request) => SignalReport {
                kind: "needParams",
                params: requested(request),
                ..SignalReport::default()
            },
            SaslSignal::AuthCheck { user, authzid } => SignalReport {
                kind: "authCheck",
                user: Some(user),
                authzid: Some(authzid),
                ..SignalReport::default()
            },
            SaslSignal::Authenticated => SignalReport {
                kind: "authenticated",
                ..SignalReport::default()
            },
        }
    }
}

fn requested(request: ParamsRequest) -> Vec<&'static str> {
    [
        (request.user, "user"),
        (request.authzid, "authzid"),
        (request.password, "password"),
        (request.realm, "realm"),
    ]
    .into_iter()
    .filter_map(|(wanted, name)| wanted.then_some(name))
    .collect()
}

/// 構造体を JSON 文字列にする
pub fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}
