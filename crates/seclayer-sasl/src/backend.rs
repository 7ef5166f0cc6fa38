//! SASL バックエンドの契約
//!
//! 機構の選択・チャレンジ/レスポンスの計算・資格情報の検証は
//! バックエンドが担当する。セッションは各ステップの結果を
//! シグナルと状態遷移に変換するだけ。

use alloc::string::String;
use alloc::vec::Vec;

use crate::constraints::{CoreProps, SecurityProps};
use crate::error::SaslError;

/// クライアントが初期レスポンスを送るか
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientSendMode {
    #[default]
    AllowClientSendFirst,
    /// サーバーの空チャレンジを待ってから送る
    DisableClientSendFirst,
}

/// 不足している資格情報
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParamsRequest {
    pub user: bool,
    pub authzid: bool,
    pub password: bool,
    pub realm: bool,
}

impl ParamsRequest {
    pub fn is_empty(&self) -> bool {
        !(self.user || self.authzid || self.password || self.realm)
    }
}

/// クライアントの資格情報
#[derive(Clone, PartialEq, Eq, Default)]
pub struct ClientParams {
    pub username: Option<String>,
    pub authzid: Option<String>,
    pub password: Option<String>,
    pub realm: Option<String>,
}

impl core::fmt::Debug for ClientParams {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ClientParams")
            .field("username", &self.username)
            .field("authzid", &self.authzid)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("realm", &self.realm)
            .finish()
    }
}

/// 認証失敗の理由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthCondition {
    /// 汎用の認証失敗
    AuthFail,
    /// 使える機構がない
    NoMechanism,
    /// 相手のメッセージが不正
    BadProtocol,
    /// サーバーの検証に失敗
    BadServer,
    /// 資格情報が正しくない
    BadAuth,
    /// 認可 ID が許可されない
    NoAuthzid,
    /// 制約を満たす強度がない
    TooWeak,
    /// 暗号化が必要な機構
    NeedEncrypt,
    /// 資格情報の期限切れ
    Expired,
    /// アカウント無効
    Disabled,
    /// ユーザーが存在しない
    NoUser,
    /// 認証サーバーに到達できない
    RemoteUnavailable,
}

/// バックエンドの 1 ステップの結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaslStep {
    /// クライアントの機構が決まった（初期レスポンスは任意）
    ClientStarted(Option<Vec<u8>>),
    /// 相手に送るトークン
    Continue(Vec<u8>),
    /// 資格情報が足りない
    NeedParams(ParamsRequest),
    /// サーバー: 認証 ID を受け入れるかアプリに確認する
    AuthCheck { user: String, authzid: String },
    Success,
    Failed(AuthCondition),
}

/// SASL プロトコルエンジン
pub trait SaslBackend {
    /// 試行ごとの状態を破棄する
    fn reset(&mut self);

    fn set_core_props(&mut self, props: &CoreProps);

    fn set_security_props(&mut self, props: &SecurityProps);

    fn set_client_params(&mut self, params: &ClientParams);

    /// 候補からポリシーを満たす機構を選ぶ
    ///
    /// # 戻り値
    /// 選べなかった場合 `false`（理由は `auth_error()`）
    fn client_start(&mut self, mechanisms: &[String], mode: ClientSendMode) -> bool;

    fn client_first_step(&mut self) -> SaslStep;

    /// サーバーとして開始し、提示する機構の一覧を返す
    fn server_start(&mut self, realm: Option<&str>, app_name: &str) -> Option<Vec<String>>;

    fn server_first_step(&mut self, mechanism: &str, client_init: Option<&[u8]>) -> SaslStep;

    fn next_step(&mut self, data: &[u8]) -> SaslStep;

    /// 中断したステップを再実行する
    fn try_again(&mut self) -> SaslStep;

    /// 選択された機構名（未選択なら空）
    fn mechanism(&self) -> String;

    /// 確立したセキュリティレイヤーの SSF
    fn security(&self) -> u32;

    fn auth_error(&self) -> Option<AuthCondition>;

    /// セキュリティレイヤーで保護する
    fn encode(&mut self, plain: &[u8]) -> Result<Vec<u8>, SaslError>;

    /// セキュリティレイヤーを外す
    fn decode(&mut self, data: &[u8]) -> Result<Vec<u8>, SaslError>;
}
