//! セキュリティ制約とエンドポイント
//!
//! ネゴシエーション 1 回分のポリシー。開始後は変更できない。

use alloc::string::String;

/// 機構選択の制約フラグ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SecurityFlags {
    /// 平文パスワードを送る機構を禁止
    pub disallow_plain: bool,
    /// 能動的攻撃に弱い機構を禁止
    pub disallow_active_vulnerable: bool,
    /// 辞書攻撃に弱い機構を禁止
    pub disallow_dictionary_vulnerable: bool,
    /// 匿名ログインを禁止
    pub disallow_anonymous: bool,
    pub require_forward_secrecy: bool,
    pub require_credential_delegation: bool,
    pub require_mutual_auth: bool,
}

impl SecurityFlags {
    /// 制約なし
    pub const NONE: SecurityFlags = SecurityFlags {
        disallow_plain: false,
        disallow_active_vulnerable: false,
        disallow_dictionary_vulnerable: false,
        disallow_anonymous: false,
        require_forward_secrecy: false,
        require_credential_delegation: false,
        require_mutual_auth: false,
    };
}

/// SSF の下限を名前で指定する
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityLevel {
    /// 完全性のみ
    Integrity,
    /// 輸出規制レベル
    Export,
    Baseline,
    High,
    Highest,
}

impl SecurityLevel {
    /// 上限として使う SSF
    pub const MAX_SSF: u32 = 256;

    /// このレベルが要求する最小 SSF
    pub fn min_ssf(self) -> u32 {
        match self {
            SecurityLevel::Integrity => 1,
            SecurityLevel::Export => 40,
            SecurityLevel::Baseline => 128,
            SecurityLevel::High => 129,
            SecurityLevel::Highest => 256,
        }
    }
}

/// バックエンドに渡すセキュリティプロパティ
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SecurityProps {
    pub flags: SecurityFlags,
    pub ssf_min: u32,
    /// 0 = 上限なし
    pub ssf_max: u32,
    /// 外部レイヤー（TLS クライアント証明書など）で確立済みの認証 ID
    pub external_auth_id: String,
    /// 外部レイヤーが提供する SSF
    pub external_ssf: u32,
}

/// アドレスとポート
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPort {
    pub addr: String,
    pub port: u16,
}

impl HostPort {
    /// ポート未設定なら None
    pub fn new(addr: &str, port: Option<u16>) -> Option<Self> {
        port.map(|port| HostPort {
            addr: String::from(addr),
            port,
        })
    }
}

/// バックエンドに渡す接続プロパティ
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CoreProps {
    pub service: String,
    pub host: String,
    pub local: Option<HostPort>,
    pub remote: Option<HostPort>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_min_ssf() {
        assert_eq!(SecurityLevel::Integrity.min_ssf(), 1);
        assert_eq!(SecurityLevel::Export.min_ssf(), 40);
        assert_eq!(SecurityLevel::Baseline.min_ssf(), 128);
        assert_eq!(SecurityLevel::High.min_ssf(), 129);
        assert_eq!(SecurityLevel::Highest.min_ssf(), 256);
    }

    #[test]
    fn test_host_port_unset() {
        assert_eq!(HostPort::new("10.0.0.1", None), None);
        assert_eq!(
            HostPort::new("10.0.0.1", Some(0)),
            Some(HostPort {
                addr: String::from("10.0.0.1"),
                port: 0
            }),
            "ポート 0 も有効な値"
        );
    }

    #[test]
    fn test_default_flags_are_none() {
        assert_eq!(SecurityFlags::default(), SecurityFlags::NONE);
    }
}
