//! 証明書・秘密鍵・信頼ストアの値型と、ピア識別結果
//!
//! チェーンの信頼性評価はバックエンドが行う。ここで持つのは
//! バックエンドとセッションの間で受け渡す情報とホスト名照合だけ。

use alloc::string::String;
use alloc::vec::Vec;

/// 証明書（識別情報 + 生 DER）
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Certificate {
    common_name: String,
    alt_names: Vec<String>,
    der: Vec<u8>,
}

impl Certificate {
    pub fn new(common_name: impl Into<String>, alt_names: Vec<String>, der: Vec<u8>) -> Self {
        Certificate {
            common_name: common_name.into(),
            alt_names,
            der,
        }
    }

    pub fn common_name(&self) -> &str {
        &self.common_name
    }

    pub fn alt_names(&self) -> &[String] {
        &self.alt_names
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// ホスト名がこの証明書の名前と一致するか
    ///
    /// subjectAltName があればそれだけを照合し、なければ CN を照合する。
    /// `*.example.com` 形式のワイルドカードは左端の 1 ラベルにのみ一致する。
    pub fn matches_hostname(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.');
        if host.is_empty() {
            return false;
        }
        if self.alt_names.is_empty() {
            name_matches(&self.common_name, host)
        } else {
            self.alt_names.iter().any(|name| name_matches(name, host))
        }
    }
}

fn name_matches(pattern: &str, host: &str) -> bool {
    let pattern = pattern.trim_end_matches('.');
    match pattern.strip_prefix("*.") {
        Some(suffix) => match host.split_once('.') {
            Some((label, rest)) => !label.is_empty() && rest.eq_ignore_ascii_case(suffix),
            None => false,
        },
        None => pattern.eq_ignore_ascii_case(host),
    }
}

/// 証明書チェーン（先頭がエンドエンティティ、空 = 証明書なし）
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CertificateChain(Vec<Certificate>);

impl CertificateChain {
    pub fn new() -> Self {
        CertificateChain(Vec::new())
    }

    /// エンドエンティティ証明書
    pub fn primary(&self) -> Option<&Certificate> {
        self.0.first()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> core::slice::Iter<'_, Certificate> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Certificate] {
        &self.0
    }
}

impl From<Vec<Certificate>> for CertificateChain {
    fn from(certs: Vec<Certificate>) -> Self {
        CertificateChain(certs)
    }
}

impl FromIterator<Certificate> for CertificateChain {
    fn from_iter<I: IntoIterator<Item = Certificate>>(iter: I) -> Self {
        CertificateChain(iter.into_iter().collect())
    }
}

/// 秘密鍵（バックエンドが解釈する不透明なバイト列）
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey(Vec<u8>);

impl PrivateKey {
    pub fn new(bytes: Vec<u8>) -> Self {
        PrivateKey(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl core::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "PrivateKey({} bytes)", self.0.len())
    }
}

/// 信頼アンカーの集合
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CertificateCollection {
    certs: Vec<Certificate>,
}

impl CertificateCollection {
    pub fn new() -> Self {
        CertificateCollection { certs: Vec::new() }
    }

    /// 証明書を追加する（重複は無視）
    pub fn add(&mut self, cert: Certificate) {
        if !self.contains(&cert) {
            self.certs.push(cert);
        }
    }

    pub fn contains(&self, cert: &Certificate) -> bool {
        self.certs.iter().any(|c| c == cert)
    }

    pub fn len(&self) -> usize {
        self.certs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }

    pub fn iter(&self) -> core::slice::Iter<'_, Certificate> {
        self.certs.iter()
    }
}

impl FromIterator<Certificate> for CertificateCollection {
    fn from_iter<I: IntoIterator<Item = Certificate>>(iter: I) -> Self {
        let mut collection = CertificateCollection::new();
        for cert in iter {
            collection.add(cert);
        }
        collection
    }
}

/// バックエンドが評価したピア証明書チェーンの有効性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Validity {
    Valid,
    Rejected,
    Untrusted,
    SignatureFailed,
    InvalidCa,
    InvalidPurpose,
    SelfSigned,
    Revoked,
    PathLengthExceeded,
    Expired,
    ExpiredCa,
    #[default]
    Unknown,
}

/// ピア識別の総合結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityResult {
    /// 証明書があり、信頼でき、ホスト名も一致
    Valid,
    /// ホスト名が一致しない
    HostMismatch,
    /// 証明書の有効性検証に失敗
    BadCert,
    /// ピアが証明書を提示していない
    NoCert,
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    fn cert(cn: &str, alt: &[&str]) -> Certificate {
        Certificate::new(cn, alt.iter().map(|s| s.to_string()).collect(), alloc::vec![])
    }

    #[test]
    fn test_common_name_match() {
        let c = cert("example.com", &[]);
        assert!(c.matches_hostname("example.com"));
        assert!(c.matches_hostname("EXAMPLE.com."));
        assert!(!c.matches_hostname("other.example.com"));
        assert!(!c.matches_hostname(""));
    }

    #[test]
    fn test_alt_names_take_precedence() {
        let c = cert("ignored.example.com", &["www.example.com", "example.com"]);
        assert!(c.matches_hostname("example.com"));
        assert!(c.matches_hostname("www.example.com"));
        // SAN があるとき CN は照合しない
        assert!(!c.matches_hostname("ignored.example.com"));
    }

    #[test]
    fn test_wildcard_single_label() {
        let c = cert("*.example.com", &[]);
        assert!(c.matches_hostname("www.example.com"));
        assert!(!c.matches_hostname("example.com"));
        assert!(!c.matches_hostname("a.b.example.com"));
    }

    #[test]
    fn test_chain_primary() {
        let chain: CertificateChain = alloc::vec![cert("leaf", &[]), cert("ca", &[])].into();
        assert_eq!(chain.primary().map(|c| c.common_name()), Some("leaf"));
        assert_eq!(chain.len(), 2);
        assert!(CertificateChain::new().primary().is_none());
    }

    #[test]
    fn test_collection_deduplicates() {
        let mut store = CertificateCollection::new();
        store.add(cert("ca", &[]));
        store.add(cert("ca", &[]));
        assert_eq!(store.len(), 1);
        assert!(store.contains(&cert("ca", &[])));
        assert!(!store.contains(&cert("other", &[])));
    }

    #[test]
    fn test_private_key_debug_hides_bytes() {
        let key = PrivateKey::new(alloc::vec![1, 2, 3]);
        assert_eq!(alloc::format!("{:?}", key), "PrivateKey(3 bytes)");
    }
}
