use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{FieldError, TypeError};

/// Required prefix of a wallet address.
pub const OWNER_PREFIX: &str = "0x";
/// Number of hex characters after [`OWNER_PREFIX`].
pub const OWNER_HEX_LEN: usize = 40;
/// Maximum length of a repository name, in characters, after trimming.
pub const MAX_REPOSITORY_NAME_LEN: usize = 100;

/// Wallet address that owns a set of repositories.
///
/// Addresses are `0x` followed by 40 hex digits. Parsing is
/// case-insensitive; the stored form is always lowercase so that it can be
/// used directly as a storage key.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Owner(String);

impl Owner {
    /// Parse and canonicalise a wallet address.
    pub fn parse(raw: &str) -> Result<Self, TypeError> {
        let lowered = raw.trim().to_ascii_lowercase();
        let Some(digits) = lowered.strip_prefix(OWNER_PREFIX) else {
            return Err(TypeError::InvalidOwner(format!(
                "must start with {OWNER_PREFIX}"
            )));
        };
        if digits.len() != OWNER_HEX_LEN {
            return Err(TypeError::InvalidOwner(format!(
                "expected {OWNER_HEX_LEN} hex characters after {OWNER_PREFIX}, got {}",
                digits.len()
            )));
        }
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidOwner(
                "must contain only hexadecimal characters".into(),
            ));
        }
        Ok(Self(lowered))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for log lines (`0x1234…abcd`).
    pub fn short_id(&self) -> String {
        format!("{}…{}", &self.0[..6], &self.0[self.0.len() - 4..])
    }
}

impl fmt::Debug for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Owner({})", self.short_id())
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Owner {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Owner> for String {
    fn from(owner: Owner) -> Self {
        owner.0
    }
}

impl std::str::FromStr for Owner {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Repository name, a sub-namespace under an [`Owner`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepositoryName(String);

impl RepositoryName {
    /// Trim and validate a repository name.
    pub fn parse(raw: &str) -> Result<Self, TypeError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TypeError::InvalidRepositoryName("must not be empty".into()));
        }
        let len = trimmed.chars().count();
        if len > MAX_REPOSITORY_NAME_LEN {
            return Err(TypeError::InvalidRepositoryName(format!(
                "must be at most {MAX_REPOSITORY_NAME_LEN} characters, got {len}"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RepositoryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RepositoryName {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RepositoryName> for String {
    fn from(name: RepositoryName) -> Self {
        name.0
    }
}

/// The `(owner, repository)` key under which deployment history is tracked.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity {
    pub owner: Owner,
    pub repository_name: RepositoryName,
}

impl Identity {
    pub fn new(owner: Owner, repository_name: RepositoryName) -> Self {
        Self {
            owner,
            repository_name,
        }
    }

    /// Validate raw request fields, collecting one error per bad field.
    pub fn validate(owner: &str, repository_name: &str) -> Result<Self, Vec<FieldError>> {
        let owner = Owner::parse(owner).map_err(|e| FieldError::new("owner", e.to_string()));
        let repository_name = RepositoryName::parse(repository_name)
            .map_err(|e| FieldError::new("repository_name", e.to_string()));

        match (owner, repository_name) {
            (Ok(owner), Ok(repository_name)) => Ok(Self::new(owner, repository_name)),
            (owner, repository_name) => Err(owner
                .err()
                .into_iter()
                .chain(repository_name.err())
                .collect()),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repository_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: &str = "0xAbCdEf0123456789abcdef0123456789ABCDEF01";

    #[test]
    fn owner_is_lowercased() {
        let owner = Owner::parse(ADDR).unwrap();
        assert_eq!(owner.as_str(), "0xabcdef0123456789abcdef0123456789abcdef01");
    }

    #[test]
    fn owner_accepts_uppercase_prefix() {
        let upper = ADDR.replacen("0x", "0X", 1);
        assert_eq!(Owner::parse(&upper).unwrap(), Owner::parse(ADDR).unwrap());
    }

    #[test]
    fn owner_rejects_missing_prefix() {
        let err = Owner::parse(&ADDR[2..]).unwrap_err();
        assert!(matches!(err, TypeError::InvalidOwner(_)));
    }

    #[test]
    fn owner_rejects_wrong_length() {
        assert!(Owner::parse("0x1234").is_err());
        assert!(Owner::parse(&format!("{ADDR}0")).is_err());
    }

    #[test]
    fn owner_rejects_non_hex() {
        let bad = format!("0x{}", "g".repeat(40));
        assert!(Owner::parse(&bad).is_err());
    }

    #[test]
    fn owner_short_id() {
        let owner = Owner::parse(ADDR).unwrap();
        assert_eq!(owner.short_id(), "0xabcd…ef01");
    }

    #[test]
    fn repository_name_is_trimmed() {
        let name = RepositoryName::parse("  token-vault  ").unwrap();
        assert_eq!(name.as_str(), "token-vault");
    }

    #[test]
    fn repository_name_rejects_blank() {
        assert!(RepositoryName::parse("   ").is_err());
    }

    #[test]
    fn repository_name_length_limit_counts_chars() {
        assert!(RepositoryName::parse(&"a".repeat(100)).is_ok());
        assert!(RepositoryName::parse(&"a".repeat(101)).is_err());
        // Multi-byte characters count once each.
        assert!(RepositoryName::parse(&"é".repeat(100)).is_ok());
    }

    #[test]
    fn validate_collects_all_field_errors() {
        let errors = Identity::validate("nope", "").unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["owner", "repository_name"]);
    }

    #[test]
    fn validate_success() {
        let identity = Identity::validate(ADDR, " vault ").unwrap();
        assert_eq!(identity.repository_name.as_str(), "vault");
        assert!(identity.to_string().ends_with("/vault"));
    }

    #[test]
    fn serde_roundtrip_canonicalises() {
        let json = format!("{{\"owner\":\"{ADDR}\",\"repository_name\":\"x\"}}");
        let identity: Identity = serde_json::from_str(&json).unwrap();
        assert_eq!(identity.owner.as_str(), ADDR.to_ascii_lowercase());
        let back = serde_json::to_string(&identity).unwrap();
        assert!(back.contains(&ADDR.to_ascii_lowercase()));
    }

    #[test]
    fn serde_rejects_invalid_owner() {
        let result: Result<Owner, _> = serde_json::from_str("\"0x12\"");
        assert!(result.is_err());
    }
}
