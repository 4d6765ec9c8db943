use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use cvr_store::PayloadStore;
use serde::{Deserialize, Serialize};

/// How deployment payloads are fingerprinted and kept.
#[derive(Clone)]
pub enum PayloadStrategy {
    /// The payload itself is stored in the record.
    Embedded,
    /// The payload goes to a content-addressed store and the record keeps
    /// its hash.
    ContentAddressed(Arc<dyn PayloadStore>),
}

impl PayloadStrategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::Embedded => StrategyKind::Embedded,
            Self::ContentAddressed(_) => StrategyKind::ContentAddressed,
        }
    }

    pub fn payload_store(&self) -> Option<&Arc<dyn PayloadStore>> {
        match self {
            Self::Embedded => None,
            Self::ContentAddressed(store) => Some(store),
        }
    }
}

impl fmt::Debug for PayloadStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PayloadStrategy({})", self.kind())
    }
}

/// Configuration-level name of a [`PayloadStrategy`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    Embedded,
    ContentAddressed,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Embedded => f.write_str("embedded"),
            Self::ContentAddressed => f.write_str("content_addressed"),
        }
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "embedded" => Ok(Self::Embedded),
            "content_addressed" => Ok(Self::ContentAddressed),
            other => Err(format!(
                "unknown payload strategy {other:?} (expected embedded or content_addressed)"
            )),
        }
    }
}
