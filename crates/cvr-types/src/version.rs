use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Semantic version `MAJOR.MINOR.PATCH`.
///
/// Ordering is numeric and component-wise (major, then minor, then patch),
/// so `0.2.0 < 0.10.0`. The derived `Ord` relies on the field order below.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    /// Version assigned to the first deployment of any identity.
    pub const BASELINE: Self = Self::new(0, 1, 0);

    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse `MAJOR.MINOR.PATCH`.
    ///
    /// Exactly three components of ASCII digits separated by `.`; signs,
    /// whitespace, pre-release tags and empty components are rejected.
    /// Leading zeros are accepted and dropped on render.
    pub fn parse(input: &str) -> Result<Self, TypeError> {
        let invalid = || TypeError::InvalidVersionFormat(input.to_string());

        let mut parts = input.split('.');
        let mut component = || -> Result<u64, TypeError> {
            let part = parts.next().ok_or_else(invalid)?;
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            part.parse::<u64>().map_err(|_| invalid())
        };

        let major = component()?;
        let minor = component()?;
        let patch = component()?;
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self::new(major, minor, patch))
    }

    /// Build a version from signed components, rejecting negatives.
    pub fn from_signed(major: i64, minor: i64, patch: i64) -> Result<Self, TypeError> {
        let convert = |name: &str, value: i64| {
            u64::try_from(value).map_err(|_| {
                TypeError::InvalidVersionComponents(format!("{name} is negative ({value})"))
            })
        };
        Ok(Self::new(
            convert("major", major)?,
            convert("minor", minor)?,
            convert("patch", patch)?,
        ))
    }

    /// Build a version from untyped JSON numbers, rejecting negatives and
    /// non-integral values.
    pub fn from_json_numbers(
        major: &serde_json::Number,
        minor: &serde_json::Number,
        patch: &serde_json::Number,
    ) -> Result<Self, TypeError> {
        let convert = |name: &str, value: &serde_json::Number| {
            value.as_u64().ok_or_else(|| {
                TypeError::InvalidVersionComponents(format!(
                    "{name} must be a non-negative integer, got {value}"
                ))
            })
        };
        Ok(Self::new(
            convert("major", major)?,
            convert("minor", minor)?,
            convert("patch", patch)?,
        ))
    }

    /// Components as a tuple.
    pub fn components(&self) -> (u64, u64, u64) {
        (self.major, self.minor, self.patch)
    }

    /// The version that follows `self` under the given bump.
    pub fn bump(&self, bump: Bump) -> Result<Self, TypeError> {
        let overflow =
            || TypeError::InvalidVersionComponents(format!("{bump} bump of {self} overflows"));
        match bump {
            Bump::Patch => Ok(Self::new(
                self.major,
                self.minor,
                self.patch.checked_add(1).ok_or_else(overflow)?,
            )),
            Bump::Minor => Ok(Self::new(
                self.major,
                self.minor.checked_add(1).ok_or_else(overflow)?,
                0,
            )),
            Bump::Major => Ok(Self::new(
                self.major.checked_add(1).ok_or_else(overflow)?,
                0,
                0,
            )),
        }
    }

    /// Next version after `current`, or [`Version::BASELINE`] when there is
    /// no history yet.
    pub fn next(current: Option<&Version>, bump: Bump) -> Result<Self, TypeError> {
        match current {
            None => Ok(Self::BASELINE),
            Some(version) => version.bump(bump),
        }
    }

    /// String form of [`Version::next`]: fails when `current` does not parse.
    pub fn next_from_str(current: Option<&str>, bump: Bump) -> Result<Self, TypeError> {
        let current = current.map(Self::parse).transpose()?;
        Self::next(current.as_ref(), bump)
    }
}

/// Render components in canonical form.
pub fn render(major: u64, minor: u64, patch: u64) -> String {
    Version::new(major, minor, patch).to_string()
}

/// Compare two version strings numerically.
pub fn compare(a: &str, b: &str) -> Result<Ordering, TypeError> {
    Ok(Version::parse(a)?.cmp(&Version::parse(b)?))
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Version({self})")
    }
}

impl FromStr for Version {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.to_string()
    }
}

/// Which component a new version increments.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bump {
    #[default]
    Patch,
    Minor,
    Major,
}

impl fmt::Display for Bump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Patch => f.write_str("patch"),
            Self::Minor => f.write_str("minor"),
            Self::Major => f.write_str("major"),
        }
    }
}

impl FromStr for Bump {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "patch" => Ok(Self::Patch),
            "minor" => Ok(Self::Minor),
            "major" => Ok(Self::Major),
            other => Err(TypeError::InvalidVersionComponents(format!(
                "unknown bump kind {other:?}"
            ))),
        }
    }
}

/// Aggregate statistics over a set of version strings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionStats {
    /// Number of entries that parsed.
    pub total: usize,
    pub latest: Option<Version>,
    pub oldest: Option<Version>,
    pub distinct_major: usize,
    pub distinct_minor_combinations: usize,
}

impl VersionStats {
    /// Compute statistics, silently skipping entries that fail to parse.
    pub fn from_strs<I, S>(versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::from_versions(
            versions
                .into_iter()
                .filter_map(|v| Version::parse(v.as_ref()).ok()),
        )
    }

    pub fn from_versions<I>(versions: I) -> Self
    where
        I: IntoIterator<Item = Version>,
    {
        let mut sorted: Vec<Version> = versions.into_iter().collect();
        if sorted.is_empty() {
            return Self::default();
        }
        sorted.sort();

        let majors: BTreeSet<u64> = sorted.iter().map(|v| v.major).collect();
        let minors: BTreeSet<(u64, u64)> = sorted.iter().map(|v| (v.major, v.minor)).collect();

        Self {
            total: sorted.len(),
            latest: sorted.last().copied(),
            oldest: sorted.first().copied(),
            distinct_major: majors.len(),
            distinct_minor_combinations: minors.len(),
        }
    }
}
