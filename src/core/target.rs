//! Target identification - WHICH rule (base label + flavors).
//!
//! A `BuildTarget` is the identifier every rule node is keyed by. Base
//! labels are interned so identifiers are `Copy` and compare by pointer;
//! ordering still follows the label text so that sets of targets iterate
//! in the same order on every run.

use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::{LazyLock, PoisonError, RwLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::flavor::Flavor;

/// Global base-label interner
static LABEL_INTERNER: LazyLock<RwLock<HashSet<&'static str>>> =
    LazyLock::new(|| RwLock::new(HashSet::new()));

/// `[cell]//package/path:name`
static LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9_.-]*)//([A-Za-z0-9_./+-]*):([A-Za-z0-9_.+=,@~-]+)$")
        .expect("label regex is valid")
});

/// Errors produced while parsing a target label.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetParseError {
    #[error("malformed target `{label}`: expected `[cell]//package:name`")]
    Malformed { label: String },

    #[error("target `{label}` has an empty flavor")]
    EmptyFlavor { label: String },

    #[error("target `{label}`: unknown flavor `{flavor}`")]
    UnknownFlavor { label: String, flavor: String },

    #[error("relative target `{label}` needs an owning target to resolve against")]
    Relative { label: String },
}

/// An interned base label such as `//java/com/example:lib`.
#[derive(Clone, Copy)]
struct Label(&'static str);

impl Label {
    fn intern(s: &str) -> Self {
        {
            let interner = LABEL_INTERNER.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(&interned) = interner.get(s) {
                return Label(interned);
            }
        }

        let mut interner = LABEL_INTERNER.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(&interned) = interner.get(s) {
            return Label(interned);
        }

        let leaked: &'static str = Box::leak(s.to_string().into_boxed_str());
        interner.insert(leaked);
        Label(leaked)
    }
}

impl PartialEq for Label {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.0, other.0)
    }
}

impl Eq for Label {}

impl Hash for Label {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(self.0, state)
    }
}

impl PartialOrd for Label {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Label {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(other.0)
    }
}

/// An ordered set of flavors, stored as a bitmask over `Flavor::ALL`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FlavorSet(u8);

impl FlavorSet {
    fn bit(flavor: Flavor) -> u8 {
        1 << (flavor as u8)
    }

    /// Check whether the set holds a flavor.
    pub fn contains(&self, flavor: Flavor) -> bool {
        self.0 & Self::bit(flavor) != 0
    }

    /// Return a copy with the flavor added.
    pub fn with(self, flavor: Flavor) -> Self {
        FlavorSet(self.0 | Self::bit(flavor))
    }

    /// Return a copy with the flavor removed.
    pub fn without(self, flavor: Flavor) -> Self {
        FlavorSet(self.0 & !Self::bit(flavor))
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Iterate flavors in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = Flavor> + '_ {
        Flavor::ALL.into_iter().filter(|f| self.contains(*f))
    }
}

impl FromIterator<Flavor> for FlavorSet {
    fn from_iter<I: IntoIterator<Item = Flavor>>(iter: I) -> Self {
        iter.into_iter().fold(FlavorSet::default(), FlavorSet::with)
    }
}

/// A globally unique target identifier.
///
/// Identifiers are immutable: `with_flavor` and friends return a new,
/// distinct identifier and leave `self` alone.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BuildTarget {
    base: Label,
    flavors: FlavorSet,
}

impl BuildTarget {
    /// Parse a fully qualified label, optionally carrying `#flavor,...`.
    pub fn parse(s: &str) -> Result<Self, TargetParseError> {
        let (base, flavors) = match s.split_once('#') {
            Some((base, flavors)) => (base, Some(flavors)),
            None => (s, None),
        };

        if base.starts_with(':') {
            return Err(TargetParseError::Relative {
                label: s.to_string(),
            });
        }
        if !LABEL_RE.is_match(base) {
            return Err(TargetParseError::Malformed {
                label: s.to_string(),
            });
        }

        let mut set = FlavorSet::default();
        if let Some(flavors) = flavors {
            for flavor in flavors.split(',') {
                if flavor.is_empty() {
                    return Err(TargetParseError::EmptyFlavor {
                        label: s.to_string(),
                    });
                }
                let parsed =
                    Flavor::from_str(flavor).map_err(|_| TargetParseError::UnknownFlavor {
                        label: s.to_string(),
                        flavor: flavor.to_string(),
                    })?;
                set = set.with(parsed);
            }
        }

        Ok(BuildTarget {
            base: Label::intern(base),
            flavors: set,
        })
    }

    /// Parse a label that may be relative (`:name`) to `owner`'s package.
    pub fn parse_relative(owner: &BuildTarget, s: &str) -> Result<Self, TargetParseError> {
        if s.starts_with(':') {
            let (prefix, _) = owner
                .base
                .0
                .rsplit_once(':')
                .ok_or_else(|| TargetParseError::Malformed {
                    label: owner.to_string(),
                })?;
            BuildTarget::parse(&format!("{}{}", prefix, s))
        } else {
            BuildTarget::parse(s)
        }
    }

    /// Get the base label without flavors.
    pub fn base(&self) -> &'static str {
        self.base.0
    }

    /// Get the cell name (empty for the root cell).
    pub fn cell(&self) -> &'static str {
        self.base.0.split_once("//").map(|(c, _)| c).unwrap_or("")
    }

    /// Get the package path between `//` and `:`.
    pub fn package(&self) -> &'static str {
        let rest = self.base.0.split_once("//").map(|(_, r)| r).unwrap_or("");
        rest.rsplit_once(':').map(|(p, _)| p).unwrap_or("")
    }

    /// Get the short name after `:`.
    pub fn short_name(&self) -> &'static str {
        self.base.0.rsplit_once(':').map(|(_, n)| n).unwrap_or("")
    }

    /// Get the flavor set.
    pub fn flavors(&self) -> FlavorSet {
        self.flavors
    }

    /// Check whether the target carries the given flavor.
    pub fn has_flavor(&self, flavor: Flavor) -> bool {
        self.flavors.contains(flavor)
    }

    pub fn is_flavored(&self) -> bool {
        !self.flavors.is_empty()
    }

    /// Derive a new identifier with `flavor` appended.
    pub fn with_flavor(&self, flavor: Flavor) -> Self {
        BuildTarget {
            base: self.base,
            flavors: self.flavors.with(flavor),
        }
    }

    /// Derive a new identifier with all of `flavors` appended.
    pub fn with_flavors(&self, flavors: impl IntoIterator<Item = Flavor>) -> Self {
        flavors
            .into_iter()
            .fold(*self, |target, flavor| target.with_flavor(flavor))
    }

    /// Derive a new identifier with `flavor` removed.
    pub fn without_flavor(&self, flavor: Flavor) -> Self {
        BuildTarget {
            base: self.base,
            flavors: self.flavors.without(flavor),
        }
    }

    /// The un-flavored identifier sharing this base label.
    pub fn unflavored(&self) -> Self {
        BuildTarget {
            base: self.base,
            flavors: FlavorSet::default(),
        }
    }
}

impl FromStr for BuildTarget {
    type Err = TargetParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BuildTarget::parse(s)
    }
}

impl fmt::Display for BuildTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.base.0)?;
        for (i, flavor) in self.flavors.iter().enumerate() {
            f.write_str(if i == 0 { "#" } else { "," })?;
            f.write_str(flavor.as_str())?;
        }
        Ok(())
    }
}

impl fmt::Debug for BuildTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BuildTarget({})", self)
    }
}

impl Serialize for BuildTarget {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BuildTarget {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        BuildTarget::parse(&s).map_err(serde::de::Error::custom)
    }
}
