//! Flavors - tags that select an alternate rule variant of a target.
//!
//! Flavors come from a fixed namespace. A flavored target keeps the base
//! label of its parent and is a distinct identifier in the graph.

use serde::{Deserialize, Serialize};

/// A flavor tag appended to a target identifier.
///
/// The declaration order of the variants is the canonical order in which
/// flavors are rendered after `#`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Flavor {
    /// ABI-only view of a compiled library
    #[serde(rename = "class-abi")]
    ClassAbi,
    /// Library holding the compiled test sources of a test target
    #[serde(rename = "compiled-tests")]
    CompiledTests,
    /// Generated resources (dummy `R.java`) for a target
    #[serde(rename = "dummy_r_dot_java")]
    DummyRDotJava,
    /// Bridge node exposing native libraries to a JVM process
    #[serde(rename = "native-libs")]
    NativeLibs,
}

impl Flavor {
    /// Every known flavor, in canonical order.
    pub const ALL: [Flavor; 4] = [
        Flavor::ClassAbi,
        Flavor::CompiledTests,
        Flavor::DummyRDotJava,
        Flavor::NativeLibs,
    ];

    /// Get the flavor name as written in a target label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Flavor::ClassAbi => "class-abi",
            Flavor::CompiledTests => "compiled-tests",
            Flavor::DummyRDotJava => "dummy_r_dot_java",
            Flavor::NativeLibs => "native-libs",
        }
    }

    /// Whether this flavor may not appear next to `class-abi`.
    ///
    /// The ABI of a target is derived from its main library output, so the
    /// synthetic test-library and resource variants have no ABI of their own.
    pub fn conflicts_with_abi(&self) -> bool {
        matches!(self, Flavor::CompiledTests | Flavor::DummyRDotJava)
    }
}

impl std::fmt::Display for Flavor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Flavor {
    type Err = FlavorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Flavor::ALL
            .into_iter()
            .find(|flavor| flavor.as_str() == s)
            .ok_or_else(|| FlavorParseError(s.to_string()))
    }
}

/// Error returned when parsing an unknown flavor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlavorParseError(pub String);

impl std::fmt::Display for FlavorParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unknown flavor '{}', valid values: class-abi, compiled-tests, dummy_r_dot_java, native-libs",
            self.0
        )
    }
}

impl std::error::Error for FlavorParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flavor_round_trips_through_str() {
        for flavor in Flavor::ALL {
            assert_eq!(flavor.as_str().parse::<Flavor>().unwrap(), flavor);
        }
    }

    #[test]
    fn test_unknown_flavor_is_rejected() {
        let err = "shared".parse::<Flavor>().unwrap_err();
        assert_eq!(err, FlavorParseError("shared".to_string()));
        assert!(err.to_string().contains("class-abi"));
    }

    #[test]
    fn test_abi_conflicts() {
        assert!(!Flavor::ClassAbi.conflicts_with_abi());
        assert!(Flavor::CompiledTests.conflicts_with_abi());
        assert!(Flavor::DummyRDotJava.conflicts_with_abi());
        assert!(!Flavor::NativeLibs.conflicts_with_abi());
    }
}
