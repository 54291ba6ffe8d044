//! Hashing utilities for node fingerprints.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// A hasher for building fingerprints from multiple components.
#[derive(Default)]
pub struct Fingerprint {
    hasher: Sha256,
}

impl Fingerprint {
    /// Create a new fingerprint builder.
    pub fn new() -> Self {
        Fingerprint {
            hasher: Sha256::new(),
        }
    }

    /// Add a string component to the fingerprint.
    pub fn update_str(&mut self, s: &str) -> &mut Self {
        self.hasher.update(s.as_bytes());
        self.hasher.update(b"\0"); // Separator
        self
    }

    /// Add multiple strings, prefixed by their count so that adjacent
    /// lists cannot shift elements between each other.
    pub fn update_strs<'a>(&mut self, items: impl IntoIterator<Item = &'a str>) -> &mut Self {
        let items: Vec<&str> = items.into_iter().collect();
        self.hasher.update((items.len() as u64).to_le_bytes());
        for s in items {
            self.update_str(s);
        }
        self
    }

    /// Add an optional string component.
    pub fn update_opt(&mut self, opt: Option<&str>) -> &mut Self {
        match opt {
            Some(s) => {
                self.hasher.update(b"\x01"); // Present marker
                self.update_str(s);
            }
            None => {
                self.hasher.update(b"\x00"); // Absent marker
            }
        }
        self
    }

    /// Add the JSON encoding of a value.
    ///
    /// Only stable for values whose serialization is ordered (sets and
    /// maps backed by `BTree*`), which is all this crate serializes.
    pub fn update_json<T: Serialize + ?Sized>(
        &mut self,
        value: &T,
    ) -> Result<&mut Self, serde_json::Error> {
        let encoded = serde_json::to_vec(value)?;
        self.hasher.update(&encoded);
        self.hasher.update(b"\0");
        Ok(self)
    }

    /// Finalize and return the fingerprint as a hex string.
    pub fn finish(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_fingerprint_is_hex_sha256() {
        let hash = |s: &str| {
            let mut fp = Fingerprint::new();
            fp.update_str(s);
            fp.finish()
        };
        assert_eq!(hash("hello").len(), 64);
        assert_eq!(hash("hello"), hash("hello"));
        assert_ne!(hash("hello"), hash("hello "));
    }

    #[test]
    fn test_json_is_order_independent_for_btree() {
        let a: BTreeMap<&str, u32> = [("x", 1), ("y", 2)].into_iter().collect();
        let b: BTreeMap<&str, u32> = [("y", 2), ("x", 1)].into_iter().collect();

        let mut fa = Fingerprint::new();
        fa.update_json(&a).unwrap();
        let mut fb = Fingerprint::new();
        fb.update_json(&b).unwrap();

        assert_eq!(fa.finish(), fb.finish());
    }

    #[test]
    fn test_fingerprint_list_boundaries() {
        let fp1 = {
            let mut fp = Fingerprint::new();
            fp.update_strs(["a", "b"]).update_strs(["c"]);
            fp.finish()
        };

        let fp2 = {
            let mut fp = Fingerprint::new();
            fp.update_strs(["a"]).update_strs(["b", "c"]);
            fp.finish()
        };

        assert_ne!(fp1, fp2);
    }

    #[test]
    fn test_fingerprint_optional_component() {
        let absent = {
            let mut fp = Fingerprint::new();
            fp.update_opt(None).update_json(&vec![1, 2]).unwrap();
            fp.finish()
        };

        let present = {
            let mut fp = Fingerprint::new();
            fp.update_opt(Some("")).update_json(&vec![1, 2]).unwrap();
            fp.finish()
        };

        assert_ne!(absent, present);
    }
}
