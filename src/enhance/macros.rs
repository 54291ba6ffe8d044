//! Macro expansion in string arguments.
//!
//! A string argument such as an environment value may embed macros of the
//! form `$(name arg ...)`. Macros are looked at twice:
//!
//! - at graph-construction time, `extract_deps` collects the targets they
//!   reference so the enclosing rule depends on them;
//! - when the value is materialized, `substitute` replaces each macro with
//!   its runtime value.
//!
//! Both go through `MacroExpander::referenced_target`, so the target a
//! macro is expanded against is always the one that was declared as a dep.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::core::dep_set::DepSet;
use crate::core::target::BuildTarget;
use crate::enhance::errors::EnhanceError;

/// One `$(...)` occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MacroInvocation {
    pub name: String,
    pub args: Vec<String>,
    /// Byte offset of the `$` in the raw string
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MacroPart {
    Literal(String),
    Macro(MacroInvocation),
}

/// A string argument split into literal and macro parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MacroString {
    raw: String,
    parts: Vec<MacroPart>,
}

impl MacroString {
    /// Split `raw` into parts. `owner` is only used for error reporting.
    pub fn parse(owner: &BuildTarget, raw: &str) -> Result<Self, EnhanceError> {
        let syntax_error = |position: usize, reason: &str| EnhanceError::MacroSyntax {
            target: *owner,
            raw: raw.to_string(),
            position,
            reason: reason.to_string(),
        };

        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut chars = raw.char_indices().peekable();

        while let Some((i, c)) = chars.next() {
            match c {
                '\\' if matches!(chars.peek(), Some((_, '$'))) => {
                    chars.next();
                    literal.push('$');
                }
                '$' if matches!(chars.peek(), Some((_, '('))) => {
                    chars.next();
                    let body_start = i + 2;
                    let body_end = raw[body_start..]
                        .find(')')
                        .map(|end| body_start + end)
                        .ok_or_else(|| syntax_error(i, "unterminated macro"))?;

                    let body = &raw[body_start..body_end];
                    if body.contains('(') {
                        return Err(syntax_error(i, "nested macros are not supported"));
                    }
                    let mut words = body.split_whitespace();
                    let name = words
                        .next()
                        .ok_or_else(|| syntax_error(i, "empty macro"))?
                        .to_string();

                    if !literal.is_empty() {
                        parts.push(MacroPart::Literal(std::mem::take(&mut literal)));
                    }
                    parts.push(MacroPart::Macro(MacroInvocation {
                        name,
                        args: words.map(str::to_string).collect(),
                        position: i,
                    }));

                    // skip past the closing paren
                    while let Some(&(j, _)) = chars.peek() {
                        if j > body_end {
                            break;
                        }
                        chars.next();
                    }
                }
                _ => literal.push(c),
            }
        }

        if !literal.is_empty() {
            parts.push(MacroPart::Literal(literal));
        }

        Ok(MacroString {
            raw: raw.to_string(),
            parts,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn parts(&self) -> &[MacroPart] {
        &self.parts
    }

    /// Iterate the macro invocations in order of appearance.
    pub fn macros(&self) -> impl Iterator<Item = &MacroInvocation> + '_ {
        self.parts.iter().filter_map(|part| match part {
            MacroPart::Macro(invocation) => Some(invocation),
            MacroPart::Literal(_) => None,
        })
    }
}

impl fmt::Display for MacroString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for MacroString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.raw)
    }
}

/// Looks up the materialized output of a target.
pub trait ArtifactResolver {
    fn artifact_path(&self, target: &BuildTarget) -> Option<PathBuf>;
}

impl ArtifactResolver for BTreeMap<BuildTarget, PathBuf> {
    fn artifact_path(&self, target: &BuildTarget) -> Option<PathBuf> {
        self.get(target).cloned()
    }
}

/// Handler for one macro name.
pub trait MacroExpander: Send + Sync {
    fn name(&self) -> &'static str;

    /// The target an invocation refers to, if any.
    fn referenced_target(
        &self,
        owner: &BuildTarget,
        raw: &str,
        invocation: &MacroInvocation,
    ) -> Result<Option<BuildTarget>, EnhanceError>;

    /// Produce the runtime value for an invocation whose target was
    /// resolved by `referenced_target`.
    fn expand(
        &self,
        owner: &BuildTarget,
        target: Option<BuildTarget>,
        artifacts: &dyn ArtifactResolver,
    ) -> Result<String, EnhanceError>;
}

/// `$(location //package:name)` - the output path of a target.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocationMacroExpander;

impl MacroExpander for LocationMacroExpander {
    fn name(&self) -> &'static str {
        "location"
    }

    fn referenced_target(
        &self,
        owner: &BuildTarget,
        raw: &str,
        invocation: &MacroInvocation,
    ) -> Result<Option<BuildTarget>, EnhanceError> {
        let syntax_error = |reason: String| EnhanceError::MacroSyntax {
            target: *owner,
            raw: raw.to_string(),
            position: invocation.position,
            reason,
        };

        match invocation.args.as_slice() {
            [label] => BuildTarget::parse_relative(owner, label)
                .map(Some)
                .map_err(|e| syntax_error(e.to_string())),
            args => Err(syntax_error(format!(
                "`location` takes exactly one target, got {}",
                args.len()
            ))),
        }
    }

    fn expand(
        &self,
        owner: &BuildTarget,
        target: Option<BuildTarget>,
        artifacts: &dyn ArtifactResolver,
    ) -> Result<String, EnhanceError> {
        let Some(target) = target else {
            return Ok(String::new());
        };
        artifacts
            .artifact_path(&target)
            .map(|path| path.display().to_string())
            .ok_or(EnhanceError::MissingArtifact {
                requester: *owner,
                target,
            })
    }
}

/// The macro vocabulary available to a pass or session.
///
/// Constructed explicitly and handed to whoever expands macros; there is
/// no process-wide table.
pub struct MacroRegistry {
    expanders: BTreeMap<&'static str, Box<dyn MacroExpander>>,
}

impl MacroRegistry {
    /// Create a registry with the built-in macros (`location`).
    pub fn new() -> Self {
        let mut registry = MacroRegistry::empty();
        registry.register(Box::new(LocationMacroExpander));
        registry
    }

    /// Create a registry that knows no macros.
    pub fn empty() -> Self {
        MacroRegistry {
            expanders: BTreeMap::new(),
        }
    }

    /// Register an expander, replacing one with the same name.
    pub fn register(&mut self, expander: Box<dyn MacroExpander>) {
        self.expanders.insert(expander.name(), expander);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.expanders.contains_key(name)
    }

    /// Get all registered macro names.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.expanders.keys().copied()
    }

    fn expander(
        &self,
        owner: &BuildTarget,
        value: &MacroString,
        invocation: &MacroInvocation,
    ) -> Result<&dyn MacroExpander, EnhanceError> {
        self.expanders
            .get(invocation.name.as_str())
            .map(|e| e.as_ref())
            .ok_or_else(|| EnhanceError::MacroSyntax {
                target: *owner,
                raw: value.raw().to_string(),
                position: invocation.position,
                reason: format!("unrecognized macro `{}`", invocation.name),
            })
    }

    /// Collect the targets referenced by macros in `raw`.
    pub fn extract_deps(&self, owner: &BuildTarget, raw: &str) -> Result<DepSet, EnhanceError> {
        self.extract_deps_parsed(owner, &MacroString::parse(owner, raw)?)
    }

    pub fn extract_deps_parsed(
        &self,
        owner: &BuildTarget,
        value: &MacroString,
    ) -> Result<DepSet, EnhanceError> {
        let mut deps = DepSet::new();
        for invocation in value.macros() {
            let expander = self.expander(owner, value, invocation)?;
            if let Some(target) = expander.referenced_target(owner, value.raw(), invocation)? {
                deps.insert(target);
            }
        }
        Ok(deps)
    }

    /// Replace every macro in `raw` with its runtime value.
    pub fn substitute(
        &self,
        owner: &BuildTarget,
        raw: &str,
        artifacts: &dyn ArtifactResolver,
    ) -> Result<String, EnhanceError> {
        self.substitute_parsed(owner, &MacroString::parse(owner, raw)?, artifacts)
    }

    pub fn substitute_parsed(
        &self,
        owner: &BuildTarget,
        value: &MacroString,
        artifacts: &dyn ArtifactResolver,
    ) -> Result<String, EnhanceError> {
        let mut out = String::with_capacity(value.raw().len());
        for part in value.parts() {
            match part {
                MacroPart::Literal(text) => out.push_str(text),
                MacroPart::Macro(invocation) => {
                    let expander = self.expander(owner, value, invocation)?;
                    let target = expander.referenced_target(owner, value.raw(), invocation)?;
                    out.push_str(&expander.expand(owner, target, artifacts)?);
                }
            }
        }
        Ok(out)
    }
}

impl Default for MacroRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> BuildTarget {
        BuildTarget::parse(s).unwrap()
    }

    fn owner() -> BuildTarget {
        t("//app:test")
    }

    #[test]
    fn test_parse_literal_only() {
        let value = MacroString::parse(&owner(), "plain value").unwrap();
        assert_eq!(value.parts(), &[MacroPart::Literal("plain value".to_string())]);
        assert_eq!(value.macros().count(), 0);
    }

    #[test]
    fn test_parse_mixed_parts() {
        let value = MacroString::parse(&owner(), "--data=$(location //x:y):rest").unwrap();
        assert_eq!(value.parts().len(), 3);

        let invocation = value.macros().next().unwrap();
        assert_eq!(invocation.name, "location");
        assert_eq!(invocation.args, vec!["//x:y"]);
        assert_eq!(invocation.position, 7);
        assert!(matches!(&value.parts()[2], MacroPart::Literal(s) if s == ":rest"));
    }

    #[test]
    fn test_escaped_dollar_stays_literal() {
        let value = MacroString::parse(&owner(), r"cost \$(5) and $HOME").unwrap();
        assert_eq!(value.macros().count(), 0);

        let registry = MacroRegistry::new();
        let empty: BTreeMap<BuildTarget, PathBuf> = BTreeMap::new();
        assert_eq!(
            registry.substitute(&owner(), r"cost \$(5) and $HOME", &empty).unwrap(),
            "cost $(5) and $HOME"
        );
    }

    #[test]
    fn test_syntax_errors() {
        for raw in ["$(location //x:y", "$( )", "$(location $(location //a:b))"] {
            let err = MacroString::parse(&owner(), raw).unwrap_err();
            assert!(
                matches!(err, EnhanceError::MacroSyntax { raw: ref r, .. } if r == raw),
                "{raw}: {err}"
            );
        }
    }

    #[test]
    fn test_unknown_macro_is_rejected() {
        let registry = MacroRegistry::new();
        let err = registry.extract_deps(&owner(), "$(exe //tools:gen)").unwrap_err();

        match err {
            EnhanceError::MacroSyntax { target, reason, .. } => {
                assert_eq!(target, owner());
                assert!(reason.contains("exe"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_location_arity() {
        let registry = MacroRegistry::new();
        assert!(registry.extract_deps(&owner(), "$(location)").is_err());
        assert!(registry.extract_deps(&owner(), "$(location //a:b //c:d)").is_err());
        assert!(registry.extract_deps(&owner(), "$(location not-a-target)").is_err());
    }

    #[test]
    fn test_extract_and_substitute_agree() {
        let registry = MacroRegistry::new();
        let raw = "$(location //x:y) $(location :fixtures)";

        let deps = registry.extract_deps(&owner(), raw).unwrap();
        assert_eq!(deps.to_vec(), vec![t("//app:fixtures"), t("//x:y")]);

        let artifacts: BTreeMap<BuildTarget, PathBuf> = deps
            .iter()
            .map(|d| (*d, PathBuf::from(format!("/out/{}", d.short_name()))))
            .collect();
        assert_eq!(
            registry.substitute(&owner(), raw, &artifacts).unwrap(),
            "/out/y /out/fixtures"
        );
    }

    #[test]
    fn test_substitute_without_artifact_fails() {
        let registry = MacroRegistry::new();
        let empty: BTreeMap<BuildTarget, PathBuf> = BTreeMap::new();
        let err = registry
            .substitute(&owner(), "$(location //x:y)", &empty)
            .unwrap_err();
        assert!(matches!(err, EnhanceError::MissingArtifact { target, .. } if target == t("//x:y")));
    }

    #[test]
    fn test_empty_registry_knows_nothing() {
        let registry = MacroRegistry::empty();
        assert!(!registry.contains("location"));
        assert!(registry.extract_deps(&owner(), "$(location //x:y)").is_err());
        assert_eq!(MacroRegistry::new().names().collect::<Vec<_>>(), vec!["location"]);
    }
}
