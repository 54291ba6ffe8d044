//! Rule params - the dependency edges of a rule under construction.
//!
//! Declared deps are visible to a target's dependents; extra deps are
//! needed to build this target only. The two are kept as separate sets
//! because merging them would change what dependents inherit.
//!
//! Every method returns a new `RuleParams`; nothing is edited in place.

use serde::Serialize;

use crate::core::dep_set::DepSet;
use crate::core::target::BuildTarget;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RuleParams {
    target: BuildTarget,
    declared_deps: DepSet,
    extra_deps: DepSet,
}

impl RuleParams {
    pub fn new(target: BuildTarget, declared_deps: DepSet, extra_deps: DepSet) -> Self {
        RuleParams {
            target,
            declared_deps,
            extra_deps,
        }
    }

    pub fn target(&self) -> BuildTarget {
        self.target
    }

    pub fn declared_deps(&self) -> &DepSet {
        &self.declared_deps
    }

    pub fn extra_deps(&self) -> &DepSet {
        &self.extra_deps
    }

    /// Declared deps followed by extra deps, each in their own order,
    /// without repeating a target present in both.
    pub fn all_deps(&self) -> Vec<BuildTarget> {
        let mut deps = self.declared_deps.to_vec();
        deps.extend(self.extra_deps.difference(&self.declared_deps).iter().copied());
        deps
    }

    /// Same edges, different target.
    pub fn with_target(&self, target: BuildTarget) -> Self {
        RuleParams {
            target,
            ..self.clone()
        }
    }

    pub fn with_declared_deps(&self, declared_deps: DepSet) -> Self {
        RuleParams {
            declared_deps,
            ..self.clone()
        }
    }

    pub fn appending_declared_deps(&self, deps: &DepSet) -> Self {
        self.with_declared_deps(self.declared_deps.union(deps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> BuildTarget {
        BuildTarget::parse(s).unwrap()
    }

    #[test]
    fn test_transformations_are_pure() {
        let params = RuleParams::new(t("//a:a"), DepSet::single(t("//b:b")), DepSet::new());
        let grown = params.appending_declared_deps(&DepSet::single(t("//c:c")));

        assert_eq!(params.declared_deps().len(), 1);
        assert_eq!(grown.declared_deps().len(), 2);
        assert_eq!(grown.target(), params.target());
    }

    #[test]
    fn test_all_deps_orders_declared_first() {
        let params = RuleParams::new(
            t("//a:a"),
            [t("//z:z"), t("//m:m")].into_iter().collect(),
            [t("//b:b"), t("//m:m")].into_iter().collect(),
        );

        assert_eq!(
            params.all_deps(),
            vec![t("//m:m"), t("//z:z"), t("//b:b")]
        );
    }
}
