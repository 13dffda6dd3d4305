use std::collections::VecDeque;

use rustc_hash::FxHashMap;

use crate::diagnostics::BuildError;
use crate::rules::Rule;

/// The rules of a Buildfile viewed as a directed dependency graph.
/// Dependencies that are not themselves rules are file leaves and are not
/// indexed.
#[derive(Debug, Default)]
pub struct RuleGraph {
    rules: FxHashMap<String, Rule>,
    deps: FxHashMap<String, Vec<String>>,
}

impl RuleGraph {
    pub fn new(rules: Vec<Rule>) -> Self {
        let mut graph = Self::default();
        for rule in rules {
            graph.deps.insert(rule.name.clone(), rule.deps.clone());
            graph.rules.insert(rule.name.clone(), rule);
        }
        graph
    }

    pub fn num_rules(&self) -> usize {
        self.rules.len()
    }

    pub fn is_rule(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    pub fn get_rule(&self, name: &str) -> Result<&Rule, BuildError> {
        self.rules
            .get(name)
            .ok_or_else(|| missing_rule(name))
    }

    pub fn dependencies(&self, name: &str) -> Result<&[String], BuildError> {
        self.deps
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| missing_rule(name))
    }

    /// Cycle detection via Kahn's algorithm, restricted to rule-to-rule
    /// edges. Self-loops count as cycles.
    pub fn cyclical_dep_exists(&self) -> bool {
        let mut indegree: FxHashMap<&str, usize> =
            self.rules.keys().map(|name| (name.as_str(), 0)).collect();
        for deps in self.deps.values() {
            for dep in deps.iter().filter(|dep| self.is_rule(dep)) {
                *indegree
                    .get_mut(dep.as_str())
                    .expect("rule dependencies were indexed above") += 1;
            }
        }

        let mut queue: VecDeque<&str> = indegree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(name, _)| *name)
            .collect();

        let mut reached = 0;
        while let Some(name) = queue.pop_front() {
            reached += 1;
            let deps = self.deps.get(name).map(Vec::as_slice).unwrap_or_default();
            for dep in deps.iter().filter(|dep| self.is_rule(dep)) {
                let degree = indegree
                    .get_mut(dep.as_str())
                    .expect("rule dependencies were indexed above");
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(dep.as_str());
                }
            }
        }

        reached != self.num_rules()
    }
}

fn missing_rule(name: &str) -> BuildError {
    BuildError::logic(format!("Cannot find rule '{name}' on rule graph"))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::builtins::Step;
    use crate::diagnostics::{ErrorKind, Location};
    use crate::rules::RuleKind;

    fn link_rule(name: &str, deps: &[&str]) -> Rule {
        Rule {
            name: name.into(),
            deps: deps.iter().map(|s| s.to_string()).collect(),
            loc: Location::new(1, 1, 0),
            kind: RuleKind::Single { step: Step::Link },
        }
    }

    #[test]
    fn indexes_rules_by_name() {
        let graph = RuleGraph::new(vec![link_rule("app", &["a.o"]), link_rule("a.o", &[])]);
        assert_eq!(graph.num_rules(), 2);
        assert!(graph.is_rule("app"));
        assert!(!graph.is_rule("a.cpp"));
        assert_eq!(graph.get_rule("app").unwrap().name, "app");
        assert_eq!(graph.dependencies("app").unwrap(), ["a.o"]);
    }

    #[test]
    fn missing_rule_lookups_fail() {
        let graph = RuleGraph::new(vec![]);
        assert_eq!(graph.get_rule("app").unwrap_err().kind(), ErrorKind::Logic);
        assert_eq!(
            graph.dependencies("app").unwrap_err().kind(),
            ErrorKind::Logic
        );
    }

    #[test]
    fn acyclic_graph() {
        let graph = RuleGraph::new(vec![
            link_rule("app", &["a.o", "b.o"]),
            link_rule("a.o", &["a.cpp"]),
            link_rule("b.o", &["b.cpp"]),
        ]);
        assert!(!graph.cyclical_dep_exists());
    }

    #[test]
    fn file_leaves_do_not_participate() {
        // `a.cpp` is not a rule; it must not influence degree counts.
        let graph = RuleGraph::new(vec![link_rule("app", &["a.cpp", "a.cpp"])]);
        assert!(!graph.cyclical_dep_exists());
    }

    #[test]
    fn two_rule_cycle() {
        let graph = RuleGraph::new(vec![link_rule("a", &["b"]), link_rule("b", &["a"])]);
        assert!(graph.cyclical_dep_exists());
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let graph = RuleGraph::new(vec![link_rule("a", &["a"])]);
        assert!(graph.cyclical_dep_exists());
    }

    #[test]
    fn cycle_beside_reachable_rules() {
        let graph = RuleGraph::new(vec![
            link_rule("app", &["a.o"]),
            link_rule("a.o", &[]),
            link_rule("x", &["y"]),
            link_rule("y", &["x"]),
        ]);
        assert!(graph.cyclical_dep_exists());
    }

    #[test]
    fn empty_graph_has_no_cycle() {
        let graph = RuleGraph::new(vec![]);
        assert!(!graph.cyclical_dep_exists());
    }
}
