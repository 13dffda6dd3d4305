use std::collections::VecDeque;

use log::debug;
use rustc_hash::FxHashMap;

use crate::builtins::FnRegistry;
use crate::config::Config;
use crate::diagnostics::{BuildError, ResultExt};
use crate::expr::{Expr, VarMap};
use crate::parser::{ParsedVariable, VarCategory};
use crate::rules::Rule;

type DepGraph = FxHashMap<String, Vec<String>>;

/// The qualified dictionaries extracted from a fully evaluated Buildfile.
#[derive(Debug)]
pub struct Evaluation {
    pub rules: Vec<Rule>,
    pub config: Config,
}

/// Evaluates parsed variables in dependency order and collects the rules and
/// configuration they declare.
pub struct VariableEvaluator {
    variables: Vec<ParsedVariable>,
    registry: FnRegistry,
}

impl VariableEvaluator {
    pub fn new(variables: Vec<ParsedVariable>, registry: FnRegistry) -> Self {
        Self {
            variables,
            registry,
        }
    }

    pub fn evaluate(mut self) -> Result<Evaluation, BuildError> {
        let deps: DepGraph = self
            .variables
            .iter()
            .map(|var| (var.identifier.clone(), referenced_ids(&var.expr)))
            .collect();

        let order = evaluation_order(&deps)?;
        let position: FxHashMap<&str, usize> = order
            .iter()
            .enumerate()
            .map(|(idx, id)| (id.as_str(), idx))
            .collect();
        self.variables
            .sort_by_key(|var| position.get(var.identifier.as_str()).copied());

        let mut var_map = VarMap::default();
        let mut rules = Vec::new();
        let mut config: Option<Config> = None;

        for var in &self.variables {
            let id = &var.identifier;
            let value = var
                .expr
                .evaluate(&var_map, &self.registry)
                .during(format!("Evaluating variable '{id}'"))
                .at(var.loc)?;

            match var.category {
                VarCategory::Regular => {}
                VarCategory::SingleRule => rules.push(
                    Rule::single(id.clone(), &value, var.loc)
                        .during(format!("Building rule '{id}'"))
                        .at(var.loc)?,
                ),
                VarCategory::MultiRule => rules.push(
                    Rule::multi(id.clone(), &value, var.loc)
                        .during(format!("Building rule '{id}'"))
                        .at(var.loc)?,
                ),
                VarCategory::Clean => rules.push(
                    Rule::clean(id.clone(), &value, var.loc)
                        .during(format!("Building rule '{id}'"))
                        .at(var.loc)?,
                ),
                VarCategory::Config => {
                    if config.is_some() {
                        return Err(BuildError::syntax(
                            "Duplicate <Config> dictionaries. Only one configuration may be set",
                        )
                        .at(var.loc));
                    }
                    config = Some(
                        Config::from_value(id.clone(), &value)
                            .during("Reading configuration")
                            .at(var.loc)?,
                    );
                }
            }

            var_map.insert(id.clone(), value);
        }

        debug!("Evaluated {} variables, {} rules", var_map.len(), rules.len());

        let config = config
            .ok_or_else(|| BuildError::logic("Could not find <Config> qualified dictionary"))?;

        Ok(Evaluation { rules, config })
    }
}

/// Every identifier referenced anywhere in `expr`, gathered breadth-first.
fn referenced_ids(expr: &Expr) -> Vec<String> {
    let mut queue: VecDeque<&Expr> = VecDeque::from([expr]);
    let mut ids = Vec::new();

    while let Some(node) = queue.pop_front() {
        if let Expr::VarRef(id) = node {
            ids.push(id.clone());
        }
        queue.extend(node.children());
    }

    ids
}

/// Kahn's algorithm over the variable dependency graph. Returns identifiers
/// ordered so that every variable follows everything it references.
fn evaluation_order(deps: &DepGraph) -> Result<Vec<String>, BuildError> {
    let mut indegree: FxHashMap<&str, usize> = FxHashMap::default();
    for (id, adjacent) in deps {
        indegree.entry(id.as_str()).or_insert(0);
        for dep in adjacent {
            *indegree.entry(dep.as_str()).or_insert(0) += 1;
        }
    }
    let node_count = indegree.len();

    let mut queue: VecDeque<&str> = indegree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| *id)
        .collect();

    let mut ordered = Vec::with_capacity(node_count);
    while let Some(id) = queue.pop_front() {
        ordered.push(id.to_string());
        for dep in deps.get(id).map(Vec::as_slice).unwrap_or_default() {
            let degree = indegree
                .get_mut(dep.as_str())
                .expect("adjacency lists were indexed above");
            *degree -= 1;
            if *degree == 0 {
                queue.push_back(dep.as_str());
            }
        }
    }

    if ordered.len() != node_count {
        return Err(BuildError::logic(format!(
            "Cyclical dependency between variables ({} of {} resolved)",
            ordered.len(),
            node_count
        )));
    }

    // Referencers were popped first; evaluation wants leaves first.
    ordered.reverse();
    Ok(ordered)
}
