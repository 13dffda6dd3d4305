use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;

use crate::builtins::FnRegistry;
use crate::config::Config;
use crate::diagnostics::BuildError;
use crate::evaluator::VariableEvaluator;
use crate::fs::FsGateway;
use crate::graph::RuleGraph;
use crate::lexer::Lexer;
use crate::parser::Parser;
use crate::process::ProcessSpawner;
use crate::runner::RuleRunner;

/// The conventional name of a build description file.
pub const DEFAULT_BUILDFILE: &str = "Buildfile";

/// Façade over the whole pipeline: lexes, parses, and evaluates a Buildfile
/// at construction, then runs rules on demand.
pub struct BuildOrchestrator {
    src_file: PathBuf,
    config: Arc<Config>,
    runner: RuleRunner,
}

impl BuildOrchestrator {
    pub fn new(
        fs: Arc<dyn FsGateway>,
        spawner: Arc<dyn ProcessSpawner>,
        src_file: impl Into<PathBuf>,
    ) -> Result<Self, BuildError> {
        let src_file = src_file.into();

        let lexemes = Lexer::from_path(&src_file)?.lex()?;
        debug!("Lexed {} lexemes from '{}'", lexemes.len(), src_file.display());

        let parsed = Parser::new(lexemes).parse()?;
        debug!("Parsed {} top-level bindings", parsed.len());

        let evaluation = VariableEvaluator::new(parsed, FnRegistry::default()).evaluate()?;

        let graph = RuleGraph::new(evaluation.rules);
        if graph.cyclical_dep_exists() {
            return Err(BuildError::logic("Cyclical dependency between rules"));
        }

        let config = Arc::new(evaluation.config);
        let runner = RuleRunner::new(Arc::new(graph), config.clone(), spawner, fs);

        Ok(Self {
            src_file,
            config,
            runner,
        })
    }

    pub fn run_rule(&self, name: &str) -> Result<(), BuildError> {
        self.runner.run_rule(name)
    }

    pub fn src_file(&self) -> &Path {
        &self.src_file
    }

    pub fn default_rule(&self) -> &str {
        &self.config.default_rule
    }
}
