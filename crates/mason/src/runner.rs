use std::sync::Arc;

use log::{debug, info};
use rustc_hash::FxHashSet;

use crate::config::Config;
use crate::diagnostics::BuildError;
use crate::fs::FsGateway;
use crate::graph::RuleGraph;
use crate::process::ProcessSpawner;

/// Walks the rule graph in post-order and dispatches the commands of every
/// stale rule. Dependencies run before their dependents, in declared order,
/// and each rule is attempted at most once per invocation.
pub struct RuleRunner {
    graph: Arc<RuleGraph>,
    config: Arc<Config>,
    spawner: Arc<dyn ProcessSpawner>,
    fs: Arc<dyn FsGateway>,
}

impl RuleRunner {
    pub fn new(
        graph: Arc<RuleGraph>,
        config: Arc<Config>,
        spawner: Arc<dyn ProcessSpawner>,
        fs: Arc<dyn FsGateway>,
    ) -> Self {
        Self {
            graph,
            config,
            spawner,
            fs,
        }
    }

    pub fn run_rule(&self, name: &str) -> Result<(), BuildError> {
        // Only names declared as rules can be asked for directly.
        self.graph.get_rule(name)?;
        let mut visited = FxHashSet::default();
        self.run_recurse(name, &mut visited)
    }

    fn run_recurse(&self, name: &str, visited: &mut FxHashSet<String>) -> Result<(), BuildError> {
        if !self.graph.is_rule(name) || visited.contains(name) {
            return Ok(());
        }

        self.run_one(name, visited).map_err(|err| {
            let err = err.during(format!("Running rule '{name}'"));
            match self.graph.get_rule(name) {
                Ok(rule) => err.at(rule.loc),
                Err(_) => err,
            }
        })
    }

    fn run_one(&self, name: &str, visited: &mut FxHashSet<String>) -> Result<(), BuildError> {
        for dep in self.graph.dependencies(name)? {
            self.run_recurse(dep, visited)?;
        }

        visited.insert(name.to_string());

        let rule = self.graph.get_rule(name)?;
        if rule.should_run(self.fs.as_ref())? {
            for cmd in rule.commands(&self.config) {
                info!("[{name}] {}", cmd.join(" "));
                self.spawner.run(&cmd)?;
            }
        } else {
            debug!("Rule '{name}' is up to date");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::builtins::Step;
    use crate::diagnostics::{ErrorKind, Location};
    use crate::fs::MemoryFs;
    use crate::process::RecordingSpawner;
    use crate::rules::{Rule, RuleKind};

    fn link_rule(name: &str, deps: &[&str]) -> Rule {
        Rule {
            name: name.into(),
            deps: deps.iter().map(|s| s.to_string()).collect(),
            loc: Location::new(1, 1, 0),
            kind: RuleKind::Single { step: Step::Link },
        }
    }

    fn config() -> Config {
        Config {
            name: "cfg".into(),
            compiler: "g++".into(),
            compilation_flags: vec![],
            link_flags: vec![],
            default_rule: "app".into(),
        }
    }

    struct Fixture {
        fs: Arc<MemoryFs>,
        spawner: Arc<RecordingSpawner>,
        runner: RuleRunner,
    }

    fn fixture(rules: Vec<Rule>) -> Fixture {
        let fs = Arc::new(MemoryFs::new());
        let spawner = Arc::new(RecordingSpawner::new(fs.clone()));
        let runner = RuleRunner::new(
            Arc::new(RuleGraph::new(rules)),
            Arc::new(config()),
            spawner.clone(),
            fs.clone(),
        );
        Fixture {
            fs,
            spawner,
            runner,
        }
    }

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn targets(commands: &[Vec<String>]) -> Vec<String> {
        commands
            .iter()
            .map(|cmd| cmd.last().unwrap().clone())
            .collect()
    }

    #[test]
    fn unknown_rule_is_a_logic_error() {
        let fixture = fixture(vec![]);
        let err = fixture.runner.run_rule("ghost").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Logic);
    }

    #[test]
    fn dependencies_run_before_dependents() {
        let fixture = fixture(vec![
            link_rule("app", &["a.o", "b.o"]),
            link_rule("a.o", &["a.cpp"]),
            link_rule("b.o", &["b.cpp"]),
        ]);
        fixture.fs.touch_at("a.cpp", at(1));
        fixture.fs.touch_at("b.cpp", at(1));

        fixture.runner.run_rule("app").unwrap();
        assert_eq!(targets(&fixture.spawner.commands()), ["a.o", "b.o", "app"]);
    }

    #[test]
    fn shared_dependency_runs_once() {
        // Diamond: both `a` and `b` depend on `common`.
        let fixture = fixture(vec![
            link_rule("app", &["a", "b"]),
            link_rule("a", &["common"]),
            link_rule("b", &["common"]),
            link_rule("common", &[]),
        ]);

        fixture.runner.run_rule("app").unwrap();
        assert_eq!(
            targets(&fixture.spawner.commands()),
            ["common", "a", "b", "app"]
        );
    }

    #[test]
    fn fresh_rules_are_skipped() {
        let fixture = fixture(vec![link_rule("app", &["a.cpp"])]);
        fixture.fs.touch_at("a.cpp", at(1));
        fixture.fs.touch_at("app", at(2));

        fixture.runner.run_rule("app").unwrap();
        assert!(fixture.spawner.commands().is_empty());
    }

    #[test]
    fn second_invocation_observes_fresh_state() {
        let fixture = fixture(vec![
            link_rule("app", &["main.o"]),
            link_rule("main.o", &["main.c"]),
        ]);
        fixture.fs.touch_at("main.c", at(1));

        fixture.runner.run_rule("app").unwrap();
        assert_eq!(targets(&fixture.spawner.commands()), ["main.o", "app"]);

        // Nothing changed on disk, so the second call is a no-op.
        fixture.runner.run_rule("app").unwrap();
        assert_eq!(fixture.spawner.commands().len(), 2);
    }

    #[test]
    fn failures_name_the_rule() {
        struct FailingSpawner;
        impl ProcessSpawner for FailingSpawner {
            fn run(&self, cmd: &[String]) -> Result<i32, BuildError> {
                Err(BuildError::system(format!(
                    "Process execution failed for command '{}'",
                    cmd.join(" ")
                )))
            }
        }

        let fs = Arc::new(MemoryFs::new());
        let runner = RuleRunner::new(
            Arc::new(RuleGraph::new(vec![
                link_rule("app", &["a.o"]),
                link_rule("a.o", &["a.cpp"]),
            ])),
            Arc::new(config()),
            Arc::new(FailingSpawner),
            fs,
        );

        let err = runner.run_rule("app").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::System);
        // The failing leaf and every rule above it appear as context frames.
        assert!(err
            .context_frames()
            .contains(&"Running rule 'a.o'".to_string()));
        assert!(err
            .context_frames()
            .contains(&"Running rule 'app'".to_string()));
    }
}
