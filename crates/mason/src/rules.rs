use crate::builtins::Step;
use crate::config::Config;
use crate::diagnostics::{BuildError, Location};
use crate::fs::FsGateway;
use crate::value::{vectorise, Value, ValueType};

const DEPS: &str = "deps";
const STEP: &str = "step";
const OUTPUT: &str = "output";
const TARGETS: &str = "targets";

/// An argument vector; the first element is the executable name.
pub type Command = Vec<String>;

/// Per-variant payload of a [`Rule`].
#[derive(Debug, Clone, PartialEq)]
pub enum RuleKind {
    /// Many inputs, one output named after the rule.
    Single { step: Step },
    /// Parallel one-input-one-output pairs; `outputs[i]` is built from
    /// `deps[i]`.
    Multi { outputs: Vec<String>, step: Step },
    /// Deletes its targets; always considered stale.
    Clean,
}

/// A named unit of work: a dependency list plus a command-generation policy.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub name: String,
    pub deps: Vec<String>,
    pub loc: Location,
    pub kind: RuleKind,
}

impl Rule {
    /// Build a `<Rule>` from its evaluated dictionary.
    pub fn single(name: String, value: &Value, loc: Location) -> Result<Self, BuildError> {
        let dict = value.as_dictionary()?;
        dict.assert_contains(&[(DEPS, ValueType::List), (STEP, ValueType::ScopedEnum)])?;

        let deps = vectorise(dict.expect(DEPS)?.as_list()?)?;
        let (scope, member) = dict.expect(STEP)?.as_scoped_enum()?;
        let step = Step::resolve(scope, member)?;

        Ok(Self {
            name,
            deps,
            loc,
            kind: RuleKind::Single { step },
        })
    }

    /// Build a `<MultiRule>` from its evaluated dictionary.
    pub fn multi(name: String, value: &Value, loc: Location) -> Result<Self, BuildError> {
        let dict = value.as_dictionary()?;
        dict.assert_contains(&[
            (DEPS, ValueType::List),
            (OUTPUT, ValueType::List),
            (STEP, ValueType::ScopedEnum),
        ])?;

        let deps = vectorise(dict.expect(DEPS)?.as_list()?)?;
        let outputs = vectorise(dict.expect(OUTPUT)?.as_list()?)?;
        if deps.len() != outputs.len() {
            return Err(BuildError::value(format!(
                "Rule '{name}' declares {} dependencies but {} outputs",
                deps.len(),
                outputs.len()
            )));
        }
        let (scope, member) = dict.expect(STEP)?.as_scoped_enum()?;
        let step = Step::resolve(scope, member)?;

        Ok(Self {
            name,
            deps,
            loc,
            kind: RuleKind::Multi { outputs, step },
        })
    }

    /// Build a `<Clean>` rule from its evaluated dictionary. The targets to
    /// delete are stored as the rule's dependencies.
    pub fn clean(name: String, value: &Value, loc: Location) -> Result<Self, BuildError> {
        let dict = value.as_dictionary()?;
        dict.assert_contains(&[(TARGETS, ValueType::List)])?;
        let deps = vectorise(dict.expect(TARGETS)?.as_list()?)?;

        Ok(Self {
            name,
            deps,
            loc,
            kind: RuleKind::Clean,
        })
    }

    /// The `<Qualifier>` this rule was declared with.
    pub fn qualifier_label(&self) -> &'static str {
        match self.kind {
            RuleKind::Single { .. } => "Rule",
            RuleKind::Multi { .. } => "MultiRule",
            RuleKind::Clean => "Clean",
        }
    }

    /// The commands to dispatch when this rule runs, in order.
    pub fn commands(&self, cfg: &Config) -> Vec<Command> {
        match &self.kind {
            RuleKind::Single { step } => {
                let mut cmd = vec![cfg.compiler.clone()];
                cmd.extend(step_flags(cfg, *step).iter().cloned());
                cmd.extend(self.deps.iter().cloned());
                cmd.push("-o".to_string());
                cmd.push(self.name.clone());
                vec![cmd]
            }
            RuleKind::Multi { outputs, step } => self
                .deps
                .iter()
                .zip(outputs)
                .map(|(dep, output)| {
                    let mut cmd = vec![cfg.compiler.clone()];
                    cmd.extend(step_flags(cfg, *step).iter().cloned());
                    cmd.push(dep.clone());
                    cmd.push("-o".to_string());
                    cmd.push(output.clone());
                    cmd
                })
                .collect(),
            RuleKind::Clean => {
                let mut cmd = vec!["rm".to_string()];
                cmd.extend(self.deps.iter().cloned());
                vec![cmd]
            }
        }
    }

    /// Whether the rule is stale with respect to the file system. Clean rules
    /// always run; the others run when their named output is missing or older
    /// than any dependency.
    pub fn should_run(&self, fs: &dyn FsGateway) -> Result<bool, BuildError> {
        match self.kind {
            RuleKind::Clean => Ok(true),
            RuleKind::Single { .. } | RuleKind::Multi { .. } => self.has_updated_dep(fs),
        }
    }

    fn has_updated_dep(&self, fs: &dyn FsGateway) -> Result<bool, BuildError> {
        if !fs.exists(&self.name) {
            return Ok(true);
        }
        let target_time = fs.last_write_time(&self.name)?;
        for dep in &self.deps {
            // Strict comparison: re-running an up-to-date target must not
            // trigger a rebuild.
            if !fs.exists(dep) || fs.last_write_time(dep)? > target_time {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

fn step_flags(cfg: &Config, step: Step) -> &[String] {
    match step {
        Step::Compile => &cfg.compilation_flags,
        Step::Link => &cfg.link_flags,
    }
}
