use std::path::Path;
use std::str::FromStr;

use ignore::WalkBuilder;
use itertools::Itertools;
use rustc_hash::FxHashMap;
use strum_macros::{Display, EnumString};

use crate::diagnostics::BuildError;
use crate::value::{vectorise, Value, ValueType};

/// The compilation phase a rule participates in, selecting which flag list
/// the compiler is invoked with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Step {
    Compile,
    Link,
}

impl Step {
    pub const SCOPE: &'static str = "Step";

    /// Resolve a scoped enum value such as `Step::LINK`.
    pub fn resolve(scope: &str, name: &str) -> Result<Step, BuildError> {
        if scope != Self::SCOPE {
            return Err(BuildError::value(format!(
                "Failed to resolve enum '{scope}::{name}'. Unknown scope '{scope}'"
            )));
        }
        Step::from_str(name).map_err(|_| {
            BuildError::value(format!(
                "Failed to resolve enum '{scope}::{name}'. No member '{name}' found"
            ))
        })
    }
}

pub type BuiltinFn = fn(&[Value]) -> Result<Value, BuildError>;

/// Named pure functions callable from Buildfile expressions. The registry is
/// open: embedders may add their own entries beside the defaults.
pub struct FnRegistry {
    funcs: FxHashMap<String, BuiltinFn>,
}

impl Default for FnRegistry {
    fn default() -> Self {
        let mut registry = Self {
            funcs: FxHashMap::default(),
        };
        registry.register("file_names", file_names);
        registry.register("files", files);
        registry
    }
}

impl FnRegistry {
    pub fn register(&mut self, name: impl Into<String>, func: BuiltinFn) {
        self.funcs.insert(name.into(), func);
    }

    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, BuildError> {
        let func = self
            .funcs
            .get(name)
            .ok_or_else(|| BuildError::value(format!("Cannot resolve function name '{name}'")))?;
        func(args).map_err(|err| err.during(format!("Calling function '{name}'")))
    }
}

fn expect_arg_count(name: &str, args: &[Value], expected: usize) -> Result<(), BuildError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(BuildError::value(format!(
            "Expected {expected} argument(s) to '{name}', found {}",
            args.len()
        )))
    }
}

/// `file_names(list)`: strip everything from the first `.` onwards from each
/// entry, e.g. `["a.tar.gz", "b.cpp"]` becomes `["a", "b"]`.
fn file_names(args: &[Value]) -> Result<Value, BuildError> {
    expect_arg_count("file_names", args, 1)?;
    let names = vectorise(args[0].as_list()?)?;

    let stripped = names
        .into_iter()
        .map(|name| {
            let stem = match name.find('.') {
                Some(dot) => name[..dot].to_string(),
                None => name,
            };
            Value::String(stem)
        })
        .collect();

    Ok(Value::List(stripped))
}

/// `files(path, extensions)`: recursively walk `path` and return, in
/// lexicographic order, every regular file whose full extension (the
/// file-name suffix starting at the first `.`) is listed in `extensions`.
fn files(args: &[Value]) -> Result<Value, BuildError> {
    expect_arg_count("files", args, 2)?;
    let root = args[0].as_string()?;
    args[1].assert_type(ValueType::List)?;
    let extensions = vectorise(args[1].as_list()?)?;

    if !Path::new(root).exists() {
        return Err(BuildError::io(format!("No such path '{root}'")));
    }

    let matches = WalkBuilder::new(root)
        .standard_filters(false)
        .hidden(false)
        .build()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_some_and(|ty| ty.is_file()))
        .filter(|entry| {
            let name = entry.file_name().to_string_lossy();
            name.find('.')
                .is_some_and(|dot| extensions.iter().any(|ext| ext.as_str() == &name[dot..]))
        })
        .map(|entry| entry.path().to_string_lossy().into_owned())
        .sorted()
        .map(Value::String)
        .collect();

    Ok(Value::List(matches))
}
