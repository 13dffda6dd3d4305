use crate::diagnostics::BuildError;
use crate::value::{vectorise, Value, ValueType};

const COMPILER: &str = "compiler";
const DEFAULT_RULE: &str = "default_rule";
const COMPILATION_FLAGS: &str = "compilation_flags";
const LINK_FLAGS: &str = "link_flags";

/// The project-wide settings declared by the `<Config>` dictionary.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub name: String,
    pub compiler: String,
    pub compilation_flags: Vec<String>,
    pub link_flags: Vec<String>,
    pub default_rule: String,
}

impl Config {
    /// Build a `Config` from an evaluated `<Config>` dictionary value.
    pub fn from_value(name: String, value: &Value) -> Result<Self, BuildError> {
        let dict = value.as_dictionary()?;
        dict.assert_contains(&[(COMPILER, ValueType::String), (DEFAULT_RULE, ValueType::String)])?;

        let compiler = dict.expect(COMPILER)?.as_string()?.to_string();
        let default_rule = dict.expect(DEFAULT_RULE)?.as_string()?.to_string();

        let mut compilation_flags = Vec::new();
        let mut link_flags = Vec::new();
        for (field, out) in [
            (COMPILATION_FLAGS, &mut compilation_flags),
            (LINK_FLAGS, &mut link_flags),
        ] {
            if dict.contains(field) {
                dict.assert_contains(&[(field, ValueType::List)])?;
                *out = vectorise(dict.expect(field)?.as_list()?)?;
            }
        }

        Ok(Self {
            name,
            compiler,
            compilation_flags,
            link_flags,
            default_rule,
        })
    }
}
