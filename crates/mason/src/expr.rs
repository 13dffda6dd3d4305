use rustc_hash::FxHashMap;

use crate::builtins::FnRegistry;
use crate::diagnostics::{BuildError, ResultExt};
use crate::value::{Dictionary, Value};

/// Evaluated variables, keyed by identifier.
pub type VarMap = FxHashMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
}

/// A node of the expression tree produced by the parser. Children are owned
/// by their parent; the grammar is tree-structured so no cycles can arise.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    BinaryOp {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    StringLit(String),
    EnumLit {
        scope: String,
        name: String,
    },
    VarRef(String),
    FnCall {
        name: String,
        args: Vec<Expr>,
    },
    ListLit(Vec<Expr>),
    DictLit(Vec<(String, Expr)>),
}

impl Expr {
    /// Uniform access to child expressions (operands, arguments, elements).
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::BinaryOp { left, right, .. } => vec![left, right],
            Expr::StringLit(_) | Expr::EnumLit { .. } | Expr::VarRef(_) => Vec::new(),
            Expr::FnCall { args, .. } => args.iter().collect(),
            Expr::ListLit(elements) => elements.iter().collect(),
            Expr::DictLit(fields) => fields.iter().map(|(_, expr)| expr).collect(),
        }
    }

    pub fn evaluate(&self, vars: &VarMap, registry: &FnRegistry) -> Result<Value, BuildError> {
        match self {
            Expr::StringLit(s) => Ok(Value::String(s.clone())),
            Expr::EnumLit { scope, name } => Ok(Value::ScopedEnum {
                scope: scope.clone(),
                name: name.clone(),
            }),
            Expr::VarRef(identifier) => vars.get(identifier).cloned().ok_or_else(|| {
                BuildError::value(format!("Could not resolve variable '{identifier}'"))
            }),
            Expr::FnCall { name, args } => {
                let mut arg_values = Vec::with_capacity(args.len());
                for arg in args {
                    arg_values.push(arg.evaluate(vars, registry)?);
                }
                registry
                    .call(name, &arg_values)
                    .during("Evaluating function expression")
            }
            Expr::ListLit(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(element.evaluate(vars, registry)?);
                }
                Ok(Value::List(values))
            }
            Expr::DictLit(fields) => {
                let mut dict = Dictionary::new();
                for (key, expr) in fields {
                    dict.insert(key.clone(), expr.evaluate(vars, registry)?);
                }
                Ok(Value::Dictionary(dict))
            }
            Expr::BinaryOp { op, left, right } => {
                let mut value = left.evaluate(vars, registry)?;
                match op {
                    BinaryOp::Add => value.add_assign(right.evaluate(vars, registry)?)?,
                }
                Ok(value)
            }
        }
    }
}
