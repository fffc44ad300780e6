//! Abstract syntax tree for NFN expressions.

use rust_nfn_common::name::Name;
use std::fmt;

/// A parsed NFN expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Ast {
    /// A data name, e.g. `/test/data`.
    Name(Name),
    /// A free variable.
    Var(String),
    /// A string literal, stored without its quotes.
    Str(String),
    Int(i64),
    Float(f64),
    /// A call `name(param, ...)`.
    FuncCall { name: String, params: Vec<Ast> },
}

impl Ast {
    /// Name leaves of this tree, in evaluation order.
    pub fn data_names(&self) -> Vec<Name> {
        let mut names = Vec::new();
        self.collect_data_names(&mut names);
        names
    }

    fn collect_data_names(&self, names: &mut Vec<Name>) {
        match self {
            Ast::Name(name) => names.push(name.clone()),
            Ast::FuncCall { params, .. } => {
                for param in params {
                    param.collect_data_names(names);
                }
            }
            _ => {}
        }
    }
}

impl fmt::Display for Ast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ast::Name(name) => write!(f, "{}", name),
            Ast::Var(var) => write!(f, "{}", var),
            Ast::Str(s) => write!(f, "\"{}\"", s),
            Ast::Int(i) => write!(f, "{}", i),
            Ast::Float(x) => write!(f, "{}", x),
            Ast::FuncCall { name, params } => {
                write!(f, "{}(", name)?;
                for (index, param) in params.iter().enumerate() {
                    if index > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", param)?;
                }
                write!(f, ")")
            }
        }
    }
}
