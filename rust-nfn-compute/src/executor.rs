//! Executor interface for named functions.
//!
//! The first line of a fetched function body names its language; the
//! evaluator dispatches to the executor registered under that name.
//! Concrete per-language executors live outside this crate.

use bytes::Bytes;
use rust_nfn_common::Result;
use std::collections::HashMap;
use std::sync::Arc;

pub trait Executor: Send + Sync {
    /// Runs `code` with the resolved parameters and returns the result
    /// payload.
    fn execute(&self, code: &str, params: &[Bytes]) -> Result<Bytes>;
}

/// Executors keyed by language name.
pub type ExecutorRegistry = HashMap<String, Arc<dyn Executor>>;

/// Language named on the first line of a function body.
pub fn code_language(code: &str) -> &str {
    code.lines().next().unwrap_or("").trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_is_the_first_line() {
        assert_eq!(code_language("PYTHON\ndef f(): pass"), "PYTHON");
        assert_eq!(code_language(""), "");
    }
}
