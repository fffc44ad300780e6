//! Computation placement: forward toward the data, or evaluate here.

use crate::ast::Ast;
use crate::parser::NfnParser;
use rust_nfn_common::name::Name;
use rust_nfn_fwd::tables::ForwardingInformationBase;

/// The ToDataFirst strategy: a computation chases its data.
///
/// If any data name in the expression is reachable through the FIB, the
/// computation is rewritten to travel toward that data; only when no
/// data leaf is remote (or the computation has already been moved once,
/// carrying a prepended name) is it evaluated locally.
#[derive(Debug, Default)]
pub struct ToDataFirstOptimizer {
    prepended: Option<Name>,
}

impl ToDataFirstOptimizer {
    pub fn new(prepended: Option<Name>) -> Self {
        Self { prepended }
    }

    /// True when the computation should be forwarded toward its data.
    pub fn compute_fwd(&self, ast: &Ast, fib: &ForwardingInformationBase) -> bool {
        if self.prepended.is_some() {
            // Already rewritten toward a data prefix; it stops here.
            return false;
        }
        ast.data_names()
            .iter()
            .any(|name| fib.find(name, &[], &[]).is_some())
    }

    pub fn compute_local(&self, ast: &Ast, fib: &ForwardingInformationBase) -> bool {
        !self.compute_fwd(ast, fib)
    }

    /// Rewritten network names: the whole expression, prepended with
    /// each routable data leaf.
    pub fn rewrites(
        &self,
        ast: &Ast,
        fib: &ForwardingInformationBase,
        parser: &NfnParser,
    ) -> Vec<Name> {
        let expr = ast.to_string();
        let mut seen = Vec::new();
        let mut rewrites = Vec::new();
        for name in ast.data_names() {
            if seen.contains(&name) {
                continue;
            }
            seen.push(name.clone());
            if fib.find(&name, &[], &[]).is_some() {
                rewrites.push(parser.nfn_str_to_network_name(&expr, Some(&name)));
            }
        }
        rewrites
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_nfn_common::types::FaceId;

    fn parsed(expr: &str) -> Ast {
        NfnParser::new().parse(expr).unwrap()
    }

    #[test]
    fn routable_data_forces_forwarding() {
        let mut fib = ForwardingInformationBase::new();
        fib.add(Name::from_string("/test"), FaceId(1), false);

        let optimizer = ToDataFirstOptimizer::new(None);
        let ast = parsed("/call/func(/test/data)");
        assert!(optimizer.compute_fwd(&ast, &fib));
        assert!(!optimizer.compute_local(&ast, &fib));

        let parser = NfnParser::new();
        let rewrites = optimizer.rewrites(&ast, &fib, &parser);
        assert_eq!(rewrites.len(), 1);
        assert_eq!(
            rewrites[0],
            parser.nfn_str_to_network_name(
                "/call/func(/test/data)",
                Some(&Name::from_string("/test/data"))
            )
        );
    }

    #[test]
    fn unroutable_data_evaluates_locally() {
        let fib = ForwardingInformationBase::new();
        let optimizer = ToDataFirstOptimizer::new(None);
        let ast = parsed("/call/func(/test/data)");
        assert!(optimizer.compute_local(&ast, &fib));
        assert!(optimizer
            .rewrites(&ast, &fib, &NfnParser::new())
            .is_empty());
    }

    #[test]
    fn rewritten_computation_stays_local() {
        let mut fib = ForwardingInformationBase::new();
        fib.add(Name::from_string("/test"), FaceId(1), false);

        let optimizer = ToDataFirstOptimizer::new(Some(Name::from_string("/test/data")));
        let ast = parsed("/call/func(/test/data)");
        assert!(optimizer.compute_local(&ast, &fib));
    }
}
