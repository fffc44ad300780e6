//! Recursive-descent parser for NFN expressions and the bijection
//! between expression strings and network names.
//!
//! A computation travels the network as a Name whose final component is
//! the `NFN` marker and whose second-to-last component carries the
//! expression; any components before those form the prepended data
//! name, referenced inside the expression as `_`.

use crate::ast::Ast;
use crate::tokenizer::{TokenKind, Tokenizer};
use rust_nfn_common::name::{Name, NameComponent};
use rust_nfn_common::types::NFN_MARKER;
use rust_nfn_common::{Error, Result};

#[derive(Debug, Clone)]
pub struct NfnParser {
    tokenizer: Tokenizer,
}

impl Default for NfnParser {
    fn default() -> Self {
        Self {
            tokenizer: Tokenizer::standard(),
        }
    }
}

impl NfnParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses an expression string into an AST.
    pub fn parse(&self, input: &str) -> Result<Ast> {
        let tokens = self
            .tokenizer
            .tokenize(input)
            .ok_or_else(|| Error::Computation(format!("no tokenization for '{}'", input)))?;
        let (ast, consumed) = self.parse_expr(&tokens, 0)?;
        if consumed != tokens.len() {
            return Err(Error::Computation(format!(
                "trailing tokens after expression in '{}'",
                input
            )));
        }
        Ok(ast)
    }

    fn parse_expr(&self, tokens: &[(TokenKind, String)], pos: usize) -> Result<(Ast, usize)> {
        let Some((kind, lexeme)) = tokens.get(pos) else {
            return Err(Error::Computation("unexpected end of expression".into()));
        };
        match kind {
            TokenKind::Name => Ok((Ast::Name(Name::from_string(lexeme)), pos + 1)),
            TokenKind::Var => Ok((Ast::Var(lexeme.clone()), pos + 1)),
            TokenKind::Str => Ok((
                Ast::Str(lexeme.trim_matches('"').to_string()),
                pos + 1,
            )),
            TokenKind::Int => {
                let value = lexeme
                    .parse::<i64>()
                    .map_err(|_| Error::Computation(format!("bad integer '{}'", lexeme)))?;
                Ok((Ast::Int(value), pos + 1))
            }
            TokenKind::Float => {
                let value = lexeme
                    .parse::<f64>()
                    .map_err(|_| Error::Computation(format!("bad float '{}'", lexeme)))?;
                Ok((Ast::Float(value), pos + 1))
            }
            TokenKind::FuncCall => self.parse_call(tokens, pos),
            other => Err(Error::Computation(format!(
                "unexpected {:?} token '{}'",
                other, lexeme
            ))),
        }
    }

    fn parse_call(&self, tokens: &[(TokenKind, String)], pos: usize) -> Result<(Ast, usize)> {
        let (_, lexeme) = &tokens[pos];
        let name = lexeme
            .strip_suffix('(')
            .unwrap_or(lexeme)
            .to_string();
        let mut params = Vec::new();
        let mut cursor = pos + 1;

        if let Some((TokenKind::EndFuncCall, _)) = tokens.get(cursor) {
            return Ok((Ast::FuncCall { name, params }, cursor + 1));
        }

        loop {
            let (param, next) = self.parse_expr(tokens, cursor)?;
            params.push(param);
            cursor = next;
            match tokens.get(cursor) {
                Some((TokenKind::ParamSeparator, _)) => cursor += 1,
                Some((TokenKind::EndFuncCall, _)) => {
                    return Ok((Ast::FuncCall { name, params }, cursor + 1))
                }
                Some((kind, lexeme)) => {
                    return Err(Error::Computation(format!(
                        "expected ',' or ')', got {:?} '{}'",
                        kind, lexeme
                    )))
                }
                None => {
                    return Err(Error::Computation(
                        "unterminated function call".into(),
                    ))
                }
            }
        }
    }

    /// Extracts the expression string and the prepended data name from
    /// a network name; `_` in the stored expression is replaced by the
    /// prepended name.
    pub fn network_name_to_nfn_str(&self, name: &Name) -> Result<(String, Option<Name>)> {
        let marker = name
            .last()
            .map(|c| c.as_bytes().as_ref() == NFN_MARKER)
            .unwrap_or(false);
        if !marker || name.len() < 2 {
            return Err(Error::Computation(format!(
                "{} is not a computation name",
                name
            )));
        }
        let Some(expr_component) = name.get(name.len() - 2) else {
            return Err(Error::Computation(format!("{} has no expression", name)));
        };
        let mut expr = String::from_utf8(expr_component.as_bytes().to_vec())
            .map_err(|_| Error::Computation("expression is not UTF-8".into()))?;
        let prepended = if name.len() > 2 {
            let prepended = name.prefix(name.len() - 2);
            expr = expr.replace('_', &prepended.to_string());
            Some(prepended)
        } else {
            None
        };
        Ok((expr, prepended))
    }

    /// Embeds an expression string into a network name. With a
    /// prepended name, its occurrence in the expression is abbreviated
    /// to `_` and the name's components lead the result.
    pub fn nfn_str_to_network_name(&self, expr: &str, prepended: Option<&Name>) -> Name {
        let mut name = Name::new();
        let component = match prepended {
            Some(prepended) => {
                name.append(prepended);
                expr.replace(&prepended.to_string(), "_")
            }
            None => expr.to_string(),
        };
        name.push_str(&component);
        name.push(NameComponent::new(NFN_MARKER.to_vec()));
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_call() {
        let parser = NfnParser::new();
        let ast = parser.parse("/call/func(\"test\",/test/data)").unwrap();
        assert_eq!(
            ast,
            Ast::FuncCall {
                name: "/call/func".to_string(),
                params: vec![
                    Ast::Str("test".to_string()),
                    Ast::Name(Name::from_string("/test/data")),
                ],
            }
        );
    }

    #[test]
    fn parse_nested_call_and_literals() {
        let parser = NfnParser::new();
        let ast = parser.parse("/f(/a,/g(2),2.5e8,x)").unwrap();
        match ast {
            Ast::FuncCall { name, params } => {
                assert_eq!(name, "/f");
                assert_eq!(params.len(), 4);
                assert_eq!(params[0], Ast::Name(Name::from_string("/a")));
                assert_eq!(
                    params[1],
                    Ast::FuncCall {
                        name: "/g".to_string(),
                        params: vec![Ast::Int(2)],
                    }
                );
                assert_eq!(params[2], Ast::Float(2.5e8));
                assert_eq!(params[3], Ast::Var("x".to_string()));
            }
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn parse_zero_parameter_call() {
        let parser = NfnParser::new();
        let ast = parser.parse("/f()").unwrap();
        assert_eq!(
            ast,
            Ast::FuncCall {
                name: "/f".to_string(),
                params: vec![],
            }
        );
    }

    #[test]
    fn unterminated_call_fails() {
        let parser = NfnParser::new();
        assert!(parser.parse("/call/func(\"test\"").is_err());
    }

    #[test]
    fn unterminated_string_fails() {
        let parser = NfnParser::new();
        assert!(parser.parse("/call/func(\"test").is_err());
    }

    #[test]
    fn network_name_round_trip_with_prepended_name() {
        let parser = NfnParser::new();
        let data = Name::from_string("/test/data");
        let network = parser.nfn_str_to_network_name("/call/func(/test/data)", Some(&data));

        assert_eq!(network.len(), 4);
        assert_eq!(network.prefix(2), data);
        assert_eq!(
            network.get(2).unwrap().as_bytes().as_ref(),
            b"/call/func(_)"
        );
        assert_eq!(network.last().unwrap().as_bytes().as_ref(), b"NFN");

        let (expr, prepended) = parser.network_name_to_nfn_str(&network).unwrap();
        assert_eq!(expr, "/call/func(/test/data)");
        assert_eq!(prepended, Some(data));
    }

    #[test]
    fn network_name_round_trip_without_prepended_name() {
        let parser = NfnParser::new();
        let network = parser.nfn_str_to_network_name("/call/func(2)", None);
        assert_eq!(network.len(), 2);

        let (expr, prepended) = parser.network_name_to_nfn_str(&network).unwrap();
        assert_eq!(expr, "/call/func(2)");
        assert_eq!(prepended, None);
    }

    #[test]
    fn non_computation_name_is_rejected() {
        let parser = NfnParser::new();
        assert!(parser
            .network_name_to_nfn_str(&Name::from_string("/plain/data"))
            .is_err());
    }
}
