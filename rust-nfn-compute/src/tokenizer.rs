//! Table-driven tokenizer for NFN expression strings.
//!
//! Each token kind declares three character classes: the first
//! character, the middle characters, and the last character. Longest
//! match wins; among equally long matches the earlier registration
//! wins. Input that cannot be tokenized (e.g. an unterminated string)
//! yields `None`.

/// Kinds of tokens an NFN expression is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Str,
    Int,
    Float,
    Name,
    Var,
    FuncCall,
    EndFuncCall,
    ParamSeparator,
}

/// A regex-style character class: literal characters and ranges, e.g.
/// `[A-Za-z0-9/]`, `\(`, or `"`.
#[derive(Debug, Clone, Default)]
pub struct CharClass {
    chars: Vec<char>,
    ranges: Vec<(char, char)>,
}

impl CharClass {
    /// Parses a class pattern. An empty pattern matches nothing;
    /// `[...]` encloses characters and `a-z` ranges; backslashes escape
    /// the following character; anything else is a literal sequence.
    pub fn new(pattern: &str) -> Self {
        let mut class = CharClass::default();
        if pattern.is_empty() {
            return class;
        }
        let inner: Vec<char> = if pattern.starts_with('[') && pattern.ends_with(']') {
            pattern[1..pattern.len() - 1].chars().collect()
        } else {
            pattern.chars().collect()
        };

        let mut i = 0;
        while i < inner.len() {
            let c = inner[i];
            if c == '\\' && i + 1 < inner.len() {
                class.chars.push(inner[i + 1]);
                i += 2;
                continue;
            }
            if i + 2 < inner.len() && inner[i + 1] == '-' {
                class.ranges.push((c, inner[i + 2]));
                i += 3;
                continue;
            }
            class.chars.push(c);
            i += 1;
        }
        class
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty() && self.ranges.is_empty()
    }

    pub fn matches(&self, c: char) -> bool {
        self.chars.contains(&c) || self.ranges.iter().any(|&(lo, hi)| c >= lo && c <= hi)
    }
}

/// One tokenizer table entry.
#[derive(Debug, Clone)]
pub struct TokenRule {
    pub kind: TokenKind,
    first: CharClass,
    middle: CharClass,
    last: CharClass,
}

impl TokenRule {
    pub fn new(kind: TokenKind, first: &str, middle: &str, last: &str) -> Self {
        Self {
            kind,
            first: CharClass::new(first),
            middle: CharClass::new(middle),
            last: CharClass::new(last),
        }
    }

    /// Length of the longest lexeme this rule matches at `pos`, if any.
    ///
    /// A rule with empty middle and last classes matches exactly one
    /// character. Otherwise the lexeme is `first middle* last`; a
    /// single character qualifies only when it can stand as both middle
    /// and last, which keeps `2` a valid integer while an unpaired `"`
    /// never forms a string.
    fn matches(&self, input: &[char], pos: usize) -> Option<usize> {
        let first = input[pos];
        if !self.first.matches(first) {
            return None;
        }
        if self.middle.is_empty() && self.last.is_empty() {
            return Some(1);
        }

        let mut end = pos + 1;
        while end < input.len()
            && (self.middle.matches(input[end]) || self.last.matches(input[end]))
        {
            end += 1;
        }
        while end > pos + 1 {
            if self.last.matches(input[end - 1]) {
                return Some(end - pos);
            }
            end -= 1;
        }
        if self.middle.matches(first) && self.last.matches(first) {
            return Some(1);
        }
        None
    }
}

/// Scans left to right, emitting `(kind, lexeme)` pairs.
#[derive(Debug, Clone, Default)]
pub struct Tokenizer {
    rules: Vec<TokenRule>,
}

impl Tokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_rule(&mut self, rule: TokenRule) -> &mut Self {
        self.rules.push(rule);
        self
    }

    /// The standard NFN token table.
    pub fn standard() -> Self {
        let mut tokenizer = Self::new();
        tokenizer
            .add_rule(TokenRule::new(TokenKind::Str, "\"", "[A-Za-z0-9]", "\""))
            .add_rule(TokenRule::new(TokenKind::Int, "[0-9\\+\\-]", "[0-9]", "[0-9]"))
            .add_rule(TokenRule::new(
                TokenKind::Float,
                "[0-9\\+\\-]",
                "[0-9.Ee]",
                "[0-9]",
            ))
            .add_rule(TokenRule::new(TokenKind::Name, "/", "[A-Za-z0-9/]", "[A-Za-z0-9]"))
            .add_rule(TokenRule::new(
                TokenKind::Var,
                "[A-Za-z0-9]",
                "[A-Za-z0-9]",
                "[A-Za-z0-9]",
            ))
            .add_rule(TokenRule::new(TokenKind::FuncCall, "/", "[A-Za-z0-9/]", "\\("))
            .add_rule(TokenRule::new(TokenKind::EndFuncCall, "\\)", "", ""))
            .add_rule(TokenRule::new(TokenKind::ParamSeparator, ",", "", ""));
        tokenizer
    }

    /// Tokenizes `input`, or `None` if any position fails to match.
    pub fn tokenize(&self, input: &str) -> Option<Vec<(TokenKind, String)>> {
        let chars: Vec<char> = input.chars().collect();
        let mut tokens = Vec::new();
        let mut pos = 0;
        while pos < chars.len() {
            let mut best: Option<(usize, TokenKind)> = None;
            for rule in &self.rules {
                if let Some(len) = rule.matches(&chars, pos) {
                    // Strictly longer matches win; ties keep the earlier
                    // registration.
                    if best.map_or(true, |(best_len, _)| len > best_len) {
                        best = Some((len, rule.kind));
                    }
                }
            }
            let (len, kind) = best?;
            let lexeme: String = chars[pos..pos + len].iter().collect();
            tokens.push((kind, lexeme));
            pos += len;
        }
        Some(tokens)
    }
}
