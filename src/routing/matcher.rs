//! Subdomain pattern matching.
//!
//! # Responsibilities
//! - Parse registered subdomain keys, literal or glob
//! - Match a subdomain token against a pattern
//!
//! # Design Decisions
//! - Patterns are lowercased at registration; callers lowercase tokens
//! - Shell-style globs: `*` any run of characters, `?` one character,
//!   `[a-z]` / `[^0-9]` classes, `\` escapes the next character
//! - `*` and `?` never match `/`, as in Go's `path.Match`
//! - Malformed patterns are rejected up front rather than never matching
//! - No regex; matching is a linear scan with single-star backtracking

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use crate::routing::RoutingError;

const SEPARATOR: char = '/';

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(char),
    AnyChar,
    Star,
    Class { negated: bool, ranges: Vec<(char, char)> },
}

impl Token {
    fn matches(&self, c: char) -> bool {
        match self {
            Token::Literal(l) => *l == c,
            Token::AnyChar => c != SEPARATOR,
            Token::Star => false,
            Token::Class { negated, ranges } => {
                ranges.iter().any(|&(lo, hi)| lo <= c && c <= hi) != *negated
            }
        }
    }
}

/// A registered subdomain key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubdomainPattern {
    raw: String,
    tokens: Vec<Token>,
}

impl SubdomainPattern {
    /// Parse a pattern. The pattern is lowercased first.
    pub fn new(pattern: &str) -> Result<Self, RoutingError> {
        let raw = pattern.to_lowercase();
        let tokens = parse(&raw).map_err(|reason| RoutingError::InvalidPattern {
            pattern: raw.clone(),
            reason,
        })?;
        Ok(Self { raw, tokens })
    }

    /// The pattern as registered (lowercase).
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Return true if the pattern contains any wildcard.
    pub fn is_wildcard(&self) -> bool {
        self.tokens.iter().any(|t| !matches!(t, Token::Literal(_)))
    }

    /// Match a (lowercase) subdomain token against the whole pattern.
    pub fn matches(&self, subdomain: &str) -> bool {
        let text: Vec<char> = subdomain.chars().collect();
        let tokens = &self.tokens;

        let (mut t, mut s) = (0, 0);
        // Last star seen: (token index, text index it currently absorbs up to).
        let mut star: Option<(usize, usize)> = None;

        while s < text.len() {
            match tokens.get(t) {
                Some(Token::Star) => {
                    star = Some((t, s));
                    t += 1;
                    continue;
                }
                Some(token) if token.matches(text[s]) => {
                    t += 1;
                    s += 1;
                    continue;
                }
                _ => {}
            }
            match star {
                // A star cannot absorb the separator.
                Some((_, star_s)) if text[star_s] == SEPARATOR => return false,
                Some((star_t, star_s)) => {
                    t = star_t + 1;
                    s = star_s + 1;
                    star = Some((star_t, star_s + 1));
                }
                None => return false,
            }
        }

        tokens[t..].iter().all(|token| *token == Token::Star)
    }
}

impl fmt::Display for SubdomainPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn parse(pattern: &str) -> Result<Vec<Token>, &'static str> {
    if pattern.is_empty() {
        return Err("empty pattern");
    }

    let mut tokens = Vec::new();
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        let token = match c {
            '*' if tokens.last() == Some(&Token::Star) => continue,
            '*' => Token::Star,
            '?' => Token::AnyChar,
            '\\' => Token::Literal(chars.next().ok_or("trailing escape")?),
            '[' => parse_class(&mut chars)?,
            c => Token::Literal(c),
        };
        tokens.push(token);
    }
    Ok(tokens)
}

fn parse_class(chars: &mut Peekable<Chars<'_>>) -> Result<Token, &'static str> {
    let mut negated = false;
    let mut ranges = Vec::new();

    loop {
        let c = chars.next().ok_or("unterminated character class")?;
        match c {
            '^' if ranges.is_empty() && !negated => negated = true,
            ']' if ranges.is_empty() => return Err("empty character class"),
            ']' => break,
            c => {
                let lo = class_char(c, chars)?;
                let hi = if chars.peek() == Some(&'-') {
                    chars.next();
                    match chars.next() {
                        Some(']') | None => return Err("unterminated range"),
                        Some(c) => class_char(c, chars)?,
                    }
                } else {
                    lo
                };
                if hi < lo {
                    return Err("inverted range");
                }
                ranges.push((lo, hi));
            }
        }
    }

    Ok(Token::Class { negated, ranges })
}

fn class_char(c: char, chars: &mut Peekable<Chars<'_>>) -> Result<char, &'static str> {
    if c == '\\' {
        chars.next().ok_or("trailing escape")
    } else {
        Ok(c)
    }
}
