//! Structural path expressions (`$.items[*].id`) used to key matching rules
//! and to locate values while walking JSON and XML bodies.

use crate::error::PathError;
use std::fmt;

/// A single step of a [`DocPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathToken {
    /// `$`
    Root,
    /// `.name` or `['name']`
    Field(String),
    /// `[3]`
    Index(usize),
    /// `.*`
    Star,
    /// `[*]`
    StarIndex,
}

impl PathToken {
    /// Weight of this expression token against a concrete path token, `None`
    /// if it does not match.
    fn weight(&self, actual: &PathToken) -> Option<usize> {
        match (self, actual) {
            (PathToken::Root, PathToken::Root) => Some(2),
            (PathToken::Field(expected), PathToken::Field(name)) if expected == name => Some(2),
            (PathToken::Index(expected), PathToken::Index(index)) if expected == index => Some(2),
            (PathToken::Star, PathToken::Field(_) | PathToken::Index(_)) => Some(1),
            (PathToken::StarIndex, PathToken::Index(_)) => Some(1),
            _ => None,
        }
    }
}

/// A parsed path expression, or a concrete location inside a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocPath {
    tokens: Vec<PathToken>,
}

impl DocPath {
    /// The document root, `$`.
    pub fn root() -> Self {
        DocPath {
            tokens: vec![PathToken::Root],
        }
    }

    /// Parse an expression such as `$.a['b c'][0].*`.
    pub fn parse(expression: &str) -> Result<Self, PathError> {
        let fail = |reason: &str| PathError {
            expression: expression.to_string(),
            reason: reason.to_string(),
        };

        let mut chars = expression.chars().peekable();
        if chars.next() != Some('$') {
            return Err(fail("expression must start with '$'"));
        }

        let mut tokens = vec![PathToken::Root];
        while let Some(c) = chars.next() {
            match c {
                '.' => {
                    if chars.peek() == Some(&'*') {
                        chars.next();
                        tokens.push(PathToken::Star);
                        continue;
                    }
                    let mut name = String::new();
                    while let Some(&next) = chars.peek() {
                        if next == '.' || next == '[' {
                            break;
                        }
                        name.push(next);
                        chars.next();
                    }
                    if name.is_empty() {
                        return Err(fail("empty field name"));
                    }
                    tokens.push(PathToken::Field(name));
                }
                '[' => match chars.peek().copied() {
                    Some('\'') => {
                        chars.next();
                        let mut name = String::new();
                        loop {
                            match chars.next() {
                                Some('\'') => break,
                                Some(ch) => name.push(ch),
                                None => return Err(fail("unterminated quoted field")),
                            }
                        }
                        if chars.next() != Some(']') {
                            return Err(fail("expected ']' after quoted field"));
                        }
                        tokens.push(PathToken::Field(name));
                    }
                    Some('*') => {
                        chars.next();
                        if chars.next() != Some(']') {
                            return Err(fail("expected ']' after '*'"));
                        }
                        tokens.push(PathToken::StarIndex);
                    }
                    Some(_) => {
                        let mut digits = String::new();
                        loop {
                            match chars.next() {
                                Some(']') => break,
                                Some(ch) if ch.is_ascii_digit() => digits.push(ch),
                                Some(_) => return Err(fail("array index must be a number")),
                                None => return Err(fail("unterminated array index")),
                            }
                        }
                        let index = digits
                            .parse::<usize>()
                            .map_err(|_| fail("array index must be a number"))?;
                        tokens.push(PathToken::Index(index));
                    }
                    None => return Err(fail("unterminated '['")),
                },
                other => {
                    return Err(fail(&format!("unexpected character '{other}'")));
                }
            }
        }

        Ok(DocPath { tokens })
    }

    pub fn tokens(&self) -> &[PathToken] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_root(&self) -> bool {
        self.tokens.len() == 1
    }

    pub fn push_field(&mut self, name: impl Into<String>) -> &mut Self {
        self.tokens.push(PathToken::Field(name.into()));
        self
    }

    pub fn push_index(&mut self, index: usize) -> &mut Self {
        self.tokens.push(PathToken::Index(index));
        self
    }

    /// A copy of this path with one more field appended.
    pub fn join(&self, name: impl Into<String>) -> DocPath {
        let mut path = self.clone();
        path.push_field(name);
        path
    }

    /// A copy of this path with one more index appended.
    pub fn join_index(&self, index: usize) -> DocPath {
        let mut path = self.clone();
        path.push_index(index);
        path
    }

    /// This path with its first field step removed, e.g. `$.body.a` becomes
    /// `$.a`.
    pub(crate) fn strip_first_field(&self) -> DocPath {
        let mut tokens = vec![PathToken::Root];
        tokens.extend(self.tokens.iter().skip(2).cloned());
        DocPath { tokens }
    }

    /// How well this expression matches a concrete path.
    ///
    /// Returns the product of the per-token weights (exact steps weigh 2,
    /// wildcards 1), or `None` when a step disagrees or the expression is
    /// longer than the path. An expression shorter than the path is tested
    /// against the path's prefix.
    pub fn weight_against(&self, path: &DocPath) -> Option<usize> {
        if self.tokens.len() > path.tokens.len() {
            return None;
        }
        self.tokens
            .iter()
            .zip(path.tokens.iter())
            .try_fold(1usize, |acc, (expression, actual)| {
                expression.weight(actual).map(|w| acc * w)
            })
    }
}

impl Default for DocPath {
    fn default() -> Self {
        DocPath::root()
    }
}

fn is_plain_field(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '@' | '#' | ':'))
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for token in &self.tokens {
            match token {
                PathToken::Root => write!(f, "$")?,
                PathToken::Field(name) if is_plain_field(name) => write!(f, ".{name}")?,
                PathToken::Field(name) => write!(f, "['{name}']")?,
                PathToken::Index(index) => write!(f, "[{index}]")?,
                PathToken::Star => write!(f, ".*")?,
                PathToken::StarIndex => write!(f, "[*]")?,
            }
        }
        Ok(())
    }
}
