//! Entity and step term parsing.
//!
//! A term is a bare identifier optionally followed by one bracketed group:
//!
//! ```text
//! salt            entity, no qualifier
//! salt [ 5 g ]    entity, qualifier "5 g"
//! bake[10 min, 200 C]   step, arguments ["10 min", "200 C"]
//! ```
//!
//! Identifiers are one or more alphanumeric characters or `_`. Brackets do
//! not nest, and nothing but whitespace may follow the closing bracket.

use std::fmt;

use serde::Serialize;

use crate::error::GrammarError;

/// A named quantity with an optional free-text amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityTerm {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<String>,
}

impl EntityTerm {
    #[must_use]
    pub fn new(name: impl Into<String>, qualifier: Option<&str>) -> Self {
        Self {
            name: name.into(),
            qualifier: qualifier.map(str::to_string),
        }
    }
}

impl fmt::Display for EntityTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(q) => write!(f, "{}[{q}]", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// One transformation step and its ordered arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepTerm {
    pub name: String,
    pub arguments: Vec<String>,
}

impl StepTerm {
    #[must_use]
    pub fn new(name: impl Into<String>, arguments: &[&str]) -> Self {
        Self {
            name: name.into(),
            arguments: arguments.iter().map(|a| (*a).to_string()).collect(),
        }
    }
}

impl fmt::Display for StepTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.arguments.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}[{}]", self.name, self.arguments.join(", "))
        }
    }
}

/// Parse an entity term such as `flour[200 g]`.
///
/// The qualifier is trimmed; empty brackets yield no qualifier.
///
/// # Errors
///
/// Returns [`GrammarError`] if the name is not a bare identifier or the
/// bracket group is malformed.
pub fn parse_entity_term(text: &str) -> Result<EntityTerm, GrammarError> {
    let (name, inner) = split_bracketed(text, "entity")?;
    let qualifier = inner.map(str::trim).filter(|q| !q.is_empty());
    Ok(EntityTerm::new(name, qualifier))
}

/// Parse a step term such as `bake[10 min, 200 C]`.
///
/// Arguments are split on `,` and trimmed individually, keeping order.
///
/// # Errors
///
/// Returns [`GrammarError`] if the name is not a bare identifier or the
/// bracket group is malformed.
pub fn parse_step_term(text: &str) -> Result<StepTerm, GrammarError> {
    let (name, inner) = split_bracketed(text, "step")?;
    let arguments = match inner.map(str::trim) {
        Some(args) if !args.is_empty() => args.split(',').map(|a| a.trim().to_string()).collect(),
        _ => Vec::new(),
    };
    Ok(StepTerm {
        name: name.to_string(),
        arguments,
    })
}

/// Characters allowed in entity and step names.
#[must_use]
pub fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Split `name [inner]` into its name and optional raw bracket contents.
fn split_bracketed<'a>(
    text: &'a str,
    what: &str,
) -> Result<(&'a str, Option<&'a str>), GrammarError> {
    let start = text.len() - text.trim_start().len();
    let body = text.trim();
    if body.is_empty() {
        return Err(GrammarError::new(text, start, format!("expected {what} name")));
    }

    let name_len = body
        .char_indices()
        .find(|(_, c)| !is_identifier_char(*c))
        .map_or(body.len(), |(i, _)| i);
    if name_len == 0 {
        return Err(GrammarError::new(
            text,
            start,
            format!("{what} name must be an identifier"),
        ));
    }
    let name = &body[..name_len];

    let rest = &body[name_len..];
    let group = rest.trim_start();
    let group_at = start + name_len + (rest.len() - group.len());
    if group.is_empty() {
        return Ok((name, None));
    }
    let Some(inside) = group.strip_prefix('[') else {
        return Err(GrammarError::new(
            text,
            group_at,
            format!("unexpected character after {what} name"),
        ));
    };

    match inside.find(['[', ']']) {
        Some(i) if inside[i..].starts_with(']') => {
            let close_at = group_at + 1 + i;
            if inside.len() > i + 1 {
                return Err(GrammarError::new(
                    text,
                    close_at + 1,
                    "unexpected text after closing bracket",
                ));
            }
            Ok((name, Some(&inside[..i])))
        }
        Some(i) => Err(GrammarError::new(
            text,
            group_at + 1 + i,
            "nested brackets are not allowed",
        )),
        None => Err(GrammarError::new(text, group_at, "unclosed bracket")),
    }
}
