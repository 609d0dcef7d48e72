//! Flow line parser.
//!
//! # Grammar
//!
//! ```text
//! line    := inputs ( "|" steps ( ">" outputs )? )? ( "#" comment )?
//! inputs  := entity ( "," entity )*
//! steps   := step ( "|" step )*
//! outputs := entity ( "," entity )*
//! ```
//!
//! Delimiters are only recognised outside brackets, so qualifiers and step
//! arguments may contain `,`, `|`, `>` or `#`. A line without a step chain is
//! a declaration line. A step chain without `>` passes its inputs through as
//! outputs.

use serde::Serialize;
use tracing::trace;

use crate::error::GrammarError;
use crate::term::{EntityTerm, StepTerm, parse_entity_term, parse_step_term};

/// One parsed flow line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineRecord {
    pub inputs: Vec<EntityTerm>,
    /// `None` marks a declaration line.
    pub steps: Option<Vec<StepTerm>>,
    /// Declared outputs, or the distinct `inputs` when the chain has no `>`.
    /// `None` exactly when `steps` is `None`.
    pub outputs: Option<Vec<EntityTerm>>,
    pub comment: Option<String>,
}

impl LineRecord {
    /// `true` when the line registers entities without transforming them.
    #[must_use]
    pub const fn is_declaration(&self) -> bool {
        self.steps.is_none()
    }
}

/// Parse a single flow line.
///
/// # Errors
///
/// Returns [`GrammarError`] carrying the full line text and the column of
/// the first offending character.
pub fn parse_line(text: &str) -> Result<LineRecord, GrammarError> {
    let (body, comment) = match find_top_level(text, '#') {
        Some(at) => {
            let comment = text[at + 1..].trim();
            (&text[..at], (!comment.is_empty()).then(|| comment.to_string()))
        }
        None => (text, None),
    };

    if body.trim().is_empty() {
        let at = text.len() - text.trim_start().len();
        return Err(GrammarError::new(text, at, "expected at least one input"));
    }

    let record = match find_top_level(body, '|') {
        None => {
            if let Some(at) = find_top_level(body, '>') {
                return Err(GrammarError::new(text, at, "`>` requires a step chain"));
            }
            LineRecord {
                inputs: parse_terms(text, body, 0, ',', parse_entity_term)?,
                steps: None,
                outputs: None,
                comment,
            }
        }
        Some(pipe) => {
            let inputs = parse_terms(text, &body[..pipe], 0, ',', parse_entity_term)?;
            let chain_at = pipe + 1;
            let chain = &body[chain_at..];
            let (steps_text, outputs) = match find_top_level(chain, '>') {
                Some(gt) => {
                    let outputs_at = chain_at + gt + 1;
                    let outputs = parse_terms(
                        text,
                        &body[outputs_at..],
                        outputs_at,
                        ',',
                        parse_entity_term,
                    )?;
                    (&chain[..gt], outputs)
                }
                None => (chain, pass_through(&inputs)),
            };
            let steps = parse_terms(text, steps_text, chain_at, '|', parse_step_term)?;
            LineRecord {
                inputs,
                steps: Some(steps),
                outputs: Some(outputs),
                comment,
            }
        }
    };

    trace!(line = text, ?record, "parsed flow line");
    Ok(record)
}

/// Outputs implied by a chain without `>`: each input name once, first
/// occurrence wins.
#[must_use]
pub(crate) fn pass_through(inputs: &[EntityTerm]) -> Vec<EntityTerm> {
    let mut outputs: Vec<EntityTerm> = Vec::with_capacity(inputs.len());
    for term in inputs {
        if !outputs.iter().any(|seen| seen.name == term.name) {
            outputs.push(term.clone());
        }
    }
    outputs
}

/// Split `segment` on `delim` and parse every piece with `parse`.
///
/// `base` is the byte offset of `segment` within `line`, used to report
/// columns relative to the whole line.
fn parse_terms<T>(
    line: &str,
    segment: &str,
    base: usize,
    delim: char,
    parse: fn(&str) -> Result<T, GrammarError>,
) -> Result<Vec<T>, GrammarError> {
    split_top_level(segment, delim)
        .into_iter()
        .map(|(offset, piece)| parse(piece).map_err(|e| e.within(line, base + offset)))
        .collect()
}

/// Byte offset of the first `needle` outside brackets.
fn find_top_level(text: &str, needle: char) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            c if c == needle && depth == 0 => return Some(i),
            _ => {}
        }
    }
    None
}

/// Split on `delim` outside brackets, returning each piece with its offset.
fn split_top_level(text: &str, delim: char) -> Vec<(usize, &str)> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut rest = text;
    while let Some(at) = find_top_level(rest, delim) {
        pieces.push((start, &rest[..at]));
        start += at + delim.len_utf8();
        rest = &rest[at + delim.len_utf8()..];
    }
    pieces.push((start, rest));
    pieces
}
