//! Semantic checks over a built batch
//!
//! Runs before anything executes, so a rejected batch has no side effects.

use super::ast::{Instruction, SelectInstruction, SelectStep};
use super::parser::{ParseError, ParseResult};
use crate::graph::strip_delete_marker;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

pub fn validate(instructions: &[Instruction]) -> ParseResult<()> {
    for instruction in instructions {
        match instruction {
            Instruction::Node(cmd) => {
                for (name, payload) in &cmd.data {
                    check_data(name, payload)?;
                }
            }
            Instruction::Edge(_) => {}
            Instruction::Select(cmd) => check_chain(cmd)?,
            Instruction::Delete(cmd) => check_chain(&cmd.select)?,
        }
    }
    Ok(())
}

fn check_data(name: &str, payload: &str) -> ParseResult<()> {
    if strip_delete_marker(name).is_some() {
        return Err(ParseError::InvalidData {
            name: name.to_string(),
            reason: "a data block cannot carry a delete marker".to_string(),
        });
    }

    STANDARD
        .decode(payload)
        .map(|_| ())
        .map_err(|e| ParseError::InvalidData {
            name: name.to_string(),
            reason: e.to_string(),
        })
}

/// Selectors of the same kind need a join between them, and joins need a selector
/// on both sides.
fn check_chain(select: &SelectInstruction) -> ParseResult<()> {
    let steps = &select.steps;

    if matches!(steps.first(), Some(SelectStep::Join(_)) | None) {
        return Err(ParseError::InvalidChain("chain must start with a selector".to_string()));
    }
    if matches!(steps.last(), Some(SelectStep::Join(_))) {
        return Err(ParseError::InvalidChain("chain cannot end with a join".to_string()));
    }

    for pair in steps.windows(2) {
        match (&pair[0], &pair[1]) {
            (SelectStep::Join(_), SelectStep::Join(_)) => {
                return Err(ParseError::InvalidChain("two joins in a row".to_string()));
            }
            (SelectStep::Node(_), SelectStep::Node(_)) => {
                return Err(ParseError::InvalidChain(
                    "two node selectors need a join between them".to_string(),
                ));
            }
            (SelectStep::Edge(_), SelectStep::Edge(_)) => {
                return Err(ParseError::InvalidChain(
                    "two edge selectors need a join between them".to_string(),
                ));
            }
            _ => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::query::parser::{parse_batch, ParseError};

    #[test]
    fn test_valid_chains() {
        assert!(parse_batch("select (key=a);").is_ok());
        assert!(parse_batch("select (key=a) [*] (*);").is_ok());
        assert!(parse_batch("select (key=a) -> (*);").is_ok());
        assert!(parse_batch("select [*] <-> [*];").is_ok());
    }

    #[test]
    fn test_adjacent_selectors_rejected() {
        assert!(matches!(
            parse_batch("select (key=a) (key=b);"),
            Err(ParseError::InvalidChain(_))
        ));
        assert!(matches!(
            parse_batch("delete [*] [*];"),
            Err(ParseError::InvalidChain(_))
        ));
    }

    #[test]
    fn test_misplaced_joins_rejected() {
        for text in ["select -> (key=a);", "select (key=a) ->;", "select (a) -> <- (b);"] {
            assert!(
                matches!(parse_batch(text), Err(ParseError::InvalidChain(_))),
                "{text}"
            );
        }
    }

    #[test]
    fn test_invalid_base64_rejects_batch() {
        let err = parse_batch("add node key=a; add node key=b set doc { 'not base64!' };").unwrap_err();
        assert!(matches!(err, ParseError::InvalidData { ref name, .. } if name == "doc"));
        assert!(parse_batch("add node key=b set doc { 'eyJhIjoxfQ==' };").is_ok());
    }
}
