//! Instruction builders
//!
//! A batch is folded into instructions statement by statement. At each position
//! the builders in [`BUILDERS`] are tried in order inside
//! [`TokenCursor::try_parse`], so a builder that does not recognize the statement
//! leaves the cursor where it found it for the next one.

use super::ast::*;
use super::cursor::TokenCursor;
use super::lexer::{tokenize, Rule, Token};
use super::validator::validate;
use crate::graph::{Tags, DELETE_MARKER};
use indexmap::IndexMap;
use thiserror::Error;
use tracing::debug;

/// Parser errors
#[derive(Error, Debug)]
pub enum ParseError {
    /// Tokenizer error
    #[error("Tokenizer error: {0}")]
    Pest(#[from] pest::error::Error<Rule>),

    /// No builder recognized the statement starting here
    #[error("Syntax error at offset {offset} near '{near}'")]
    Syntax { offset: usize, near: String },

    #[error("Invalid select chain: {0}")]
    InvalidChain(String),

    #[error("Invalid data '{name}': {reason}")]
    InvalidData { name: String, reason: String },
}

pub type ParseResult<T> = Result<T, ParseError>;

type Builder = fn(&mut TokenCursor<'_>) -> Option<Instruction>;

/// Statement builders in priority order
const BUILDERS: &[Builder] = &[build_node, build_edge, build_select, build_delete_chain];

/// Tokenize, build and validate a whole batch
pub fn parse_batch(text: &str) -> ParseResult<Vec<Instruction>> {
    let tokens = tokenize(text)?;
    let instructions = build(&tokens)?;
    validate(&instructions)?;
    debug!("Parsed {} statements from {} tokens", instructions.len(), tokens.len());
    Ok(instructions)
}

/// Fold a token stream into instructions, one per statement
pub fn build(tokens: &[Token]) -> ParseResult<Vec<Instruction>> {
    let mut cursor = TokenCursor::new(tokens);
    let mut instructions = Vec::new();

    while !cursor.is_end() {
        if cursor.accept_symbol(";") {
            continue;
        }

        let instruction = BUILDERS.iter().find_map(|builder| {
            cursor.try_parse(|c| {
                let instruction = builder(c)?;
                end_of_statement(c).then_some(instruction)
            })
        });

        match instruction {
            Some(instruction) => instructions.push(instruction),
            None => {
                let (offset, near) = cursor
                    .peek()
                    .map(|t| (t.offset, t.to_string()))
                    .unwrap_or_default();
                return Err(ParseError::Syntax { offset, near });
            }
        }
    }

    Ok(instructions)
}

fn end_of_statement(c: &mut TokenCursor<'_>) -> bool {
    c.accept_symbol(";") || c.is_end()
}

fn change_type(c: &mut TokenCursor<'_>) -> Option<ChangeType> {
    match c.accept_any_keyword(&["add", "upsert", "update", "delete"])? {
        "add" => Some(ChangeType::Add),
        "delete" => Some(ChangeType::Delete),
        _ => Some(ChangeType::Set),
    }
}

/// `name=value` where name is one of `names`
fn field(c: &mut TokenCursor<'_>, names: &[&'static str]) -> Option<(&'static str, String)> {
    let name = c.accept_any_keyword(names)?;
    if !c.accept_symbol("=") {
        return None;
    }
    Some((name, value(c)?))
}

/// A word, quoted text, or a `-`-prefixed word such as a negative number
fn value(c: &mut TokenCursor<'_>) -> Option<String> {
    if c.accept_symbol("-") {
        return c.word().map(|w| format!("-{}", w));
    }
    c.value().map(str::to_string)
}

/// `[-]name` keeping the delete marker
fn marked_name(c: &mut TokenCursor<'_>) -> Option<String> {
    let delete = c.accept_symbol("-");
    let name = c.word()?;
    Some(if delete {
        format!("{}{}", DELETE_MARKER, name)
    } else {
        name.to_string()
    })
}

/// `item[,item...]`
fn list<T>(c: &mut TokenCursor<'_>, mut item: impl FnMut(&mut TokenCursor<'_>) -> Option<T>) -> Option<Vec<T>> {
    let mut items = vec![item(c)?];
    while c.accept_symbol(",") {
        items.push(item(c)?);
    }
    Some(items)
}

/// `set` items: `tag`, `tag=value`, `-tag`, `name { 'base64' }`.
///
/// Data blocks are only allowed when `data` is given.
fn set_items(
    c: &mut TokenCursor<'_>,
    tags: &mut Tags,
    mut data: Option<&mut IndexMap<String, String>>,
) -> Option<()> {
    list(c, |c| {
        let name = marked_name(c)?;

        if c.accept_symbol("{") {
            let data = data.as_deref_mut()?;
            let payload = c.value()?;
            if !c.accept_symbol("}") {
                return None;
            }
            data.insert(name, payload.to_string());
        } else if c.accept_symbol("=") {
            tags.insert(name, Some(value(c)?));
        } else {
            tags.insert_flag(name);
        }
        Some(())
    })
    .map(|_| ())
}

fn build_node(c: &mut TokenCursor<'_>) -> Option<Instruction> {
    let change_type = change_type(c)?;
    if !c.accept_keyword("node") {
        return None;
    }
    let (_, key) = field(c, &["key"])?;
    let mut cmd = NodeInstruction::new(change_type, key);

    loop {
        if c.accept_keyword("ifexist") {
            cmd.if_exist = true;
        } else if c.accept_keyword("set") {
            set_items(c, &mut cmd.tags, Some(&mut cmd.data))?;
        } else if c.accept_keyword("index") {
            cmd.indexes.extend(list(c, marked_name)?);
        } else if c.accept_keyword("foreignkey") {
            let foreign_keys = list(c, |c| {
                let field = marked_name(c)?;
                let pattern = if c.accept_symbol("=") { Some(value(c)?) } else { None };
                Some((field, pattern))
            })?;
            cmd.foreign_keys.extend(foreign_keys);
        } else {
            break;
        }
    }

    Some(Instruction::Node(cmd))
}

fn build_edge(c: &mut TokenCursor<'_>) -> Option<Instruction> {
    let change_type = change_type(c)?;
    if !c.accept_keyword("edge") {
        return None;
    }

    let (mut from_key, mut to_key, mut edge_type) = (None, None, None);
    let fields = list(c, |c| {
        field(c, &["from", "fromKey", "to", "toKey", "type", "edgeType"])
    })?;
    for (name, value) in fields {
        match name {
            "from" | "fromKey" => from_key = Some(value),
            "to" | "toKey" => to_key = Some(value),
            _ => edge_type = Some(value),
        }
    }

    let mut cmd = EdgeInstruction {
        change_type,
        from_key: from_key?,
        to_key: to_key?,
        edge_type: edge_type?,
        if_exist: false,
        tags: Tags::new(),
    };

    loop {
        if c.accept_keyword("ifexist") {
            cmd.if_exist = true;
        } else if c.accept_keyword("set") {
            set_items(c, &mut cmd.tags, None)?;
        } else {
            break;
        }
    }

    Some(Instruction::Edge(cmd))
}

fn build_select(c: &mut TokenCursor<'_>) -> Option<Instruction> {
    if !c.accept_keyword("select") {
        return None;
    }
    let steps = chain(c)?;
    let return_names = if c.accept_keyword("return") {
        list(c, |c| c.word().map(str::to_string))?
    } else {
        Vec::new()
    };

    Some(Instruction::Select(SelectInstruction { steps, return_names }))
}

fn build_delete_chain(c: &mut TokenCursor<'_>) -> Option<Instruction> {
    if !c.accept_keyword("delete") {
        return None;
    }
    let steps = chain(c)?;

    Some(Instruction::Delete(DeleteInstruction {
        select: SelectInstruction {
            steps,
            return_names: Vec::new(),
        },
    }))
}

/// Selectors and join markers in any order; shape is checked by the validator
fn chain(c: &mut TokenCursor<'_>) -> Option<Vec<SelectStep>> {
    let mut steps = Vec::new();

    loop {
        if let Some(join) = join_marker(c) {
            steps.push(SelectStep::Join(join));
            continue;
        }

        let step = c
            .try_parse(node_selector)
            .or_else(|| c.try_parse(edge_selector));
        match step {
            Some(step) => steps.push(step),
            None => break,
        }
    }

    (!steps.is_empty()).then_some(steps)
}

fn join_marker(c: &mut TokenCursor<'_>) -> Option<JoinKind> {
    if c.accept_symbol("->") {
        Some(JoinKind::Left)
    } else if c.accept_symbol("<-") {
        Some(JoinKind::Right)
    } else if c.accept_symbol("<->") {
        Some(JoinKind::Full)
    } else {
        None
    }
}

/// Comma-separated filter items up to `close`, calling `item` for each `name[=value]`
fn filters(
    c: &mut TokenCursor<'_>,
    close: &str,
    mut item: impl FnMut(&str, Option<String>),
) -> Option<()> {
    if c.accept_symbol(close) {
        return Some(());
    }

    loop {
        if !c.accept_keyword("*") {
            let name = c.word()?;
            let value = if c.accept_symbol("=") { Some(value(c)?) } else { None };
            item(name, value);
        }

        if c.accept_symbol(close) {
            return Some(());
        }
        if !c.accept_symbol(",") {
            return None;
        }
    }
}

fn alias(c: &mut TokenCursor<'_>) -> Option<String> {
    c.try_parse(|c| {
        c.word()
            .filter(|w| !w.eq_ignore_ascii_case("return"))
            .map(str::to_string)
    })
}

fn node_selector(c: &mut TokenCursor<'_>) -> Option<SelectStep> {
    if !c.accept_symbol("(") {
        return None;
    }

    let mut select = NodeSelect::default();
    filters(c, ")", |name, value| match value {
        Some(value) if name.eq_ignore_ascii_case("key") => select.key = Some(value),
        value => {
            select.tags.insert(name, value);
        }
    })?;
    select.alias = alias(c);

    Some(SelectStep::Node(select))
}

fn edge_selector(c: &mut TokenCursor<'_>) -> Option<SelectStep> {
    if !c.accept_symbol("[") {
        return None;
    }

    let mut select = EdgeSelect::default();
    filters(c, "]", |name, value| {
        let field = match name.to_ascii_lowercase().as_str() {
            "from" | "fromkey" => &mut select.from_key,
            "to" | "tokey" => &mut select.to_key,
            "type" | "edgetype" => &mut select.edge_type,
            _ => {
                select.tags.insert(name, value);
                return;
            }
        };
        match value {
            Some(value) => *field = Some(value),
            None => {
                select.tags.insert_flag(name);
            }
        }
    })?;
    select.alias = alias(c);

    Some(SelectStep::Edge(select))
}
