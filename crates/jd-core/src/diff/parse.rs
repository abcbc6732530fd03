//! Parser for the native jd diff text format.

use serde_json::Value as JsonValue;

use super::{Diff, DiffElement, DiffMetadata, Path, PathSegment};
use crate::{Node, ParseError};

/// Parses native diff text into a [`Diff`].
///
/// Every parsed element carries the metadata in effect at its position,
/// so parsing the rendered output of the diff engine reproduces the
/// engine's diff structure exactly.
pub(super) fn parse_native(input: &str) -> Result<Diff, ParseError> {
    let mut parser = Parser::default();
    for (index, line) in input.lines().enumerate() {
        parser.line(index + 1, line)?;
    }
    parser.finish()
}

#[derive(Default)]
struct Parser {
    metadata: DiffMetadata,
    current: Option<Element>,
    elements: Vec<DiffElement>,
}

struct Element {
    opened_at: usize,
    path: Path,
    before: Vec<Node>,
    remove: Vec<Node>,
    add: Vec<Node>,
    after: Vec<Node>,
}

impl Parser {
    fn line(&mut self, number: usize, line: &str) -> Result<(), ParseError> {
        if line.is_empty() {
            return Ok(());
        }
        match line.as_bytes()[0] {
            b'^' => self.header(number, line),
            b'@' => self.open_element(number, line),
            b'-' => self.remove(number, line),
            b'+' => self.add(number, line),
            b'[' if line == "[" => self.context_void(number, Side::Before),
            b']' if line == "]" => self.context_void(number, Side::After),
            b' ' if line.starts_with("  ") => self.context(number, &line[2..]),
            _ => Err(ParseError::syntax(number, format!("unexpected line: {line}"))),
        }
    }

    fn header(&mut self, number: usize, line: &str) -> Result<(), ParseError> {
        let payload = line
            .strip_prefix("^ ")
            .ok_or_else(|| ParseError::syntax(number, "expected JSON object after ^"))?;
        let value: JsonValue = serde_json::from_str(payload)
            .map_err(|err| ParseError::syntax(number, format!("invalid metadata: {err}")))?;
        let JsonValue::Object(map) = value else {
            return Err(ParseError::syntax(number, "metadata must be a JSON object"));
        };
        for (key, value) in map {
            match key.as_str() {
                // Merge is monotone: once a diff switches to merge
                // semantics it cannot switch back.
                "Merge" => match value {
                    JsonValue::Bool(true) => self.metadata.merge = true,
                    other => {
                        return Err(ParseError::syntax(
                            number,
                            format!("expected Merge metadata to be true. got {other}"),
                        ));
                    }
                },
                "Version" => {
                    let version = value.as_u64().and_then(|v| u32::try_from(v).ok()).ok_or_else(
                        || ParseError::syntax(number, format!("invalid Version metadata: {value}")),
                    )?;
                    self.metadata.version = Some(version);
                }
                // Producers may annotate source files; irrelevant to patching.
                "File" => {}
                other => {
                    return Err(ParseError::syntax(
                        number,
                        format!("unrecognized metadata key: {other}"),
                    ));
                }
            }
        }
        Ok(())
    }

    fn open_element(&mut self, number: usize, line: &str) -> Result<(), ParseError> {
        self.flush()?;
        let payload = line
            .strip_prefix("@ ")
            .ok_or_else(|| ParseError::syntax(number, "expected JSON array after @"))?;
        let path = Path::from_json_str(payload)
            .map_err(|err| ParseError::syntax(number, format!("invalid path: {err}")))?;
        self.current = Some(Element {
            opened_at: number,
            path,
            before: Vec::new(),
            remove: Vec::new(),
            add: Vec::new(),
            after: Vec::new(),
        });
        Ok(())
    }

    fn remove(&mut self, number: usize, line: &str) -> Result<(), ParseError> {
        let value = parse_value(number, line, "-")?;
        let Some(element) = self.current.as_mut() else {
            return Err(ParseError::syntax(number, "expected @ before -"));
        };
        if !element.add.is_empty() {
            return Err(ParseError::syntax(number, "removals must precede additions"));
        }
        if !element.after.is_empty() {
            return Err(ParseError::syntax(number, "removals must precede after context"));
        }
        element.remove.push(value);
        Ok(())
    }

    fn add(&mut self, number: usize, line: &str) -> Result<(), ParseError> {
        let value = if line == "+" { Node::Void } else { parse_value(number, line, "+")? };
        let Some(element) = self.current.as_mut() else {
            return Err(ParseError::syntax(number, "expected @ before +"));
        };
        if !element.after.is_empty() {
            return Err(ParseError::syntax(number, "additions must precede after context"));
        }
        element.add.push(value);
        Ok(())
    }

    fn context_void(&mut self, number: usize, side: Side) -> Result<(), ParseError> {
        let Some(element) = self.current.as_mut() else {
            return Err(ParseError::syntax(number, "expected @ before context"));
        };
        match side {
            Side::Before => {
                if !element.remove.is_empty() || !element.add.is_empty() {
                    return Err(ParseError::syntax(number, "[ must precede changes"));
                }
                element.before.push(Node::Void);
            }
            Side::After => element.after.push(Node::Void),
        }
        Ok(())
    }

    fn context(&mut self, number: usize, payload: &str) -> Result<(), ParseError> {
        let value: JsonValue = serde_json::from_str(payload)
            .map_err(|err| ParseError::syntax(number, format!("invalid context value: {err}")))?;
        let node = Node::from_json_value(value)?;
        let Some(element) = self.current.as_mut() else {
            return Err(ParseError::syntax(number, "expected @ before context"));
        };
        if element.remove.is_empty() && element.add.is_empty() {
            element.before.push(node);
        } else {
            element.after.push(node);
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ParseError> {
        let Some(element) = self.current.take() else {
            return Ok(());
        };
        let line = element.opened_at;
        if element.remove.is_empty() && element.add.is_empty() {
            return Err(ParseError::syntax(line, "diff element has no changes"));
        }

        let multi_valued = element.remove.len() > 1 || element.add.len() > 1;
        let terminal_collection = matches!(
            element.path.segments().last(),
            Some(PathSegment::Index(_) | PathSegment::Set | PathSegment::Multiset)
        );
        if multi_valued && !terminal_collection {
            return Err(ParseError::syntax(
                line,
                "multiple values require a list, set, or multiset path",
            ));
        }

        if self.metadata.merge {
            if !element.remove.is_empty() {
                return Err(ParseError::syntax(line, "merge diff elements cannot remove values"));
            }
            if !element.before.is_empty() || !element.after.is_empty() {
                return Err(ParseError::syntax(line, "merge diff elements cannot carry context"));
            }
            let object_path = element
                .path
                .segments()
                .iter()
                .all(|segment| matches!(segment, PathSegment::Key(_)));
            if !object_path && !element.path.is_empty() {
                return Err(ParseError::syntax(
                    line,
                    "merge diff paths may only contain object keys",
                ));
            }
        }

        let metadata = if self.metadata.is_effective() { Some(self.metadata.clone()) } else { None };
        self.elements.push(DiffElement {
            metadata,
            path: element.path,
            before: element.before,
            remove: element.remove,
            add: element.add,
            after: element.after,
        });
        Ok(())
    }

    fn finish(mut self) -> Result<Diff, ParseError> {
        self.flush()?;
        Ok(Diff::from_elements(self.elements))
    }
}

enum Side {
    Before,
    After,
}

fn parse_value(number: usize, line: &str, prefix: &str) -> Result<Node, ParseError> {
    let payload = line
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix(' '))
        .ok_or_else(|| ParseError::syntax(number, format!("expected value after {prefix}")))?;
    let value: JsonValue = serde_json::from_str(payload)
        .map_err(|err| ParseError::syntax(number, format!("invalid value: {err}")))?;
    Ok(Node::from_json_value(value)?)
}
