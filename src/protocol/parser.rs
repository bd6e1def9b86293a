//! Line Framing and Message Classification
//!
//! Two steps turn socket bytes into a [`Message`]:
//!
//! 1. **Framing**: [`LineParser::next_line`] splits one `\n`-terminated line
//!    out of the receive buffer. A trailing `\r` is tolerated.
//! 2. **Classification**: [`parse_line`] maps the line onto exactly one of
//!    the five message kinds, in this precedence:
//!
//! ```text
//! REGISTER_WORKER ──> RegisterWorker
//! REQUEST_TASK    ──> RequestTask
//! RESULT <id> ... ──> Result { id, text }
//! UNREGISTER_CLIENT ─> UnregisterClient
//! anything else   ──> Submit(TaskSpec)  (or a ParseError)
//! ```
//!
//! ## Task Submissions
//!
//! A submission is `<operation> <operand>... [<priority>]`. With four or more
//! fields the last field is always the priority slot: HIGH/MEDIUM/LOW (any
//! case) selects a lane, anything else falls back to MEDIUM and is dropped.
//! With exactly three fields the last one is taken as the priority only if it
//! is one of the three names, so `Add 5 10` stays a two-operand task. With
//! exactly two fields the second field is always an operand.
//! A submission must keep at least one operand once the priority is removed.
//!
//! Operands are not validated here.

use crate::protocol::types::{
    Message, Priority, TaskId, TaskSpec, REGISTER_WORKER, REQUEST_TASK, RESULT, UNREGISTER_CLIENT,
};
use bytes::{Buf, BytesMut};
use thiserror::Error;

/// Errors that can occur while framing or classifying a line.
///
/// Everything except [`ParseError::LineTooLong`] is malformed input from an
/// otherwise healthy connection: it is logged and the line is dropped.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// Blank line
    #[error("empty line")]
    Empty,

    /// A submission with no operands left after priority stripping
    #[error("task '{operation}' has no operands")]
    MissingOperands { operation: String },

    /// A RESULT line without both an ID and result text
    #[error("malformed result: {0}")]
    MalformedResult(String),

    /// A RESULT line whose ID is not a task identifier
    #[error("invalid task id: {0}")]
    InvalidTaskId(String),

    /// The line is not valid UTF-8
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(String),

    /// No newline within the maximum line length
    #[error("line too long: {size} bytes (max: {max})")]
    LineTooLong { size: usize, max: usize },
}

impl ParseError {
    /// Returns true if the connection cannot continue after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ParseError::LineTooLong { .. })
    }
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Maximum length of a single line (64 KB)
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Incremental line framer over a receive buffer.
///
/// # Example
///
/// ```
/// use taskbroker::protocol::LineParser;
/// use bytes::BytesMut;
///
/// let parser = LineParser::new();
/// let mut buffer = BytesMut::from(&b"REQUEST_TASK\r\nAdd 1"[..]);
///
/// assert_eq!(parser.next_line(&mut buffer).unwrap().as_deref(), Some("REQUEST_TASK"));
/// // "Add 1" is still waiting for its newline
/// assert_eq!(parser.next_line(&mut buffer).unwrap(), None);
/// ```
#[derive(Debug, Clone)]
pub struct LineParser {
    max_line_length: usize,
}

impl Default for LineParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LineParser {
    /// Creates a parser with the default line limit.
    pub fn new() -> Self {
        Self::with_max_line_length(MAX_LINE_LENGTH)
    }

    pub fn with_max_line_length(max_line_length: usize) -> Self {
        Self { max_line_length }
    }

    /// Removes the next complete line from `buf`.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(line))` - A line without its terminator
    /// - `Ok(None)` - No newline buffered yet
    /// - `Err(e)` - The line was consumed but could not be decoded, or the
    ///   buffer holds more than the line limit without a newline
    pub fn next_line(&self, buf: &mut BytesMut) -> ParseResult<Option<String>> {
        let newline = match buf.iter().position(|&b| b == b'\n') {
            Some(pos) => pos,
            None if buf.len() > self.max_line_length => {
                return Err(ParseError::LineTooLong {
                    size: buf.len(),
                    max: self.max_line_length,
                });
            }
            None => return Ok(None),
        };

        if newline > self.max_line_length {
            return Err(ParseError::LineTooLong {
                size: newline,
                max: self.max_line_length,
            });
        }

        let mut line = buf.split_to(newline);
        buf.advance(1);
        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }

        match String::from_utf8(line.to_vec()) {
            Ok(s) => Ok(Some(s)),
            Err(e) => Err(ParseError::InvalidUtf8(e.to_string())),
        }
    }
}

/// Classifies one line of input.
///
/// # Example
///
/// ```
/// use taskbroker::protocol::{parse_line, Message, Priority};
///
/// match parse_line("Multiply 5 10 high").unwrap() {
///     Message::Submit(spec) => {
///         assert_eq!(spec.operands, vec!["5", "10"]);
///         assert_eq!(spec.priority, Priority::High);
///     }
///     other => panic!("unexpected {:?}", other),
/// }
/// ```
pub fn parse_line(line: &str) -> ParseResult<Message> {
    let line = line.trim();

    match line {
        REGISTER_WORKER => return Ok(Message::RegisterWorker),
        REQUEST_TASK => return Ok(Message::RequestTask),
        _ => {}
    }

    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.first() == Some(&RESULT) {
        return parse_result(line, &fields);
    }

    if line == UNREGISTER_CLIENT {
        return Ok(Message::UnregisterClient);
    }

    parse_submission(&fields).map(Message::Submit)
}

/// Parses `RESULT <id> <text...>`.
fn parse_result(line: &str, fields: &[&str]) -> ParseResult<Message> {
    if fields.len() < 3 {
        return Err(ParseError::MalformedResult(line.to_string()));
    }

    // IDs go out in canonical decimal; `+01` or `007` name no task
    let id: TaskId = fields[1]
        .parse()
        .ok()
        .filter(|id: &TaskId| id.to_string() == fields[1])
        .ok_or_else(|| ParseError::InvalidTaskId(fields[1].to_string()))?;

    Ok(Message::Result {
        id,
        text: fields[2..].join(" "),
    })
}

/// Parses `<operation> <operand>... [<priority>]`.
fn parse_submission(fields: &[&str]) -> ParseResult<TaskSpec> {
    let (operation, rest) = match fields.split_first() {
        Some(split) => split,
        None => return Err(ParseError::Empty),
    };

    let (operands, priority) = match rest.split_last() {
        Some((last, init)) if fields.len() >= 4 => {
            (init, Priority::parse(last).unwrap_or_default())
        }
        Some((last, init)) if fields.len() == 3 => match Priority::parse(last) {
            Some(priority) => (init, priority),
            None => (rest, Priority::default()),
        },
        _ => (rest, Priority::default()),
    };

    if operands.is_empty() {
        return Err(ParseError::MissingOperands {
            operation: operation.to_string(),
        });
    }

    Ok(TaskSpec::new(
        *operation,
        operands.iter().map(|s| s.to_string()).collect(),
        priority,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(line: &str) -> TaskSpec {
        match parse_line(line).unwrap() {
            Message::Submit(spec) => spec,
            other => panic!("expected submission, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_keywords() {
        assert_eq!(parse_line("REGISTER_WORKER").unwrap(), Message::RegisterWorker);
        assert_eq!(parse_line("REQUEST_TASK").unwrap(), Message::RequestTask);
        assert_eq!(
            parse_line("UNREGISTER_CLIENT").unwrap(),
            Message::UnregisterClient
        );
    }

    #[test]
    fn test_parse_keywords_with_surrounding_whitespace() {
        assert_eq!(parse_line("  REQUEST_TASK \r").unwrap(), Message::RequestTask);
    }

    #[test]
    fn test_parse_result_rejoins_text() {
        assert_eq!(
            parse_line("RESULT 1 5  *   10 = 50").unwrap(),
            Message::Result {
                id: 1,
                text: "5 * 10 = 50".to_string()
            }
        );
    }

    #[test]
    fn test_parse_result_without_text() {
        assert!(matches!(
            parse_line("RESULT 1"),
            Err(ParseError::MalformedResult(_))
        ));
        assert!(matches!(
            parse_line("RESULT"),
            Err(ParseError::MalformedResult(_))
        ));
    }

    #[test]
    fn test_parse_result_with_bad_id() {
        assert_eq!(
            parse_line("RESULT abc 1 + 1 = 2"),
            Err(ParseError::InvalidTaskId("abc".to_string()))
        );
    }

    #[test]
    fn test_parse_result_rejects_non_canonical_id() {
        for id in ["+1", "01", "+01", "007"] {
            assert_eq!(
                parse_line(&format!("RESULT {} 1 + 2 = 3", id)),
                Err(ParseError::InvalidTaskId(id.to_string()))
            );
        }
        assert_eq!(
            parse_line("RESULT 10 done").unwrap(),
            Message::Result {
                id: 10,
                text: "done".to_string()
            }
        );
    }

    #[test]
    fn test_parse_submission_with_priority() {
        let spec = submission("Multiply 5 10 HIGH");
        assert_eq!(spec.operation, "Multiply");
        assert_eq!(spec.operands, vec!["5", "10"]);
        assert_eq!(spec.priority, Priority::High);
    }

    #[test]
    fn test_parse_submission_priority_case_insensitive() {
        assert_eq!(submission("Add 1 1 low").priority, Priority::Low);
        assert_eq!(submission("Add 1 1 Medium").priority, Priority::Medium);
    }

    #[test]
    fn test_parse_submission_without_priority() {
        let spec = submission("Add 1 2");
        assert_eq!(spec.operands, vec!["1", "2"]);
        assert_eq!(spec.priority, Priority::Medium);
    }

    #[test]
    fn test_parse_submission_unknown_priority_defaults_to_medium() {
        let spec = submission("Add 1 2 URGENT");
        assert_eq!(spec.operands, vec!["1", "2"]);
        assert_eq!(spec.priority, Priority::Medium);

        let spec = submission("Sum 1 2 3 whenever");
        assert_eq!(spec.operands, vec!["1", "2", "3"]);
        assert_eq!(spec.priority, Priority::Medium);
    }

    #[test]
    fn test_parse_submission_three_fields_unknown_tag_is_an_operand() {
        let spec = submission("Add 5 10");
        assert_eq!(spec.operands, vec!["5", "10"]);
        assert_eq!(spec.priority, Priority::Medium);
    }

    #[test]
    fn test_parse_submission_two_fields() {
        let spec = submission("Square 9");
        assert_eq!(spec.operands, vec!["9"]);
        assert_eq!(spec.priority, Priority::Medium);

        // The second field of two is never read as a priority
        let spec = submission("Square HIGH");
        assert_eq!(spec.operands, vec!["HIGH"]);
        assert_eq!(spec.priority, Priority::Medium);
    }

    #[test]
    fn test_parse_submission_single_operand_with_priority() {
        let spec = submission("Negate 4 low");
        assert_eq!(spec.operands, vec!["4"]);
        assert_eq!(spec.priority, Priority::Low);
    }

    #[test]
    fn test_parse_submission_operands_are_opaque() {
        let spec = submission("Add x y HIGH");
        assert_eq!(spec.operands, vec!["x", "y"]);
    }

    #[test]
    fn test_parse_submission_missing_operands() {
        assert_eq!(
            parse_line("Add"),
            Err(ParseError::MissingOperands {
                operation: "Add".to_string()
            })
        );
    }

    #[test]
    fn test_parse_empty_line() {
        assert_eq!(parse_line(""), Err(ParseError::Empty));
        assert_eq!(parse_line("   "), Err(ParseError::Empty));
    }

    #[test]
    fn test_keyword_prefix_is_a_submission() {
        // Only the exact keyword is a worker registration
        let spec = submission("REQUEST_TASK now");
        assert_eq!(spec.operation, "REQUEST_TASK");
    }

    #[test]
    fn test_next_line_splits_lines() {
        let parser = LineParser::new();
        let mut buf = BytesMut::from(&b"REGISTER_WORKER\nREQUEST_TASK\r\n"[..]);

        assert_eq!(
            parser.next_line(&mut buf).unwrap().as_deref(),
            Some("REGISTER_WORKER")
        );
        assert_eq!(
            parser.next_line(&mut buf).unwrap().as_deref(),
            Some("REQUEST_TASK")
        );
        assert_eq!(parser.next_line(&mut buf).unwrap(), None);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_next_line_incomplete() {
        let parser = LineParser::new();
        let mut buf = BytesMut::from(&b"Add 1 2"[..]);

        assert_eq!(parser.next_line(&mut buf).unwrap(), None);
        assert_eq!(buf.len(), 7);

        buf.extend_from_slice(b" HIGH\n");
        assert_eq!(
            parser.next_line(&mut buf).unwrap().as_deref(),
            Some("Add 1 2 HIGH")
        );
    }

    #[test]
    fn test_next_line_too_long() {
        let parser = LineParser::with_max_line_length(8);
        let mut buf = BytesMut::from(&b"0123456789"[..]);

        let err = parser.next_line(&mut buf).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(err, ParseError::LineTooLong { size: 10, max: 8 });
    }

    #[test]
    fn test_next_line_invalid_utf8_is_consumed() {
        let parser = LineParser::new();
        let mut buf = BytesMut::from(&b"\xff\xfe\nREQUEST_TASK\n"[..]);

        let err = parser.next_line(&mut buf).unwrap_err();
        assert!(matches!(err, ParseError::InvalidUtf8(_)));
        assert!(!err.is_fatal());
        assert_eq!(
            parser.next_line(&mut buf).unwrap().as_deref(),
            Some("REQUEST_TASK")
        );
    }
}
