use sqlformat::{FormatOptions, Indent, QueryParams};
use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SqlFormatError {
    UnterminatedString { offset: usize },
    UnterminatedQuotedIdentifier { offset: usize },
    UnterminatedComment { offset: usize },
    UnterminatedDollarQuote { offset: usize },
}

impl fmt::Display for SqlFormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnterminatedString { offset } => {
                write!(f, "unterminated string literal at byte {offset}")
            }
            Self::UnterminatedQuotedIdentifier { offset } => {
                write!(f, "unterminated quoted identifier at byte {offset}")
            }
            Self::UnterminatedComment { offset } => {
                write!(f, "unterminated block comment at byte {offset}")
            }
            Self::UnterminatedDollarQuote { offset } => {
                write!(f, "unterminated dollar-quoted string at byte {offset}")
            }
        }
    }
}

impl std::error::Error for SqlFormatError {}

/// Pretty-prints SQL for display in an editor tab. Blank input is returned as is, and input
/// with an unterminated literal or comment is returned raw.
pub fn format_sql(sql: &str) -> String {
    if sql.trim().is_empty() {
        return sql.to_owned();
    }
    try_format_sql(sql).unwrap_or_else(|_| sql.to_owned())
}

pub fn try_format_sql(sql: &str) -> Result<String, SqlFormatError> {
    check_terminated(sql)?;

    let options = FormatOptions {
        indent: Indent::Spaces(2),
        uppercase: Some(true),
        lines_between_queries: 2,
        ..FormatOptions::default()
    };
    Ok(sqlformat::format(sql, &QueryParams::None, &options))
}

/// Rejects input whose quoted sections or comments run to the end of the text.
fn check_terminated(sql: &str) -> Result<(), SqlFormatError> {
    let bytes = sql.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        let start = i;
        match bytes[i] {
            b'\'' => {
                i = skip_quoted(bytes, i, b'\'')
                    .ok_or(SqlFormatError::UnterminatedString { offset: start })?;
            }
            b'"' => {
                i = skip_quoted(bytes, i, b'"')
                    .ok_or(SqlFormatError::UnterminatedQuotedIdentifier { offset: start })?;
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                i = sql[i..].find('\n').map_or(bytes.len(), |end| i + end + 1);
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = sql[i + 2..]
                    .find("*/")
                    .map(|end| i + 2 + end + 2)
                    .ok_or(SqlFormatError::UnterminatedComment { offset: start })?;
            }
            b'$' => match dollar_tag(&sql[i..]) {
                Some(tag) => {
                    let body = i + tag.len();
                    i = sql[body..]
                        .find(tag)
                        .map(|end| body + end + tag.len())
                        .ok_or(SqlFormatError::UnterminatedDollarQuote { offset: start })?;
                }
                None => i += 1,
            },
            _ => i += 1,
        }
    }
    Ok(())
}

/// Index just past the closing quote; a doubled quote is an escaped quote.
fn skip_quoted(bytes: &[u8], open: usize, quote: u8) -> Option<usize> {
    let mut i = open + 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return Some(i + 1);
        }
        i += 1;
    }
    None
}

/// `$$` or `$tag$` at the start of `rest`. `$1` style parameters are not tags.
fn dollar_tag(rest: &str) -> Option<&str> {
    let inner = &rest[1..];
    let end = inner.find('$')?;
    let tag = &inner[..end];
    let valid = tag
        .chars()
        .enumerate()
        .all(|(idx, ch)| ch == '_' || ch.is_ascii_alphabetic() || (idx > 0 && ch.is_ascii_digit()));
    valid.then(|| &rest[..end + 2])
}
