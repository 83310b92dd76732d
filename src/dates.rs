//! Date stamps on inline task lines.
//!
//! Two notations are understood: a glyph followed by the value
//! (`✅ 2024-01-01`) and a bracketed field (`[[completion::2024-01-01]]`).
//! A plain `done:2024-01-01` token is also removed when found.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::patterns::{self, compile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateField {
    Due,
    Done,
    Start,
    Scheduled,
    Created,
    Canceled,
}

impl DateField {
    pub const ALL: [DateField; 6] = [
        DateField::Due,
        DateField::Done,
        DateField::Start,
        DateField::Scheduled,
        DateField::Created,
        DateField::Canceled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DateField::Due => "due",
            DateField::Done => "done",
            DateField::Start => "start",
            DateField::Scheduled => "scheduled",
            DateField::Created => "created",
            DateField::Canceled => "canceled",
        }
    }

    pub fn glyph(&self) -> &'static str {
        match self {
            DateField::Due => "📅",
            DateField::Done => "✅",
            DateField::Start => "🛫",
            DateField::Scheduled => "⏳",
            DateField::Created => "➕",
            DateField::Canceled => "❌",
        }
    }

    /// Key used by the bracketed notation.
    pub fn bracket_key(&self) -> &'static str {
        match self {
            DateField::Done => "completion",
            other => other.as_str(),
        }
    }

    fn patterns(&self) -> &'static FieldPatterns {
        &FIELD_PATTERNS[*self as usize]
    }
}

impl fmt::Display for DateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DateField {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        DateField::ALL
            .into_iter()
            .find(|field| field.as_str() == value)
            .ok_or_else(|| Error::InvalidDateField(value.to_string()))
    }
}

struct FieldPatterns {
    glyph: Regex,
    bracket: Regex,
    plain: Regex,
}

impl FieldPatterns {
    fn compile(field: DateField) -> Self {
        Self {
            glyph: compile(&format!(r"\s*{}\x{{FE0F}}?\s+\S+", field.glyph())),
            bracket: compile(&format!(r"\s*\[\[{}::[^\]]+\]\]", field.bracket_key())),
            plain: compile(&format!(r"\s+{}:\S+", field.as_str())),
        }
    }
}

static FIELD_PATTERNS: LazyLock<[FieldPatterns; 6]> =
    LazyLock::new(|| DateField::ALL.map(FieldPatterns::compile));

/// Date-like tokens at the end of a line; new stamps go in front of them.
static TRAILING_DATES: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?:\s+(?:\S+:\S+|\[\[[^\]]+\]\]|(?:📅|✅|🛫|⏳|➕|❌)\x{FE0F}?\s+\S+))+$")
});

/// Split a line into its leading indentation and the rest.
fn split_indent(line: &str) -> (&str, &str) {
    let idx = line.len() - line.trim_start().len();
    line.split_at(idx)
}

/// Delete every match of `pattern` from the line. Spacing is repaired only
/// where text was cut out; indentation and all other spacing are kept.
pub(crate) fn cut(line: &str, pattern: &Regex) -> String {
    let (indent, body) = split_indent(line);
    if !pattern.is_match(body) {
        return line.to_string();
    }
    let mut pieces = pattern.split(body);
    let mut out = pieces.next().unwrap_or_default().to_string();
    for piece in pieces {
        out.truncate(out.trim_end().len());
        let piece = piece.trim_start();
        if !out.is_empty() && !piece.is_empty() {
            out.push(' ');
        }
        out.push_str(piece);
    }
    format!("{indent}{out}")
}

/// Remove every stamp of `field`, in any notation.
pub fn remove_date(line: &str, field: DateField) -> String {
    if line.trim().is_empty() {
        return line.to_string();
    }
    let patterns = field.patterns();
    [&patterns.glyph, &patterns.bracket, &patterns.plain]
        .into_iter()
        .fold(line.to_string(), |result, pattern| cut(&result, pattern))
}

/// Replace any stamp of `field` with `date`.
///
/// The bracketed notation is used when the line already carries a bracketed
/// field, otherwise the glyph notation.
pub fn add_date(line: &str, field: DateField, date: &str) -> Result<String> {
    if line.trim().is_empty() {
        return Err(Error::EmptyTaskLine);
    }
    let cleaned = remove_date(line, field);
    let cleaned = cleaned.trim_end();

    let stamp = if patterns::DATAVIEW_FIELD.is_match(cleaned) {
        format!(" [[{}::{date}]]", field.bracket_key())
    } else {
        format!(" {} {date}", field.glyph())
    };

    Ok(match TRAILING_DATES.find(cleaned) {
        Some(m) => format!("{}{stamp}{}", &cleaned[..m.start()], &cleaned[m.start()..]),
        None => format!("{cleaned}{stamp}"),
    })
}
