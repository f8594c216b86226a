//! Line-based unified diffs between two versions of a page.

use std::fmt;
use std::ops::Range;

use similar::{Algorithm, ChangeTag, DiffTag, TextDiff};

/// Lines of unchanged text kept around each change.
pub const CONTEXT_RADIUS: usize = 3;

/// A single line of a unified diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffLine {
    /// The `@@ -a,b +c,d @@` marker opening a hunk. Ranges are zero-based.
    Hunk { old: Range<usize>, new: Range<usize> },
    Context(String),
    Removed(String),
    Added(String),
}

impl DiffLine {
    pub fn is_change(&self) -> bool {
        matches!(self, DiffLine::Removed(_) | DiffLine::Added(_))
    }
}

fn format_range(range: &Range<usize>) -> String {
    let len = range.len();
    let mut start = range.start + 1;

    match len {
        1 => start.to_string(),
        0 => {
            // Empty ranges point at the line before the insertion/deletion.
            start -= 1;
            format!("{},0", start)
        }
        _ => format!("{},{}", start, len),
    }
}

impl fmt::Display for DiffLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use DiffLine::*;

        match self {
            Hunk { old, new } => write!(f, "@@ -{} +{} @@", format_range(old), format_range(new)),
            Context(text) => write!(f, " {}", text),
            Removed(text) => write!(f, "-{}", text),
            Added(text) => write!(f, "+{}", text),
        }
    }
}

fn is_line_boundary(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\x0b' | '\x0c' | '\x1c' | '\x1d' | '\x1e' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}

/// Splits `text` into lines on every common line boundary, treating `\r\n`
/// as one. A trailing boundary doesn't start another line.
pub fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((index, c)) = chars.next() {
        if !is_line_boundary(c) {
            continue;
        }

        lines.push(&text[start..index]);
        start = index + c.len_utf8();

        if c == '\r' {
            if let Some(&(next, '\n')) = chars.peek() {
                chars.next();
                start = next + 1;
            }
        }
    }

    if start < text.len() {
        lines.push(&text[start..]);
    }

    lines
}

/// The differences between an old and a new version of some text.
///
/// Comparison is by line content as split by [`split_lines`]; line
/// terminators are not part of a line, so `"a\n"` and `"a"` compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diff {
    lines: Vec<DiffLine>,
}

impl Diff {
    /// Computes the diff between `old` and `new`.
    pub fn between(old: &str, new: &str) -> Self {
        let old_lines = split_lines(old);
        let new_lines = split_lines(new);

        let text_diff = TextDiff::configure()
            .algorithm(Algorithm::Myers)
            .diff_slices(&old_lines, &new_lines);

        let mut lines = Vec::new();

        for group in text_diff.grouped_ops(CONTEXT_RADIUS) {
            if group.iter().all(|op| op.tag() == DiffTag::Equal) {
                continue;
            }

            let (first, last) = match (group.first(), group.last()) {
                (Some(first), Some(last)) => (first, last),
                _ => continue,
            };

            lines.push(DiffLine::Hunk {
                old: first.old_range().start..last.old_range().end,
                new: first.new_range().start..last.new_range().end,
            });

            for op in &group {
                for change in text_diff.iter_changes(op) {
                    let text = change.value().to_owned();
                    lines.push(match change.tag() {
                        ChangeTag::Equal => DiffLine::Context(text),
                        ChangeTag::Delete => DiffLine::Removed(text),
                        ChangeTag::Insert => DiffLine::Added(text),
                    });
                }
            }
        }

        Diff { lines }
    }

    /// Returns whether the two versions were identical.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn lines(&self) -> &[DiffLine] {
        &self.lines
    }

    /// Counts added and removed lines.
    pub fn changed_lines(&self) -> usize {
        self.lines.iter().filter(|line| line.is_change()).count()
    }

    /// Renders the diff in unified format, including the `---`/`+++` file
    /// header lines. Empty diffs render as an empty string.
    pub fn unified(&self) -> String {
        if self.is_empty() {
            return String::new();
        }

        let mut rendered = vec!["--- ".to_owned(), "+++ ".to_owned()];
        rendered.extend(self.lines.iter().map(ToString::to_string));
        rendered.join("\n")
    }
}
