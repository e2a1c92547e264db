use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

/// Number of lines captured on each side of a located comment line.
pub const DEFAULT_CONTEXT_LINES: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
/// A numbered code excerpt around a review location, plus the nearest
/// enclosing declaration found above it (best effort, possibly empty).
pub struct CodeWindow {
    pub snippet: String,
    pub declaration: String,
}

fn declaration_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(func|class|struct|enum|protocol|extension)\s+")
            .expect("declaration pattern compiles")
    })
}

/// Splits a `path:line` review location. Returns `None` for anything that is
/// not exactly one path and one positive line number.
pub fn parse_location(location: &str) -> Option<(&str, usize)> {
    let mut parts = location.split(':');
    let path = parts.next()?;
    let line = parts.next()?;
    if parts.next().is_some() || path.is_empty() {
        return None;
    }
    let line = line.parse::<usize>().ok()?;
    if line == 0 {
        return None;
    }
    Some((path, line))
}

/// Reads a window of `context_lines` lines on each side of `line` (1-based)
/// from `root/path`. Each line is rendered as `NNN|   text`, with `←`
/// marking the located line. Returns `None` when the file is missing,
/// unreadable, or shorter than `line`.
pub fn extract_code_window(
    root: &Path,
    path: &str,
    line: usize,
    context_lines: usize,
) -> Option<CodeWindow> {
    let file_path = root.join(path);
    let content = std::fs::read_to_string(&file_path).ok()?;
    let lines: Vec<&str> = content.lines().collect();
    if line == 0 || line > lines.len() {
        return None;
    }

    let start = line.saturating_sub(context_lines + 1);
    let end = (line + context_lines).min(lines.len());
    let mut snippet_lines = Vec::with_capacity(end - start);
    for index in start..end {
        let marker = if index == line - 1 { " ← " } else { "   " };
        snippet_lines.push(format!("{:>3}|{}{}", index + 1, marker, lines[index].trim_end()));
    }

    let mut declaration = String::new();
    for index in (0..line).rev() {
        let candidate = lines[index].trim();
        if declaration_regex().is_match(candidate) {
            declaration = candidate.to_string();
            break;
        }
    }

    Some(CodeWindow {
        snippet: snippet_lines.join("\n"),
        declaration,
    })
}
