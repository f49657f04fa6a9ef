//! ANSI rendering of assistant markdown.

use chatwire_core::ChatwireError;
use chatwire_core::error::Result;
use chatwire_core::render::MarkupRenderer;
use colored::Colorize;

/// Styles a small markdown subset for the terminal: headings, bullets,
/// fenced code, `**bold**` and `` `code` ``.
///
/// An open code fence is rejected so a half-streamed block shows as raw text
/// until its closing fence arrives.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnsiRenderer;

impl MarkupRenderer for AnsiRenderer {
    fn render(&self, text: &str) -> Result<String> {
        let mut out = String::with_capacity(text.len());
        let mut in_fence = false;

        for (i, line) in text.split('\n').enumerate() {
            if i > 0 {
                out.push('\n');
            }
            if line.trim_start().starts_with("```") {
                in_fence = !in_fence;
                out.push_str(&line.bright_black().to_string());
            } else if in_fence {
                out.push_str(&line.yellow().to_string());
            } else if let Some(title) = heading(line) {
                out.push_str(&title.bold().underline().to_string());
            } else if let Some(item) = bullet(line) {
                out.push_str(&format!("{}{} {}", item.0, "•".bright_blue(), style_inline(item.1)));
            } else {
                out.push_str(&style_inline(line));
            }
        }

        if in_fence {
            return Err(ChatwireError::render("unterminated code fence"));
        }
        Ok(out)
    }
}

fn heading(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    let level = trimmed.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    trimmed[level..].strip_prefix(' ')
}

/// Returns the indentation and the item text.
fn bullet(line: &str) -> Option<(&str, &str)> {
    let indent = line.len() - line.trim_start().len();
    let rest = &line[indent..];
    rest.strip_prefix("- ")
        .or_else(|| rest.strip_prefix("* "))
        .map(|item| (&line[..indent], item))
}

/// Unbalanced markers are left as typed.
fn style_inline(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("**")
            && let Some(end) = after.find("**")
        {
            out.push_str(&after[..end].bold().to_string());
            rest = &after[end + 2..];
            continue;
        }
        if let Some(after) = rest.strip_prefix('`')
            && let Some(end) = after.find('`')
        {
            out.push_str(&after[..end].cyan().to_string());
            rest = &after[end + 1..];
            continue;
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            out.push(c);
        }
        rest = chars.as_str();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() {
        colored::control::set_override(false);
    }

    #[test]
    fn test_renders_markdown_subset() {
        plain();
        let rendered = AnsiRenderer
            .render("# Title\nsome **bold** and `code`\n- item\n  * nested")
            .unwrap();
        assert_eq!(rendered, "Title\nsome bold and code\n• item\n  • nested");
    }

    #[test]
    fn test_unbalanced_inline_markers_are_literal() {
        plain();
        assert_eq!(AnsiRenderer.render("2 ** 3 and `x").unwrap(), "2 ** 3 and `x");
    }

    #[test]
    fn test_closed_fence_keeps_lines() {
        plain();
        let rendered = AnsiRenderer.render("```rust\nlet x = 1;\n```").unwrap();
        assert_eq!(rendered, "```rust\nlet x = 1;\n```");
    }

    #[test]
    fn test_open_fence_is_rejected() {
        plain();
        let err = AnsiRenderer.render("look:\n```\nlet x").unwrap_err();
        assert!(matches!(err, ChatwireError::Render(_)));
    }

    #[test]
    fn test_hash_without_space_is_not_a_heading() {
        plain();
        assert_eq!(AnsiRenderer.render("#hashtag").unwrap(), "#hashtag");
    }
}
