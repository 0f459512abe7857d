// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Conservative size reduction for production artifacts.
//!
//! Strips comments and collapses blank space without rewriting
//! identifiers or reordering code. String and template literals are
//! respected, so the passes are safe to run over arbitrary input.

/// Strips `//` and `/* */` comments from JavaScript and drops blank
/// lines and trailing whitespace.
pub fn minify_js(src: &str) -> String {
    let mut out = String::with_capacity(src.len());
    let mut chars = src.chars().peekable();
    let mut string_delim: Option<char> = None;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if let Some(delim) = string_delim {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == delim {
                string_delim = None;
            }
            continue;
        }

        match c {
            '"' | '\'' | '`' => {
                string_delim = Some(c);
                out.push(c);
            }
            '/' => match chars.peek() {
                Some('/') => {
                    for next in chars.by_ref() {
                        if next == '\n' {
                            out.push('\n');
                            break;
                        }
                    }
                }
                Some('*') => {
                    chars.next();
                    let mut prev = '\0';
                    for next in chars.by_ref() {
                        if prev == '*' && next == '/' {
                            break;
                        }
                        prev = next;
                    }
                }
                _ => out.push(c),
            },
            _ => out.push(c),
        }
    }

    collapse_blank_lines(&out)
}

/// Strips `/* */` comments from CSS and drops blank lines and trailing
/// whitespace.
pub fn minify_css(src: &str) -> String {
    let mut out = String::with_capacity(src.len());
    let mut chars = src.chars().peekable();
    let mut string_delim: Option<char> = None;

    while let Some(c) = chars.next() {
        if let Some(delim) = string_delim {
            out.push(c);
            if c == delim {
                string_delim = None;
            }
            continue;
        }

        match c {
            '"' | '\'' => {
                string_delim = Some(c);
                out.push(c);
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
            }
            _ => out.push(c),
        }
    }

    collapse_blank_lines(&out)
}

fn collapse_blank_lines(src: &str) -> String {
    let mut out = String::with_capacity(src.len());
    for line in src.lines() {
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            continue;
        }
        out.push_str(trimmed);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_line_comments_are_stripped() {
        let out = minify_js("var a = 1; // comment\nvar b = 2;\n");
        assert_eq!(out, "var a = 1;\nvar b = 2;\n");
    }

    #[test]
    fn test_js_block_comments_are_stripped() {
        let out = minify_js("var a /* inline */ = 1;\n/* block\nspan */\nvar b = 2;\n");
        assert_eq!(out, "var a  = 1;\nvar b = 2;\n");
    }

    #[test]
    fn test_js_strings_are_preserved() {
        let out = minify_js("var url = \"http://x\"; var s = '// not a comment';\n");
        assert!(out.contains("http://x"));
        assert!(out.contains("// not a comment"));
    }

    #[test]
    fn test_js_escaped_quote_in_string() {
        let out = minify_js("var s = \"a\\\"b // c\";\n");
        assert!(out.contains("a\\\"b // c"));
    }

    #[test]
    fn test_css_comments_and_blank_lines() {
        let out = minify_css("/* banner */\nbody {\n  color: red;\n}\n\n\n");
        assert_eq!(out, "body {\n  color: red;\n}\n");
    }

    #[test]
    fn test_css_string_with_comment_marker() {
        let out = minify_css("a { content: \"/* keep */\"; }\n");
        assert!(out.contains("/* keep */"));
    }
}
