//! Stylesheet layout: one declaration per line, rules indented by nesting

use super::TransformError;

const INDENT: &str = "    ";

/// Pending text of the current selector or declaration
#[derive(Default)]
struct Pending {
    text: String,
    space: bool,
}

impl Pending {
    fn push_piece(&mut self, piece: &str) {
        if self.space && !self.text.is_empty() {
            self.text.push(' ');
        }
        self.space = false;
        self.text.push_str(piece);
    }

    fn take(&mut self) -> String {
        self.space = false;
        std::mem::take(&mut self.text)
    }
}

/// Lays out stylesheet text
pub fn beautify_style(source: &str) -> Result<String, TransformError> {
    let chars: Vec<char> = source.chars().collect();
    let mut lines: Vec<String> = Vec::new();
    let mut pending = Pending::default();
    let mut depth = 0usize;
    let mut line = 1usize;
    let mut i = 0;

    let emit = |lines: &mut Vec<String>, depth: usize, text: String| {
        lines.push(format!("{}{}", INDENT.repeat(depth), text));
    };

    while i < chars.len() {
        let c = chars[i];
        match c {
            '/' if chars.get(i + 1) == Some(&'*') => {
                let start = i;
                let start_line = line;
                i += 2;
                loop {
                    if i + 1 >= chars.len() {
                        return Err(TransformError::Unterminated {
                            what: "comment",
                            line: start_line,
                        });
                    }
                    if chars[i] == '*' && chars[i + 1] == '/' {
                        i += 2;
                        break;
                    }
                    if chars[i] == '\n' {
                        line += 1;
                    }
                    i += 1;
                }
                let comment: String = chars[start..i].iter().collect();
                if pending.text.is_empty() {
                    emit(&mut lines, depth, comment);
                } else {
                    pending.push_piece(&comment);
                }
            }
            '"' | '\'' => {
                let start = i;
                i += 1;
                loop {
                    match chars.get(i) {
                        None | Some('\n') => {
                            return Err(TransformError::Unterminated {
                                what: "string",
                                line,
                            })
                        }
                        Some('\\') => i += 2,
                        Some(&ch) if ch == c => {
                            i += 1;
                            break;
                        }
                        Some(_) => i += 1,
                    }
                }
                let literal: String = chars[start..i.min(chars.len())].iter().collect();
                pending.push_piece(&literal);
            }
            '{' => {
                i += 1;
                let selector = pending.take();
                if selector.is_empty() {
                    emit(&mut lines, depth, "{".to_string());
                } else {
                    emit(&mut lines, depth, format!("{} {{", selector));
                }
                depth += 1;
            }
            '}' => {
                i += 1;
                let trailing = pending.take();
                if !trailing.is_empty() {
                    emit(&mut lines, depth, trailing);
                }
                depth = depth.saturating_sub(1);
                emit(&mut lines, depth, "}".to_string());
            }
            ';' => {
                i += 1;
                let declaration = pending.take();
                emit(&mut lines, depth, format!("{};", declaration));
            }
            c if c.is_whitespace() => {
                if c == '\n' {
                    line += 1;
                }
                i += 1;
                pending.space = true;
            }
            _ => {
                let start = i;
                while i < chars.len() {
                    let ch = chars[i];
                    if ch.is_whitespace()
                        || matches!(ch, '{' | '}' | ';' | '"' | '\'')
                        || (ch == '/' && chars.get(i + 1) == Some(&'*'))
                    {
                        break;
                    }
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                pending.push_piece(&word);
            }
        }
    }

    let trailing = pending.take();
    if !trailing.is_empty() {
        emit(&mut lines, depth, trailing);
    }

    if lines.is_empty() {
        return Ok(String::new());
    }

    let mut out = lines.join("\n");
    out.push('\n');
    Ok(out)
}
