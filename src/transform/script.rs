//! Script re-indentation
//!
//! Works on a flat token stream rather than a syntax tree: strings, comments
//! and regular expression literals are kept intact, everything else is laid
//! out one statement per line and indented by brace depth. Line breaks that
//! were already present are kept, which is what makes the pass idempotent.

use super::TransformError;

const INDENT: &str = "    ";

/// Keywords after which a `/` starts a regular expression
const REGEX_PREFIX_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case", "do",
    "else", "yield", "await",
];

/// Words that continue a statement after a closing brace
const CONTINUATION_KEYWORDS: &[&str] = &["else", "catch", "finally", "while"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Word(String),
    Punct(char),
    Str(String),
    Regex(String),
    LineComment(String),
    BlockComment(String),
    Space { newlines: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub line: usize,
}

impl Token {
    fn text(&self) -> String {
        match &self.kind {
            TokenKind::Word(s)
            | TokenKind::Str(s)
            | TokenKind::Regex(s)
            | TokenKind::LineComment(s)
            | TokenKind::BlockComment(s) => s.clone(),
            TokenKind::Punct(c) => c.to_string(),
            TokenKind::Space { .. } => " ".to_string(),
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || (!c.is_ascii() && !c.is_whitespace())
}

/// Whether a `/` after the tokens read so far opens a regular expression literal
fn regex_allowed(tokens: &[Token]) -> bool {
    let mut previous = significant_rev(tokens);
    match previous.next() {
        None => true,
        Some(TokenKind::Word(w)) => REGEX_PREFIX_KEYWORDS.contains(&w.as_str()),
        // `i++ / 2` divides
        Some(TokenKind::Punct(c @ ('+' | '-'))) => previous.next() != Some(&TokenKind::Punct(*c)),
        Some(TokenKind::Punct(c)) => !matches!(c, ')' | ']' | '}'),
        Some(_) => false,
    }
}

pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>, TransformError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens: Vec<Token> = Vec::new();
    let mut i = 0;
    let mut line = 1;

    while i < chars.len() {
        let c = chars[i];
        let start = i;
        let start_line = line;
        let next = chars.get(i + 1).copied();

        let kind = if c.is_whitespace() {
            let mut newlines = 0;
            while i < chars.len() && chars[i].is_whitespace() {
                if chars[i] == '\n' {
                    newlines += 1;
                }
                i += 1;
            }
            line += newlines;
            TokenKind::Space { newlines }
        } else if c == '/' && next == Some('/') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            TokenKind::LineComment(chars[start..i].iter().collect())
        } else if c == '/' && next == Some('*') {
            i += 2;
            loop {
                if i + 1 >= chars.len() {
                    return Err(TransformError::Unterminated {
                        what: "block comment",
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
            TokenKind::BlockComment(chars[start..i].iter().collect())
        } else if c == '\'' || c == '"' || c == '`' {
            i += 1;
            loop {
                let Some(&ch) = chars.get(i) else {
                    return Err(TransformError::Unterminated {
                        what: "string",
                        line: start_line,
                    });
                };
                if ch == '\\' {
                    if chars.get(i + 1) == Some(&'\n') {
                        line += 1;
                    }
                    i += 2;
                    continue;
                }
                i += 1;
                if ch == c {
                    break;
                }
                if ch == '\n' {
                    if c != '`' {
                        return Err(TransformError::Unterminated {
                            what: "string",
                            line: start_line,
                        });
                    }
                    line += 1;
                }
            }
            TokenKind::Str(chars[start..i].iter().collect())
        } else if c == '/' && regex_allowed(&tokens) {
            i += 1;
            let mut in_class = false;
            loop {
                let Some(&ch) = chars.get(i) else {
                    return Err(TransformError::Unterminated {
                        what: "regular expression",
                        line: start_line,
                    });
                };
                if ch == '\n' {
                    return Err(TransformError::Unterminated {
                        what: "regular expression",
                        line: start_line,
                    });
                }
                i += 1;
                match ch {
                    '\\' => i += 1,
                    '[' => in_class = true,
                    ']' => in_class = false,
                    '/' if !in_class => break,
                    _ => {}
                }
            }
            while i < chars.len() && is_word_char(chars[i]) {
                i += 1;
            }
            TokenKind::Regex(chars[start..i.min(chars.len())].iter().collect())
        } else if is_word_char(c) {
            while i < chars.len() && is_word_char(chars[i]) {
                i += 1;
            }
            TokenKind::Word(chars[start..i].iter().collect())
        } else {
            i += 1;
            TokenKind::Punct(c)
        };

        tokens.push(Token {
            kind,
            line: start_line,
        });
    }

    Ok(tokens)
}

fn significant_rev(tokens: &[Token]) -> impl Iterator<Item = &TokenKind> {
    tokens
        .iter()
        .rev()
        .map(|t| &t.kind)
        .filter(|k| {
            !matches!(
                k,
                TokenKind::Space { .. } | TokenKind::LineComment(_) | TokenKind::BlockComment(_)
            )
        })
}

/// Whitespace found before a token
#[derive(Clone, Copy, PartialEq, Eq)]
enum Gap {
    None,
    Space,
    Lines(usize),
}

/// Lays a token stream out as indented lines
pub(crate) fn layout(tokens: &[Token]) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut line_open = false;
    let mut depth = 0usize;
    let mut parens = 0usize;
    let mut rule_break = false;
    let mut after_close = false;
    let mut gap = Gap::None;

    for token in tokens {
        if let TokenKind::Space { newlines } = token.kind {
            gap = if newlines > 0 {
                Gap::Lines(newlines)
            } else {
                Gap::Space
            };
            continue;
        }

        let continues_close = after_close
            && match &token.kind {
                TokenKind::Punct(c) => matches!(c, ';' | ',' | ')' | ']' | '.'),
                TokenKind::Word(w) => CONTINUATION_KEYWORDS.contains(&w.as_str()),
                _ => false,
            };

        let closes = token.kind == TokenKind::Punct('}');
        let mut brk = (rule_break && !continues_close) || closes;
        if let Gap::Lines(_) = gap {
            brk = true;
        }
        let blank = matches!(gap, Gap::Lines(n) if n >= 2);

        if closes {
            depth = depth.saturating_sub(1);
        }

        if brk && line_open {
            lines.push(std::mem::take(&mut current));
            if blank {
                lines.push(String::new());
            }
            line_open = false;
        }

        if !line_open {
            current.push_str(&INDENT.repeat(depth));
            line_open = true;
        } else if gap == Gap::Space {
            current.push(' ');
        }
        current.push_str(&token.text());

        rule_break = false;
        after_close = false;
        match &token.kind {
            TokenKind::Punct('{') => {
                depth += 1;
                rule_break = true;
            }
            TokenKind::Punct('}') => {
                rule_break = true;
                after_close = true;
            }
            TokenKind::Punct('(') | TokenKind::Punct('[') => parens += 1,
            TokenKind::Punct(')') | TokenKind::Punct(']') => parens = parens.saturating_sub(1),
            TokenKind::Punct(';') if parens == 0 => rule_break = true,
            TokenKind::LineComment(_) => rule_break = true,
            _ => {}
        }
        gap = Gap::None;
    }

    if line_open {
        lines.push(current);
    }
    if lines.is_empty() {
        return String::new();
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Re-indents script source
pub fn beautify_script(source: &str) -> Result<String, TransformError> {
    let tokens = tokenize(source)?;
    Ok(layout(&tokens))
}
