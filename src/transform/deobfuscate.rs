//! Best-effort structural normalization of scripts
//!
//! This is a reprint, not a deobfuscator in any strong sense: it checks that
//! brackets balance, spells out `\xNN` and `\uNNNN` escapes inside quoted
//! strings, and lays the result out with the script beautifier. Renamed
//! identifiers, string tables, packed `eval` payloads and control-flow
//! flattening all come out exactly as they went in.

use super::script::{layout, tokenize, Token, TokenKind};
use super::TransformError;

/// Normalizes a script, failing on structurally broken input
pub fn deobfuscate(source: &str) -> Result<String, TransformError> {
    let mut tokens = tokenize(source)?;
    check_balance(&tokens)?;

    for token in &mut tokens {
        if let TokenKind::Str(literal) = &token.kind {
            if literal.starts_with('\'') || literal.starts_with('"') {
                let decoded = decode_escapes(literal);
                token.kind = TokenKind::Str(decoded);
            }
        }
    }

    Ok(layout(&tokens))
}

fn check_balance(tokens: &[Token]) -> Result<(), TransformError> {
    let mut stack: Vec<char> = Vec::new();

    for token in tokens {
        let TokenKind::Punct(c) = token.kind else {
            continue;
        };
        match c {
            '(' | '[' | '{' => stack.push(c),
            ')' | ']' | '}' => {
                let expected = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                if stack.pop() != Some(expected) {
                    return Err(TransformError::Unbalanced {
                        found: c,
                        line: token.line,
                    });
                }
            }
            _ => {}
        }
    }

    match stack.last() {
        Some(&open) => Err(TransformError::Unclosed(open)),
        None => Ok(()),
    }
}

/// Rewrites hex and unicode escapes in a quoted literal as plain characters
///
/// Escapes that would produce the quote character, a backslash or a control
/// character are left alone so the literal keeps its meaning.
fn decode_escapes(literal: &str) -> String {
    let quote = literal.chars().next().unwrap_or('"');
    let chars: Vec<char> = literal.chars().collect();
    let mut out = String::with_capacity(literal.len());
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == '\\' && i + 1 < chars.len() {
            let width = match chars[i + 1] {
                'x' => 2,
                'u' => 4,
                _ => 0,
            };
            if width > 0 && i + 2 + width <= chars.len() {
                let hex: String = chars[i + 2..i + 2 + width].iter().collect();
                let decoded = u32::from_str_radix(&hex, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .filter(|ch| !ch.is_control() && *ch != quote && *ch != '\\');
                if let Some(ch) = decoded {
                    out.push(ch);
                    i += 2 + width;
                    continue;
                }
            }
            // Keep the escape and the escaped character together
            out.push(chars[i]);
            out.push(chars[i + 1]);
            i += 2;
            continue;
        }
        out.push(chars[i]);
        i += 1;
    }

    out
}
