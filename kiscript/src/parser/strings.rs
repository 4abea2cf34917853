use super::{KiScriptParser, ParseError, ParseResult, Rule};
use crate::ast::FStringPart;
use pest::Parser;

/// Resolve backslash escapes in a string literal body.
pub(super) fn unescape(raw: &str, line: usize) -> ParseResult<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some('\n') => {}
            Some('x') => out.push(hex_escape(&mut chars, 2, line)?),
            Some('u') => out.push(hex_escape(&mut chars, 4, line)?),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    Ok(out)
}

fn hex_escape(chars: &mut std::str::Chars, digits: usize, line: usize) -> ParseResult<char> {
    let hex: String = chars.by_ref().take(digits).collect();
    u32::from_str_radix(&hex, 16)
        .ok()
        .filter(|_| hex.len() == digits)
        .and_then(char::from_u32)
        .ok_or_else(|| ParseError::at_line(format!("invalid escape sequence '{hex}'"), line))
}

/// Split an f-string body into literal text and `{expr[:spec]}` fields.
pub(super) fn build_fstring(raw: &str, line: usize) -> ParseResult<Vec<FStringPart>> {
    let mut parts = Vec::new();
    let mut text = String::new();
    let mut chars = raw.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            '{' if matches!(chars.peek(), Some((_, '{'))) => {
                chars.next();
                text.push('{');
            }
            '}' if matches!(chars.peek(), Some((_, '}'))) => {
                chars.next();
                text.push('}');
            }
            '}' => {
                return Err(ParseError::at_line(
                    "single '}' is not allowed in f-string",
                    line,
                ))
            }
            '{' => {
                let end = field_end(raw, i + 1).ok_or_else(|| {
                    ParseError::at_line("unterminated '{' in f-string", line)
                })?;
                if !text.is_empty() {
                    parts.push(FStringPart::Text(unescape(&std::mem::take(&mut text), line)?));
                }
                parts.push(build_field(&raw[i + 1..end], line)?);
                while matches!(chars.peek(), Some((j, _)) if *j <= end) {
                    chars.next();
                }
            }
            _ => text.push(c),
        }
    }

    if !text.is_empty() {
        parts.push(FStringPart::Text(unescape(&text, line)?));
    }
    Ok(parts)
}

// Byte index of the `}` closing the field that starts at `start`.
fn field_end(raw: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (offset, c) in raw[start..].char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '(' | '[' | '{') => depth += 1,
            (None, ')' | ']') => depth = depth.saturating_sub(1),
            (None, '}') if depth == 0 => return Some(start + offset),
            (None, '}') => depth -= 1,
            _ => {}
        }
    }
    None
}

fn build_field(field: &str, line: usize) -> ParseResult<FStringPart> {
    let (expr_text, spec) = split_format_spec(field);
    if expr_text.trim().is_empty() {
        return Err(ParseError::at_line(
            "empty expression not allowed in f-string",
            line,
        ));
    }
    let mut pairs = KiScriptParser::parse(Rule::fstring_field, expr_text.trim()).map_err(|e| {
        ParseError::at_line(
            format!("invalid f-string expression '{}': {}", expr_text.trim(), e.variant.message()),
            line,
        )
    })?;
    let expr_pair = pairs
        .next()
        .and_then(|field| field.into_inner().find(|p| p.as_rule() == Rule::expression))
        .ok_or_else(|| ParseError::at_line("empty expression not allowed in f-string", line))?;
    let expr = super::expressions::build_expression(expr_pair).map_err(|e| match e {
        ParseError::Invalid { message, .. } => ParseError::at_line(message, line),
        other => other,
    })?;
    Ok(FStringPart::Field {
        expr,
        spec: spec.map(str::to_string),
    })
}

// A top-level ':' separates the expression from its format spec.
fn split_format_spec(field: &str) -> (&str, Option<&str>) {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (i, c) in field.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '(' | '[' | '{') => depth += 1,
            (None, ')' | ']' | '}') => depth = depth.saturating_sub(1),
            (None, ':') if depth == 0 => return (&field[..i], Some(&field[i + 1..])),
            _ => {}
        }
    }
    (field, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expr, Literal};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_unescape() {
        let cases = vec![
            (r"plain", "plain"),
            (r"a\nb", "a\nb"),
            (r"tab\there", "tab\there"),
            (r#"quote\"d"#, "quote\"d"),
            (r"\x41é", "Aé"),
            (r"keep \d", "keep \\d"),
        ];
        for (raw, expected) in cases {
            assert_eq!(unescape(raw, 1).unwrap(), expected);
        }
    }

    #[test]
    fn test_fstring_split() {
        let parts = build_fstring("x={x:>5} {{ok}} {d['k']}", 1).unwrap();
        assert_eq!(
            parts,
            vec![
                FStringPart::Text("x=".to_string()),
                FStringPart::Field {
                    expr: Expr::Name("x".to_string()),
                    spec: Some(">5".to_string()),
                },
                FStringPart::Text(" {ok} ".to_string()),
                FStringPart::Field {
                    expr: Expr::Index {
                        object: Box::new(Expr::Name("d".to_string())),
                        index: Box::new(Expr::Literal(Literal::Str("k".to_string()))),
                    },
                    spec: None,
                },
            ]
        );
    }

    #[test]
    fn test_fstring_errors() {
        assert!(build_fstring("{", 1).is_err());
        assert!(build_fstring("}", 1).is_err());
        assert!(build_fstring("{}", 1).is_err());
    }
}
