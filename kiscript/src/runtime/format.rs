//! Text formatting shared by `repr()`, f-strings and `str.format`.

use super::error::{RuntimeError, RuntimeResult};
use super::values::Value;

/// Shortest round-tripping float text, always with a fractional part or
/// exponent so it reads back as a float.
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    format!("{f:?}")
}

/// Quote a string the way `repr()` shows it.
pub fn quote_str(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

#[derive(Debug, Default, PartialEq)]
struct FormatSpec {
    fill: Option<char>,
    align: Option<char>,
    sign_plus: bool,
    zero_pad: bool,
    width: usize,
    grouping: bool,
    precision: Option<usize>,
    kind: Option<char>,
}

impl FormatSpec {
    // [[fill]align][+][0][width][,][.precision][type]
    fn parse(spec: &str) -> RuntimeResult<Self> {
        let chars: Vec<char> = spec.chars().collect();
        let mut parsed = FormatSpec::default();
        let mut i = 0;
        let is_align = |c: char| matches!(c, '<' | '>' | '^');

        if chars.len() >= 2 && is_align(chars[1]) {
            parsed.fill = Some(chars[0]);
            parsed.align = Some(chars[1]);
            i = 2;
        } else if chars.first().copied().is_some_and(is_align) {
            parsed.align = Some(chars[0]);
            i = 1;
        }
        if chars.get(i) == Some(&'+') {
            parsed.sign_plus = true;
            i += 1;
        }
        if chars.get(i) == Some(&'0') {
            parsed.zero_pad = true;
            i += 1;
        }
        let width_start = i;
        while chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
            i += 1;
        }
        if i > width_start {
            parsed.width = chars[width_start..i]
                .iter()
                .collect::<String>()
                .parse()
                .map_err(|_| invalid_spec(spec))?;
        }
        if chars.get(i) == Some(&',') {
            parsed.grouping = true;
            i += 1;
        }
        if chars.get(i) == Some(&'.') {
            i += 1;
            let start = i;
            while chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
                i += 1;
            }
            if i == start {
                return Err(invalid_spec(spec));
            }
            parsed.precision = Some(
                chars[start..i]
                    .iter()
                    .collect::<String>()
                    .parse()
                    .map_err(|_| invalid_spec(spec))?,
            );
        }
        if let Some(kind) = chars.get(i) {
            parsed.kind = Some(*kind);
            i += 1;
        }
        if i != chars.len() {
            return Err(invalid_spec(spec));
        }
        Ok(parsed)
    }
}

fn invalid_spec(spec: &str) -> RuntimeError {
    RuntimeError::value_error(format!("invalid format specifier '{spec}'"))
}

/// Format a value according to a format spec such as `.2f` or `>8`.
pub fn format_with_spec(value: &Value, spec: &str) -> RuntimeResult<String> {
    if spec.is_empty() {
        return Ok(value.display());
    }
    let spec_parsed = FormatSpec::parse(spec)?;
    let numeric = matches!(value, Value::Int(_) | Value::Float(_));
    let operation = "format";

    let mut body = match spec_parsed.kind {
        Some('f') | Some('F') => {
            format!("{:.*}", spec_parsed.precision.unwrap_or(6), value.expect_float(operation)?)
        }
        Some('%') => format!(
            "{:.*}%",
            spec_parsed.precision.unwrap_or(6),
            value.expect_float(operation)? * 100.0
        ),
        Some('e') => format!("{:.*e}", spec_parsed.precision.unwrap_or(6), value.expect_float(operation)?),
        Some('g') => significant(value.expect_float(operation)?, spec_parsed.precision.unwrap_or(6)),
        Some('d') => value.expect_int(operation)?.to_string(),
        Some('x') => format!("{:x}", value.expect_int(operation)?),
        Some('X') => format!("{:X}", value.expect_int(operation)?),
        Some('b') => format!("{:b}", value.expect_int(operation)?),
        Some('s') => truncate_chars(&value.display(), spec_parsed.precision),
        None => match (value, spec_parsed.precision) {
            (Value::Float(f), Some(precision)) => significant(*f, precision),
            (Value::Str(s), precision) => truncate_chars(s, precision),
            (other, _) => other.display(),
        },
        Some(other) => {
            return Err(RuntimeError::value_error(format!(
                "unknown format code '{other}' for object of type '{}'",
                value.type_name()
            )))
        }
    };

    if spec_parsed.grouping {
        body = group_thousands(&body);
    }
    if spec_parsed.sign_plus && numeric && !body.starts_with('-') {
        body.insert(0, '+');
    }
    Ok(pad(body, &spec_parsed, numeric))
}

fn significant(f: f64, precision: usize) -> String {
    if f == 0.0 || !f.is_finite() {
        return format_float(f);
    }
    let precision = precision.max(1) as i32;
    let exponent = f.abs().log10().floor() as i32;
    let decimals = (precision - 1 - exponent).max(0) as usize;
    let text = format!("{f:.decimals$}");
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text
    }
}

fn truncate_chars(s: &str, precision: Option<usize>) -> String {
    match precision {
        Some(n) => s.chars().take(n).collect(),
        None => s.to_string(),
    }
}

fn group_thousands(body: &str) -> String {
    let (sign, rest) = match body.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", body),
    };
    let (int_part, frac_part) = match rest.find('.') {
        Some(dot) => rest.split_at(dot),
        None => (rest, ""),
    };
    if !int_part.chars().all(|c| c.is_ascii_digit()) {
        return body.to_string();
    }
    let mut grouped = String::new();
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("{sign}{grouped}{frac_part}")
}

fn pad(body: String, spec: &FormatSpec, numeric: bool) -> String {
    let len = body.chars().count();
    if len >= spec.width {
        return body;
    }
    let missing = spec.width - len;
    if spec.zero_pad && spec.align.is_none() && numeric {
        let (sign, digits) = match body.chars().next() {
            Some(c @ ('-' | '+')) => (c.to_string(), &body[1..]),
            _ => (String::new(), body.as_str()),
        };
        return format!("{sign}{}{digits}", "0".repeat(missing));
    }
    let fill = spec.fill.unwrap_or(' ').to_string();
    let align = spec.align.unwrap_or(if numeric { '>' } else { '<' });
    match align {
        '>' => format!("{}{body}", fill.repeat(missing)),
        '^' => {
            let left = missing / 2;
            format!("{}{body}{}", fill.repeat(left), fill.repeat(missing - left))
        }
        _ => format!("{body}{}", fill.repeat(missing)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_float_repr() {
        let cases = vec![(1.0, "1.0"), (0.1, "0.1"), (2.54, "2.54"), (-0.5, "-0.5")];
        for (f, expected) in cases {
            assert_eq!(format_float(f), expected);
        }
        assert_eq!(format_float(f64::NAN), "nan");
    }

    #[test]
    fn test_format_specs() {
        let cases = vec![
            (Value::Float(3.14159), ".2f", "3.14"),
            (Value::Int(7), ">4", "   7"),
            (Value::Int(7), "03", "007"),
            (Value::Int(1234567), ",", "1,234,567"),
            (Value::Float(0.25), ".0%", "25%"),
            (Value::from("ab"), "*^6", "**ab**"),
            (Value::from("ab"), "<4", "ab  "),
            (Value::Int(255), "x", "ff"),
            (Value::Float(1234.5678), ".3", "1235"),
            (Value::Int(5), "+d", "+5"),
        ];
        for (value, spec, expected) in cases {
            assert_eq!(format_with_spec(&value, spec).unwrap(), expected, "spec {spec}");
        }
    }

    #[test]
    fn test_invalid_spec() {
        assert!(format_with_spec(&Value::Int(1), ".q").is_err());
        assert!(format_with_spec(&Value::from("x"), "d").is_err());
    }
}
