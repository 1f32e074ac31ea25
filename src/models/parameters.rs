// file: src/models/parameters.rs
// description: experiment parameter values and command line template formatting
// reference: named placeholder substitution

use crate::error::{NeronetError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub type Parameters = BTreeMap<String, ParameterValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl ParameterValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParameterValue::Integer(value) => Some(*value as f64),
            ParameterValue::Float(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Bool(true) => f.write_str("True"),
            ParameterValue::Bool(false) => f.write_str("False"),
            ParameterValue::Integer(value) => write!(f, "{}", value),
            ParameterValue::Float(value) => f.write_str(&float_repr(*value)),
            ParameterValue::Text(value) => f.write_str(value),
        }
    }
}

/// Substitutes `{name}` placeholders in `template` with parameter values.
///
/// A placeholder may carry a format spec `[.N][f|e|g]`:
///
/// - `.Nf` fixed point with `N` decimals, `.Ne` scientific, `.Ng` general;
/// - `.N` alone keeps `N` significant digits on floats, truncates text to
///   `N` characters and is rejected for integers.
///
/// Doubled braces produce a literal brace.
pub fn format_parameters(template: &str, parameters: &Parameters) -> Result<String> {
    let mut output = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                output.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                output.push('}');
            }
            '{' => {
                let mut field = String::new();
                let mut closed = false;
                for next in chars.by_ref() {
                    if next == '}' {
                        closed = true;
                        break;
                    }
                    field.push(next);
                }
                if !closed {
                    return Err(NeronetError::Format(format!(
                        "unclosed placeholder in '{}'",
                        template
                    )));
                }
                output.push_str(&render_field(&field, parameters)?);
            }
            '}' => {
                return Err(NeronetError::Format(format!(
                    "single '}}' encountered in '{}'",
                    template
                )));
            }
            other => output.push(other),
        }
    }

    Ok(output)
}

/// Names referenced by placeholders, in template order.
pub fn placeholder_names(template: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = template.replace("{{", "").replace("}}", "");
    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        let field = &rest[start + 1..start + len];
        let name = field.split(':').next().unwrap_or_default().trim();
        names.push(name.to_string());
        rest = rest[start + len + 1..].to_string();
    }
    names
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Presentation {
    Default,
    Fixed,
    Exponent,
    General,
}

fn render_field(field: &str, parameters: &Parameters) -> Result<String> {
    let (name, spec) = match field.split_once(':') {
        Some((name, spec)) => (name.trim(), Some(spec)),
        None => (field.trim(), None),
    };

    let value = parameters
        .get(name)
        .ok_or_else(|| NeronetError::Format(format!("unknown parameter '{}'", name)))?;

    let Some(spec) = spec.filter(|spec| !spec.is_empty()) else {
        return Ok(value.to_string());
    };
    let unsupported = || NeronetError::Format(format!("unsupported format spec '{}'", spec));

    let (digits, presentation) = match spec.chars().last() {
        Some('f') => (&spec[..spec.len() - 1], Presentation::Fixed),
        Some('e') => (&spec[..spec.len() - 1], Presentation::Exponent),
        Some('g') => (&spec[..spec.len() - 1], Presentation::General),
        _ => (spec, Presentation::Default),
    };
    let precision = match digits {
        "" if presentation != Presentation::Default => None,
        _ => Some(
            digits
                .strip_prefix('.')
                .and_then(|n| n.parse::<usize>().ok())
                .ok_or_else(unsupported)?,
        ),
    };

    match (value, presentation) {
        (ParameterValue::Text(text), Presentation::Default) => {
            Ok(text.chars().take(precision.unwrap_or(usize::MAX)).collect())
        }
        (ParameterValue::Integer(_), Presentation::Default) => Err(NeronetError::Format(format!(
            "precision not allowed for integer parameter '{}'",
            name
        ))),
        (ParameterValue::Float(number), Presentation::Default) => {
            Ok(format_general(*number, precision.unwrap_or(6), true))
        }
        (ParameterValue::Integer(_) | ParameterValue::Float(_), _) => {
            let number = value.as_f64().ok_or_else(unsupported)?;
            let precision = precision.unwrap_or(6);
            Ok(match presentation {
                Presentation::Exponent => format_exponent(number, precision),
                Presentation::General => format_general(number, precision, false),
                _ => format!("{:.*}", precision, number),
            })
        }
        _ => Err(NeronetError::Format(format!(
            "parameter '{}' is not numeric",
            name
        ))),
    }
}

/// Shortest round-trip form; scientific outside `1e-4 <= |x| < 1e16`,
/// e.g. `1e-05`, `0.01`, `1.0`.
fn float_repr(value: f64) -> String {
    if !value.is_finite() {
        return non_finite(value);
    }
    let (digits, exp) = decompose(value, None);
    let body = if (-4..16).contains(&exp) {
        let mut fixed = fixed_from_digits(&digits, exp);
        if !fixed.contains('.') {
            fixed.push_str(".0");
        }
        fixed
    } else {
        scientific(&digits, exp)
    };
    with_sign(value, body)
}

/// `precision` significant digits, trailing zeros removed. With
/// `keep_point` the fixed form keeps one decimal and scientific form is used
/// from `precision - 1` upwards.
fn format_general(value: f64, precision: usize, keep_point: bool) -> String {
    if !value.is_finite() {
        return non_finite(value);
    }
    let precision = precision.max(1);
    let (digits, exp) = decompose(value, Some(precision));
    let limit = if keep_point { precision as i32 - 1 } else { precision as i32 };

    let body = if exp < -4 || exp >= limit {
        let trimmed = digits.trim_end_matches('0');
        scientific(if trimmed.is_empty() { "0" } else { trimmed }, exp)
    } else {
        let decimals = (precision as i32 - 1 - exp).max(0) as usize;
        let mut fixed = format!("{:.*}", decimals, value.abs());
        if fixed.contains('.') {
            fixed = fixed.trim_end_matches('0').trim_end_matches('.').to_string();
        }
        if keep_point && !fixed.contains('.') {
            fixed.push_str(".0");
        }
        fixed
    };
    with_sign(value, body)
}

fn format_exponent(value: f64, precision: usize) -> String {
    if !value.is_finite() {
        return non_finite(value);
    }
    let rendered = format!("{:.*e}", precision, value.abs());
    let (mantissa, exp) = rendered.split_once('e').unwrap_or((rendered.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    with_sign(value, format!("{}{}", mantissa, exponent_suffix(exp)))
}

/// Significant digits without a decimal point and the decimal exponent of
/// the first one.
fn decompose(value: f64, significant: Option<usize>) -> (String, i32) {
    let rendered = match significant {
        Some(digits) => format!("{:.*e}", digits.saturating_sub(1), value.abs()),
        None => format!("{:e}", value.abs()),
    };
    let (mantissa, exp) = rendered.split_once('e').unwrap_or((rendered.as_str(), "0"));
    (mantissa.replace('.', ""), exp.parse().unwrap_or(0))
}

fn fixed_from_digits(digits: &str, exp: i32) -> String {
    if exp < 0 {
        return format!("0.{}{}", "0".repeat((-exp - 1) as usize), digits);
    }
    let int_len = exp as usize + 1;
    if digits.len() <= int_len {
        format!("{}{}", digits, "0".repeat(int_len - digits.len()))
    } else {
        format!("{}.{}", &digits[..int_len], &digits[int_len..])
    }
}

fn scientific(digits: &str, exp: i32) -> String {
    let (first, rest) = digits.split_at(1);
    let mantissa = if rest.is_empty() {
        first.to_string()
    } else {
        format!("{}.{}", first, rest)
    };
    format!("{}{}", mantissa, exponent_suffix(exp))
}

fn exponent_suffix(exp: i32) -> String {
    let sign = if exp < 0 { '-' } else { '+' };
    format!("e{}{:02}", sign, exp.abs())
}

fn with_sign(value: f64, body: String) -> String {
    if value.is_sign_negative() {
        format!("-{}", body)
    } else {
        body
    }
}

fn non_finite(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else if value > 0.0 {
        "inf".to_string()
    } else {
        "-inf".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> Parameters {
        let mut params = Parameters::new();
        params.insert("lr".to_string(), ParameterValue::Float(0.01));
        params.insert("epochs".to_string(), ParameterValue::Integer(20));
        params.insert("name".to_string(), ParameterValue::Text("mnist".to_string()));
        params.insert("shuffle".to_string(), ParameterValue::Bool(true));
        params
    }

    #[test]
    fn test_format_named_placeholders() {
        let result = format_parameters("--lr {lr} --epochs {epochs} {name} {shuffle}", &params()).unwrap();
        assert_eq!(result, "--lr 0.01 --epochs 20 mnist True");
    }

    #[test]
    fn test_float_keeps_decimal_point() {
        let mut params = Parameters::new();
        params.insert("x".to_string(), ParameterValue::Float(1.0));
        assert_eq!(format_parameters("{x}", &params).unwrap(), "1.0");
    }

    #[test]
    fn test_float_display_matches_repr() {
        let render = |value: f64| ParameterValue::Float(value).to_string();
        assert_eq!(render(1e-5), "1e-05");
        assert_eq!(render(0.0001), "0.0001");
        assert_eq!(render(1.5e16), "1.5e+16");
        assert_eq!(render(123456.0), "123456.0");
        assert_eq!(render(-0.25), "-0.25");
    }

    #[test]
    fn test_fixed_precision() {
        assert_eq!(format_parameters("{lr:.3f}", &params()).unwrap(), "0.010");
        assert_eq!(format_parameters("{epochs:.1f}", &params()).unwrap(), "20.0");
        assert_eq!(format_parameters("{lr:f}", &params()).unwrap(), "0.010000");
    }

    #[test]
    fn test_significant_digits() {
        let mut params = Parameters::new();
        params.insert("lr".to_string(), ParameterValue::Float(0.001234));
        params.insert("big".to_string(), ParameterValue::Float(123456.0));
        params.insert("one".to_string(), ParameterValue::Float(1.0));
        params.insert("hundred".to_string(), ParameterValue::Float(100.0));

        assert_eq!(format_parameters("{lr:.3}", &params).unwrap(), "0.00123");
        assert_eq!(format_parameters("{big:.3}", &params).unwrap(), "1.23e+05");
        assert_eq!(format_parameters("{one:.3}", &params).unwrap(), "1.0");
        assert_eq!(format_parameters("{hundred:.3}", &params).unwrap(), "1e+02");
        assert_eq!(format_parameters("{hundred:.3g}", &params).unwrap(), "100");
        assert_eq!(format_parameters("{lr:.2e}", &params).unwrap(), "1.23e-03");
    }

    #[test]
    fn test_precision_on_integers_and_text() {
        assert!(format_parameters("{epochs:.1}", &params()).is_err());
        assert_eq!(format_parameters("{name:.2}", &params()).unwrap(), "mn");
        assert!(format_parameters("{name:.2f}", &params()).is_err());
        assert!(format_parameters("{shuffle:.1f}", &params()).is_err());
        assert!(format_parameters("{lr:>8}", &params()).is_err());
        assert!(format_parameters("{lr:.x}", &params()).is_err());
    }

    #[test]
    fn test_escaped_braces() {
        assert_eq!(
            format_parameters("{{json}} {epochs}", &params()).unwrap(),
            "{json} 20"
        );
    }

    #[test]
    fn test_errors() {
        assert!(format_parameters("{missing}", &params()).is_err());
        assert!(format_parameters("{lr", &params()).is_err());
        assert!(format_parameters("lr}", &params()).is_err());
    }

    #[test]
    fn test_placeholder_names() {
        assert_eq!(
            placeholder_names("{{x}} --lr {lr:.2} --n {epochs}"),
            vec!["lr".to_string(), "epochs".to_string()]
        );
    }
}
