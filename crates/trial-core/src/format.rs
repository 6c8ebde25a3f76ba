//! Name templates for parameterised tests
//!
//! `%s`, `%d`, `%i`, `%f`, `%j` and `%o` each consume the next positional
//! value of the case, left to right. `%#` inserts the case index and `%%` a
//! literal percent sign. Object cases additionally resolve `$key` (and dotted
//! `$a.b`) tokens against the object. A placeholder with no value left is
//! kept verbatim.

use serde_json::{Map, Value};
use std::collections::VecDeque;

/// Positional arguments of an `each` case: arrays are spread, anything else
/// is passed as a single argument
pub fn case_args(case: &Value) -> Vec<Value> {
    match case {
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    }
}

/// Render the test name for case number `index`
///
/// Placeholders consume a copy of the case's positional values; the case
/// itself is left untouched.
pub fn case_name(template: &str, case: &Value, index: usize) -> String {
    let mut queue: VecDeque<Value> = case_args(case).into();
    let name = substitute_placeholders(template, &mut queue, index);
    match case {
        Value::Object(map) => substitute_keys(&name, map),
        _ => name,
    }
}

fn substitute_placeholders(template: &str, queue: &mut VecDeque<Value>, index: usize) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let Some(&spec) = chars.peek() else {
            out.push('%');
            break;
        };
        match spec {
            '%' => {
                chars.next();
                out.push('%');
            }
            '#' => {
                chars.next();
                out.push_str(&index.to_string());
            }
            's' | 'd' | 'i' | 'f' | 'j' | 'o' => {
                chars.next();
                match queue.pop_front() {
                    Some(value) => out.push_str(&render(spec, &value)),
                    None => {
                        out.push('%');
                        out.push(spec);
                    }
                }
            }
            _ => out.push('%'),
        }
    }

    out
}

fn render(spec: char, value: &Value) -> String {
    match spec {
        's' => display(value),
        'd' => match as_number(value) {
            Some(n) if n.fract() == 0.0 => format!("{}", n as i64),
            Some(n) => n.to_string(),
            None => "NaN".to_string(),
        },
        'i' => match as_number(value) {
            Some(n) => format!("{}", n.trunc() as i64),
            None => "NaN".to_string(),
        },
        'f' => match as_number(value) {
            Some(n) => n.to_string(),
            None => "NaN".to_string(),
        },
        _ => value.to_string(),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Strings render bare, everything else as JSON
fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn substitute_keys(template: &str, object: &Map<String, Value>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let len = after
            .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '.'))
            .unwrap_or(after.len());
        let path = after[..len].trim_end_matches('.');

        match lookup(object, path) {
            Some(value) if !path.is_empty() => {
                out.push_str(&display(value));
                rest = &after[path.len()..];
            }
            _ => {
                out.push('$');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

fn lookup<'a>(object: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = object.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}
