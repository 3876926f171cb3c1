//! Typed coercion of loosely formatted scalar values.
//!
//! Attempts run in a fixed order (boolean, integer, list) and the first one that
//! accepts the text wins; anything else stays a raw string.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Coerced {
    Bool(bool),
    Integer(i64),
    List(Vec<String>),
    Raw(String),
}

pub fn coerce(raw: &str) -> Coerced {
    let text = raw.trim();
    coerce_bool(text)
        .or_else(|| coerce_integer(text))
        .or_else(|| coerce_list(text))
        .unwrap_or_else(|| Coerced::Raw(text.to_string()))
}

fn coerce_bool(text: &str) -> Option<Coerced> {
    if text.eq_ignore_ascii_case("true") {
        Some(Coerced::Bool(true))
    } else if text.eq_ignore_ascii_case("false") {
        Some(Coerced::Bool(false))
    } else {
        None
    }
}

fn coerce_integer(text: &str) -> Option<Coerced> {
    text.parse::<i64>().ok().map(Coerced::Integer)
}

fn coerce_list(text: &str) -> Option<Coerced> {
    let inner = text
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .unwrap_or(text);
    if !inner.contains(',') {
        return None;
    }
    Some(Coerced::List(
        inner.split(',').map(|item| item.trim().to_string()).collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::lower_true("true", Coerced::Bool(true))]
    #[case::mixed_false("False", Coerced::Bool(false))]
    #[case::integer("3", Coerced::Integer(3))]
    #[case::negative("-1", Coerced::Integer(-1))]
    #[case::padded_integer(" 1\n", Coerced::Integer(1))]
    #[case::float("0.5", Coerced::Raw("0.5".into()))]
    #[case::bracketed_list("[a, b]", Coerced::List(vec!["a".into(), "b".into()]))]
    #[case::bare_list("x,y,z", Coerced::List(vec!["x".into(), "y".into(), "z".into()]))]
    #[case::word("Alive", Coerced::Raw("Alive".into()))]
    #[case::empty("", Coerced::Raw(String::new()))]
    fn test_coerce(#[case] input: &str, #[case] expected: Coerced) {
        assert_eq!(coerce(input), expected);
    }
}
