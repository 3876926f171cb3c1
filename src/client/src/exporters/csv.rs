//! Minimal RFC 4180 reading and writing for the event files.

fn needs_quotes(field: &str) -> bool {
    field.contains([',', '"', '\r', '\n'])
}

pub fn encode_field(field: &str) -> String {
    if needs_quotes(field) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

pub fn encode_record<S: AsRef<str>>(fields: &[S]) -> String {
    fields
        .iter()
        .map(|f| encode_field(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

/// Splits text into raw records, honouring line breaks inside quoted fields.
/// Terminators are not part of the returned slices; blank lines are dropped.
///
/// A quote only opens a quoted field at the start of a field; anywhere else in an
/// unquoted field it is a literal character.
pub fn split_records(text: &str) -> Vec<&str> {
    let mut records = Vec::new();
    let mut in_quotes = false;
    let mut field_start = true;
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        if in_quotes {
            if ch == '"' {
                if chars.peek().is_some_and(|&(_, next)| next == '"') {
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            continue;
        }

        match ch {
            '"' if field_start => {
                in_quotes = true;
                field_start = false;
            }
            ',' => field_start = true,
            '\n' => {
                records.push(text[start..idx].trim_end_matches('\r'));
                start = idx + 1;
                field_start = true;
            }
            _ => field_start = false,
        }
    }
    if start < text.len() {
        records.push(text[start..].trim_end_matches('\r'));
    }

    records.retain(|r| !r.is_empty());
    records
}

pub fn parse_record(raw: &str) -> Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut chars = raw.chars().peekable();
    let mut in_quotes = false;
    let mut quoted = false;

    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(ch),
            }
            continue;
        }

        match ch {
            '"' if field.is_empty() && !quoted => {
                in_quotes = true;
                quoted = true;
            }
            ',' => {
                fields.push(std::mem::take(&mut field));
                quoted = false;
            }
            _ if quoted => {
                return Err(format!("text after closing quote in field {}", fields.len() + 1))
            }
            // a quote inside an unquoted field is kept as text
            _ => field.push(ch),
        }
    }

    if in_quotes {
        return Err("unterminated quoted field".to_string());
    }
    fields.push(field);
    Ok(fields)
}
