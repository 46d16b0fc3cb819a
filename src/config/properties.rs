//! Reader and writer for the `key=value` properties format.
//!
//! Supports `#` and `!` comments, `=`, `:` or whitespace separators, line
//! continuations ending in an odd number of backslashes and the usual
//! backslash escapes including `\uXXXX`.

/// Parses properties text into ordered key/value pairs.
/// Later duplicates override earlier ones when collected into a map.
pub fn parse(text: &str) -> Vec<(String, String)> {
    let mut entries = Vec::new();
    let mut lines = text.lines();

    while let Some(line) = lines.next() {
        let mut logical = line.trim_start().to_string();
        if logical.is_empty() || logical.starts_with('#') || logical.starts_with('!') {
            continue;
        }
        while ends_with_continuation(&logical) {
            logical.pop();
            match lines.next() {
                Some(next) => logical.push_str(next.trim_start()),
                None => break,
            }
        }
        entries.push(split_entry(&logical));
    }
    entries
}

fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

fn split_entry(line: &str) -> (String, String) {
    let chars: Vec<char> = line.chars().collect();
    let mut key_end = chars.len();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '=' | ':' | ' ' | '\t' | '\x0c' => {
                key_end = i;
                break;
            }
            _ => i += 1,
        }
    }
    let key_end = key_end.min(chars.len());

    let mut value_start = key_end;
    while value_start < chars.len() && matches!(chars[value_start], ' ' | '\t' | '\x0c') {
        value_start += 1;
    }
    if value_start < chars.len() && matches!(chars[value_start], '=' | ':') {
        value_start += 1;
        while value_start < chars.len() && matches!(chars[value_start], ' ' | '\t' | '\x0c') {
            value_start += 1;
        }
    }

    let key: String = chars[..key_end].iter().collect();
    let value: String = chars[value_start..].iter().collect();
    (unescape(&key), unescape(&value))
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\x0c'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => out.push_str(&hex),
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

fn escape(raw: &str, is_key: bool) -> String {
    let mut out = String::with_capacity(raw.len() + 8);
    for (i, c) in raw.chars().enumerate() {
        match c {
            ' ' if i == 0 || is_key => out.push_str("\\ "),
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\x0c' => out.push_str("\\f"),
            '=' | ':' | '#' | '!' => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || (c as u32) > 0x7e => {
                for unit in c.encode_utf16(&mut [0u16; 2]) {
                    out.push_str(&format!("\\u{:04X}", unit));
                }
            }
            c => out.push(c),
        }
    }
    out
}

/// Renders entries in the given order behind a `#<timestamp>` comment line.
pub fn render<'a>(
    entries: impl IntoIterator<Item = (&'a str, String)>,
    timestamp: &str,
) -> String {
    let mut out = String::new();
    out.push('#');
    out.push_str(timestamp);
    out.push('\n');
    for (key, value) in entries {
        out.push_str(&escape(key, true));
        out.push('=');
        out.push_str(&escape(&value, false));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_separators_and_comments() {
        let text = "# header\n! also a comment\nshowTime=true\nfilterBy : BY_TEXT\nfilterLevel WARN\n\n";
        assert_eq!(
            parse(text),
            vec![
                ("showTime".to_string(), "true".to_string()),
                ("filterBy".to_string(), "BY_TEXT".to_string()),
                ("filterLevel".to_string(), "WARN".to_string()),
            ]
        );
    }

    #[test]
    fn joins_continuation_lines() {
        let text = "filterString=first \\\n    second\n";
        assert_eq!(parse(text)[0].1, "first second");
    }

    #[test]
    fn escaped_backslash_is_not_a_continuation() {
        let text = "filterString=C\\:\\\\\nshowTime=false\n";
        let entries = parse(text);
        assert_eq!(entries[0].1, "C:\\");
        assert_eq!(entries[1].1, "false");
    }

    #[test]
    fn special_characters_survive_a_render() {
        let value = " pump = on: #1 \u{e9}\t".to_string();
        let text = render([("filterString", value.clone())], "Sat Oct 17 10:00:00 CEST 2026");
        assert!(text.starts_with("#Sat Oct 17"));
        assert!(text.contains("\\u00E9"));
        assert_eq!(parse(&text), vec![("filterString".to_string(), value)]);
    }

    #[test]
    fn empty_value_is_kept() {
        assert_eq!(parse("filterString=\n")[0], ("filterString".to_string(), String::new()));
    }
}
