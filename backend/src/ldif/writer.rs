//! RFC 2849 serialization: value escaping, base64, line folding.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use super::LdapEntry;

/// Maximum line length before folding.
pub const MAX_LINE_WIDTH: usize = 76;

/// RFC 2849 SAFE-STRING check.
///
/// ```text
/// SAFE-INIT-CHAR = any ASCII except NUL, LF, CR, SPACE, ":", "<"
/// SAFE-CHAR      = any ASCII except NUL, LF, CR
/// ```
///
/// A trailing space is also treated as unsafe so it survives readers that
/// trim lines.
pub fn is_safe_string(value: &str) -> bool {
    let Some(first) = value.chars().next() else {
        return true;
    };
    if matches!(first, ' ' | ':' | '<') || value.ends_with(' ') {
        return false;
    }
    value
        .chars()
        .all(|c| c.is_ascii() && !matches!(c, '\0' | '\n' | '\r'))
}

/// RFC 4512 attribute description: a `descr` (`ALPHA *(ALPHA / DIGIT / "-")`)
/// or a numeric OID.
pub fn is_attribute_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => chars.all(|c| c.is_ascii_alphanumeric() || c == '-'),
        Some(c) if c.is_ascii_digit() => {
            name.split('.').all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
        }
        _ => false,
    }
}

/// One `attr: value` or `attr:: base64` line, before folding.
pub fn attribute_line(attribute: &str, value: &str) -> String {
    if is_safe_string(value) {
        format!("{}: {}", attribute, value)
    } else {
        format!("{}:: {}", attribute, STANDARD.encode(value.as_bytes()))
    }
}

/// Fold a line longer than [`MAX_LINE_WIDTH`] into continuation lines,
/// each starting with a single space.
pub fn fold_line(line: &str) -> String {
    if line.chars().count() <= MAX_LINE_WIDTH {
        return line.to_string();
    }

    let chars: Vec<char> = line.chars().collect();
    let mut out = String::with_capacity(line.len() + line.len() / MAX_LINE_WIDTH * 2);
    let (head, mut rest) = chars.split_at(MAX_LINE_WIDTH);
    out.extend(head);

    // Continuation lines carry one leading space, so they hold one char less.
    while !rest.is_empty() {
        let take = rest.len().min(MAX_LINE_WIDTH - 1);
        out.push('\n');
        out.push(' ');
        out.extend(&rest[..take]);
        rest = &rest[take..];
    }
    out
}

/// Escape an RDN value per RFC 4514.
pub fn escape_dn_value(value: &str) -> String {
    let last = value.chars().count().saturating_sub(1);
    let mut escaped = String::with_capacity(value.len());

    for (i, c) in value.chars().enumerate() {
        match c {
            '"' | '+' | ',' | ';' | '<' | '>' | '\\' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '#' if i == 0 => escaped.push_str("\\#"),
            ' ' if i == 0 || i == last => escaped.push_str("\\ "),
            c if c.is_control() => {
                let mut buf = [0u8; 4];
                for byte in c.encode_utf8(&mut buf).bytes() {
                    escaped.push_str(&format!("\\{:02x}", byte));
                }
            }
            c => escaped.push(c),
        }
    }

    escaped
}

/// Render one entry: `dn` line then every attribute line, folded, no
/// trailing newline.
pub fn encode_entry(entry: &LdapEntry) -> String {
    let mut lines = Vec::with_capacity(entry.attributes().len() + 1);
    lines.push(fold_line(&attribute_line("dn", entry.dn())));
    for (attribute, value) in entry.attributes() {
        lines.push(fold_line(&attribute_line(attribute, value)));
    }
    lines.join("\n")
}

/// Render entries separated by one blank line, ending with a single newline.
pub fn write_ldif(entries: &[LdapEntry]) -> String {
    if entries.is_empty() {
        return String::new();
    }
    let mut out = entries.iter().map(encode_entry).collect::<Vec<_>>().join("\n\n");
    out.push('\n');
    out
}
