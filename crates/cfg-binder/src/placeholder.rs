use std::borrow::Cow;
use std::collections::BTreeMap;

const PLACEHOLDER_START: char = '@';
const PLACEHOLDER_OPEN: char = '(';
const PLACEHOLDER_CLOSE: char = ')';

/// Parameter values available to `@(name)` placeholders. Keys are matched
/// case-sensitively.
pub type Parameters = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution<'a> {
    pub value: Cow<'a, str>,
    /// Keys that had no parameter value, in order of appearance.
    pub missing: Vec<String>,
}

/// Replaces every `@(key)` in `text` with `parameters[key]`.
///
/// An unterminated `@(key` takes the rest of the text as its key. Unknown
/// keys are left in place and reported once each in `missing`. `@()` is
/// ordinary text.
pub fn substitute<'a>(text: &'a str, parameters: &Parameters) -> Substitution<'a> {
    if !text.contains(PLACEHOLDER_START) {
        return Substitution {
            value: Cow::Borrowed(text),
            missing: Vec::new(),
        };
    }

    let mut out = String::with_capacity(text.len());
    let mut missing: Vec<String> = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find(PLACEHOLDER_START) {
        out.push_str(&rest[..start]);
        let after = &rest[start + PLACEHOLDER_START.len_utf8()..];
        let Some(body) = after.strip_prefix(PLACEHOLDER_OPEN) else {
            out.push(PLACEHOLDER_START);
            rest = after;
            continue;
        };
        let (key, closed) = match body.find(PLACEHOLDER_CLOSE) {
            Some(end) => (&body[..end], true),
            None => (body, false),
        };
        if key.is_empty() {
            out.push(PLACEHOLDER_START);
            rest = after;
            continue;
        }

        match parameters.get(key) {
            Some(value) => out.push_str(value),
            None => {
                out.push(PLACEHOLDER_START);
                out.push(PLACEHOLDER_OPEN);
                out.push_str(key);
                if closed {
                    out.push(PLACEHOLDER_CLOSE);
                }
                if !missing.iter().any(|seen| seen == key) {
                    missing.push(key.to_string());
                }
            }
        }
        rest = if closed {
            &body[key.len() + PLACEHOLDER_CLOSE.len_utf8()..]
        } else {
            ""
        };
    }
    out.push_str(rest);

    Substitution {
        value: Cow::Owned(out),
        missing,
    }
}
