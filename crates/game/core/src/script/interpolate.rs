//! `{identifier}` substitution against the key/value store.

use crate::store::{KeyValueStore, StoreResult};

/// Suffix of the one-shot key a selection writes its `nextScriptId` under.
pub const NEXT_SCRIPT_SUFFIX: &str = "_nextScriptId";

/// Key holding the one-shot next-script override for `storage_key`.
pub fn next_script_key(storage_key: &str) -> String {
    format!("{storage_key}{NEXT_SCRIPT_SUFFIX}")
}

/// Replaces every `{name}` token with the stored value of `name`.
///
/// Unset or empty variables leave the token as literal text.
pub fn interpolate(text: &str, store: &dyn KeyValueStore) -> String {
    substitute(text, |name| store.get(name).filter(|value| !value.is_empty()))
}

/// Replaces `{name}` tokens using `lookup`; tokens it declines stay literal.
pub fn substitute<F>(text: &str, mut lookup: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) if close > 0 => {
                let name = &after[..close];
                match lookup(name) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            Some(_) => {
                out.push_str("{}");
                rest = &after[1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

/// First `{name}` token in `text`, if any.
pub fn first_placeholder(text: &str) -> Option<&str> {
    let open = text.find('{')?;
    let after = &text[open + 1..];
    let close = after.find('}')?;
    (close > 0).then(|| &after[..close])
}

/// Resolves a finish-event `nextScript` template.
///
/// When the template names a storage key, a one-shot override written by a
/// prior selection wins and is cleared on read. Otherwise the template is
/// interpolated.
pub fn resolve_next_script(template: &str, store: &dyn KeyValueStore) -> StoreResult<String> {
    let Some(storage_key) = first_placeholder(template) else {
        return Ok(template.to_owned());
    };

    if let Some(direct) = store.take(&next_script_key(storage_key))? {
        if !direct.is_empty() {
            return Ok(direct);
        }
    }

    Ok(interpolate(template, store))
}
