//! `:token` templating of resource URLs.

use crate::core::row_id;
use lazy_static::lazy_static;
use log::warn;
use regex::{Captures, Regex};
use serde_json::{Map, Value};

lazy_static! {
    static ref URL_TOKEN: Regex = Regex::new(r":([A-Za-z_][A-Za-z0-9_]*)").unwrap();
}

/// Replaces every `:token` in `template` with the matching variable.
///
/// Tokens without a usable variable stay in place. Port numbers and scheme
/// separators never match since tokens must start with a letter or `_`.
pub fn resolve_url(template: &str, vars: &Map<String, Value>) -> String {
    URL_TOKEN
        .replace_all(template, |caps: &Captures| {
            let name = &caps[1];
            match vars.get(name).and_then(row_id) {
                Some(value) => value,
                None => {
                    warn!("[CRUD] - url variable '{}' is not set in '{}'", name, template);
                    caps[0].to_string()
                }
            }
        })
        .into_owned()
}
