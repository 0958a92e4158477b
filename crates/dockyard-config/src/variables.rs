//! `${KEY}` placeholder interpolation.
//!
//! Placeholders name a single setting: `${APP_NAME}`, `${GIT_COMMIT}`.
//! Unknown placeholders are left in place so they show up verbatim in
//! rendered commands and can be reported with [`placeholders`].

use regex::Regex;
use std::sync::LazyLock;

// Regex for matching ${KEY} placeholders
static VAR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
});

/// Replace every placeholder that `lookup` knows about.
pub fn interpolate<'a, F>(input: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<&'a str>,
{
    VAR_REGEX
        .replace_all(input, |caps: &regex::Captures| {
            let key = &caps[1];
            lookup(key)
                .map(str::to_string)
                .unwrap_or_else(|| format!("${{{}}}", key))
        })
        .to_string()
}

/// Interpolate a list of templates.
pub fn interpolate_vec<'a, F>(inputs: &[&str], lookup: F) -> Vec<String>
where
    F: Fn(&str) -> Option<&'a str> + Copy,
{
    inputs.iter().map(|s| interpolate(s, lookup)).collect()
}

/// Names of all placeholders in `input`, in order of appearance.
pub fn placeholders(input: &str) -> Vec<String> {
    VAR_REGEX
        .captures_iter(input)
        .map(|caps| caps[1].to_string())
        .collect()
}
