//! Sanitizes free text into relational identifiers: lowercase `[a-z0-9_]`,
//! letter-first, length-bounded. Pure functions, deterministic for identical
//! inputs.

use std::collections::HashSet;

/// Hard cap for generated table names.
pub const TABLE_NAME_MAX: usize = 50;

/// Postgres identifier ceiling (NAMEDATALEN - 1).
pub const COLUMN_NAME_MAX: usize = 63;

/// Number of trailing disambiguator characters appended on truncation.
const DISAMBIGUATOR_TAIL: usize = 6;

/// Turns free text into a valid table name: lowercased, every run of
/// characters outside `[a-z0-9_]` collapsed to a single underscore, prefixed
/// with `ds_` when the result does not start with a letter. Names longer
/// than [`TABLE_NAME_MAX`] are truncated; when a disambiguator is given its
/// last six characters are appended so distinct long names stay distinct.
pub fn sanitize_table_name(name: &str, disambiguator: Option<&str>) -> String {
    let mut sanitized = String::new();
    for ch in name.to_lowercase().chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_' {
            sanitized.push(ch);
        } else if !sanitized.ends_with('_') {
            sanitized.push('_');
        }
    }
    if !sanitized.chars().next().is_some_and(|c| c.is_ascii_lowercase()) {
        sanitized = format!("ds_{sanitized}");
    }
    if sanitized.len() <= TABLE_NAME_MAX {
        return sanitized;
    }
    match disambiguator {
        Some(id) => {
            let stem_len = TABLE_NAME_MAX - DISAMBIGUATOR_TAIL - 1;
            let stem: String = sanitized.chars().take(stem_len).collect();
            let tail: String = id
                .chars()
                .rev()
                .take(DISAMBIGUATOR_TAIL)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect::<String>()
                .to_lowercase();
            format!("{stem}_{tail}")
        }
        None => sanitized.chars().take(TABLE_NAME_MAX - 5).collect(),
    }
}

/// Shortens a column name to fit [`COLUMN_NAME_MAX`] characters: long names
/// are trimmed from the front in growing steps (the readable tail of a
/// resolved name is usually the distinguishing part), then hard-truncated as
/// a last resort.
pub fn shorten_column_name(name: &str) -> String {
    let mut shortened = name.to_string();
    for skip in [20usize, 30, 40] {
        if shortened.chars().count() > COLUMN_NAME_MAX {
            shortened = shortened.chars().skip(skip).collect();
        }
    }
    if shortened.chars().count() > COLUMN_NAME_MAX {
        shortened = shortened.chars().take(COLUMN_NAME_MAX).collect();
    }
    shortened
}

/// Makes `candidate` unique against `taken` by appending `_1`, `_2`, ...
/// The result always stays within [`COLUMN_NAME_MAX`] characters; the stem is
/// re-trimmed when a suffix would push it over.
pub fn disambiguate_column(candidate: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(candidate) {
        return candidate.to_string();
    }
    let mut suffix = 1usize;
    loop {
        let tail = format!("_{suffix}");
        let stem_len = COLUMN_NAME_MAX.saturating_sub(tail.chars().count());
        let stem: String = candidate.chars().take(stem_len).collect();
        let attempt = format!("{stem}{tail}");
        if !taken.contains(&attempt) {
            return attempt;
        }
        suffix += 1;
    }
}
