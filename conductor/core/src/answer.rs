//! Answer matching
//!
//! Catalog names are lowercase and hyphenated (`mr-mime`), players type
//! whatever they like (`Mr. Mime`). Both sides go through [`normalize_name`]
//! before comparison.

/// Normalize a name for comparison
///
/// Trims, lowercases, drops `.` and apostrophes, and collapses every run of
/// whitespace and/or hyphens into a single `-`.
#[must_use]
pub fn normalize_name(raw: &str) -> String {
    let mut normalized = String::with_capacity(raw.len());
    let mut pending_separator = false;

    for ch in raw.trim().chars() {
        if matches!(ch, '.' | '\'' | '\u{2019}') {
            continue;
        }
        if ch.is_whitespace() || ch == '-' {
            pending_separator = !normalized.is_empty();
            continue;
        }
        if pending_separator {
            normalized.push('-');
            pending_separator = false;
        }
        normalized.extend(ch.to_lowercase());
    }

    normalized
}

/// Whether a submitted answer names the expected entity
#[must_use]
pub fn names_match(submitted: &str, expected: &str) -> bool {
    let submitted = normalize_name(submitted);
    !submitted.is_empty() && submitted == normalize_name(expected)
}

/// Human-readable form of a catalog name (`mr-mime` becomes `Mr Mime`)
#[must_use]
pub fn display_name(name: &str) -> String {
    name.split(|c: char| c == '-' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
