//! Module name helpers.

use std::path::Path;

/// Turns a raw module identifier into a camel-cased key.
///
/// `"data-manager"` becomes `"dataManager"`, `"01.first-command"` becomes
/// `"firstCommand"`.
pub fn sanitize_name(raw: &str) -> String {
    let lowered = raw.to_lowercase();

    // Runs of `-`/`_` collapse into a single space.
    let mut spaced = String::with_capacity(lowered.len());
    let mut in_separator = false;
    for ch in lowered.chars() {
        if ch == '-' || ch == '_' {
            if !in_separator {
                spaced.push(' ');
            }
            in_separator = true;
        } else {
            spaced.push(ch);
            in_separator = false;
        }
    }

    let filtered: Vec<char> = spaced
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || ch.is_whitespace())
        .collect();

    // A space consumes the character right after it, which is upper-cased.
    let mut camel = String::with_capacity(filtered.len());
    let mut index = 0;
    while index < filtered.len() {
        let ch = filtered[index];
        if ch == ' ' {
            if let Some(next) = filtered.get(index + 1) {
                camel.extend(next.to_uppercase());
                index += 2;
                continue;
            }
        }
        if ch != ' ' {
            camel.push(ch);
        }
        index += 1;
    }

    camel.retain(|ch| ch != ' ');
    camel.trim_start_matches(|ch: char| ch.is_ascii_digit()).to_string()
}

/// Returns the file stem of `path`, or an empty string.
pub fn module_name_from_path(path: impl AsRef<Path>) -> String {
    path.as_ref()
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}
