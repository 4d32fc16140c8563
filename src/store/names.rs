// src/store/names.rs

/// Longest project name accepted after sanitising.
pub const MAX_NAME_LEN: usize = 64;

/// Reduce a user-supplied name to `[A-Za-z0-9_-]`.
///
/// Other characters become `_`; leading/trailing underscores are dropped and
/// the result is capped at [`MAX_NAME_LEN`]. Returns `None` when nothing
/// usable is left.
pub fn sanitize_name(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_NAME_LEN)
        .collect();

    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Sanitise the final component of an uploaded file name, keeping its
/// extension (`"my bot.py"` -> `"my_bot.py"`).
pub fn sanitize_file_name(raw: &str) -> Option<String> {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    let (stem, ext) = match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (base, None),
    };
    let stem = sanitize_name(stem)?;
    match ext.and_then(sanitize_name) {
        Some(ext) => Some(format!("{stem}.{ext}")),
        None => Some(stem),
    }
}
