//! Collection identifier sanitization.

/// Identifier used when nothing usable survives sanitization.
pub const DEFAULT_COLLECTION: &str = "default_collection";

pub const MIN_LEN: usize = 3;
pub const MAX_LEN: usize = 63;

const PAD: &str = "_store";

fn is_boundary_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit()
}

fn trim_boundaries(s: &str) -> &str {
    s.trim_matches(|c: char| !is_boundary_char(c))
}

/// Turn an arbitrary name into a valid collection identifier.
///
/// The result is 3–63 characters of `[a-z0-9_-]`, starts and ends with an
/// alphanumeric, and is a fixed point: `sanitize(sanitize(x)) == sanitize(x)`.
pub fn sanitize(name: &str) -> String {
    let lowered = name.to_lowercase();

    let mut collapsed = String::with_capacity(lowered.len());
    let mut in_space = false;
    for c in lowered.chars() {
        if c.is_whitespace() {
            if !in_space {
                collapsed.push('_');
            }
            in_space = true;
        } else {
            in_space = false;
            if is_boundary_char(c) || c == '_' || c == '-' {
                collapsed.push(c);
            }
        }
    }

    let trimmed = trim_boundaries(&collapsed);
    if trimmed.is_empty() {
        return DEFAULT_COLLECTION.to_string();
    }

    // All remaining characters are ASCII, so byte slicing is safe.
    let truncated = trim_boundaries(&trimmed[..trimmed.len().min(MAX_LEN)]);

    let mut id = truncated.to_string();
    if id.len() < MIN_LEN {
        id.push_str(PAD);
    }
    id
}

/// Whether `id` is already a valid collection identifier.
pub fn is_valid(id: &str) -> bool {
    (MIN_LEN..=MAX_LEN).contains(&id.len())
        && id
            .chars()
            .all(|c| is_boundary_char(c) || c == '_' || c == '-')
        && id.starts_with(is_boundary_char)
        && id.ends_with(is_boundary_char)
}
