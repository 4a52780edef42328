use super::error::AppError;

/// Derive a cluster-safe identifier from a human name.
///
/// Total and deterministic: lowercases, turns spaces and underscores into
/// hyphens, drops everything else outside `[a-z0-9-]`, trims hyphens and
/// truncates to the 63-character label limit. A name with no usable
/// characters slugifies to the empty string, which `validate_slug` rejects.
pub fn slugify(name: &str) -> String {
    let mut slug: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '_' { '-' } else { c })
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
        .collect();
    slug = slug.trim_matches('-').to_string();
    // all-ASCII at this point, truncation cannot split a character
    slug.truncate(63);
    slug
}

/// Check a slug against the DNS label shape the cluster enforces:
/// `^[a-z0-9]([-a-z0-9]*[a-z0-9])?$`, at most 63 characters.
pub fn validate_slug(slug: &str) -> Result<(), AppError> {
    if slug.is_empty() {
        return Err(AppError::validation("slug cannot be empty"));
    }
    if slug.len() > 63 {
        return Err(AppError::validation("slug cannot be longer than 63 characters"));
    }
    let valid_chars = slug
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
    if !valid_chars || slug.starts_with('-') || slug.ends_with('-') {
        return Err(AppError::validation(
            "slug must consist of lowercase alphanumeric characters or '-', \
             and must start and end with an alphanumeric character",
        ));
    }
    Ok(())
}
