//! Slug normalization and validation.
//!
//! A soul is identified by `(owner_namespace, slug)`. Both halves obey the
//! same rules: lowercase ASCII letters, digits, and hyphens, starting with a
//! letter or digit. Slugs are unique only within one owner's namespace, not
//! globally.

use crate::{Error, Result};

/// Trim surrounding whitespace and lowercase the candidate identifier.
/// Normalization never fails; validation is separate so callers can report
/// the normalized form in error messages.
pub fn normalize(raw: &str) -> String {
  raw.trim().to_lowercase()
}

/// Check an already-normalized identifier against `^[a-z0-9][a-z0-9-]*$`.
pub fn validate(slug: &str) -> Result<()> {
  let mut chars = slug.chars();
  let valid_head = matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c.is_ascii_digit());
  let valid_tail =
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');

  if valid_head && valid_tail {
    Ok(())
  } else {
    Err(Error::InvalidIdentifier(slug.to_owned()))
  }
}

/// Normalize and validate in one step. This is the form every store entry
/// point uses before touching the namespace.
pub fn normalized(raw: &str) -> Result<String> {
  let slug = normalize(raw);
  validate(&slug)?;
  Ok(slug)
}
