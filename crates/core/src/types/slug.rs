//! URL slug type.
//!
//! Slugs are derived from human-readable store names and used as the public
//! identifier in `/store/{slug}` URLs.

use core::fmt;

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Errors that can occur when building a [`Slug`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SlugError {
    /// The name contains no ASCII letters or digits once accents are removed.
    #[error("name must contain at least one letter or number")]
    Empty,
    /// The string is not a well-formed slug.
    #[error("invalid slug: {0}")]
    Invalid(String),
}

/// A URL-safe identifier matching `[a-z0-9]+(-[a-z0-9]+)*`.
///
/// ## Examples
///
/// ```
/// use delicious_core::Slug;
///
/// let slug = Slug::from_name("Café Crêpe!!").unwrap();
/// assert_eq!(slug.as_str(), "cafe-crepe");
///
/// assert!(Slug::parse("cafe-crepe").is_ok());
/// assert!(Slug::parse("-cafe").is_err());
/// assert!(Slug::parse("Cafe").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Slug(String);

impl Slug {
    /// Maximum length of a slug derived from a name (before any suffix).
    pub const MAX_LENGTH: usize = 100;

    /// Derive a slug from a display name.
    ///
    /// Accents are stripped via canonical decomposition, ASCII letters are
    /// lowercased, apostrophes are dropped and every other run of characters
    /// collapses into a single hyphen.
    ///
    /// # Errors
    ///
    /// Returns `SlugError::Empty` if nothing slug-worthy remains.
    pub fn from_name(name: &str) -> Result<Self, SlugError> {
        let mut out = String::with_capacity(name.len());
        let mut pending_hyphen = false;

        for c in name.nfd() {
            if is_combining_mark(c) || matches!(c, '\'' | '\u{2019}') {
                continue;
            }
            if c.is_ascii_alphanumeric() {
                if pending_hyphen && !out.is_empty() {
                    out.push('-');
                }
                pending_hyphen = false;
                out.push(c.to_ascii_lowercase());
            } else {
                pending_hyphen = true;
            }
        }

        if out.len() > Self::MAX_LENGTH {
            out.truncate(Self::MAX_LENGTH);
            let trimmed = out.trim_end_matches('-').len();
            out.truncate(trimmed);
        }

        if out.is_empty() {
            return Err(SlugError::Empty);
        }

        Ok(Self(out))
    }

    /// Parse an existing slug, e.g. from a URL path segment.
    ///
    /// # Errors
    ///
    /// Returns `SlugError::Invalid` if the input is not a well-formed slug.
    pub fn parse(s: &str) -> Result<Self, SlugError> {
        let well_formed = !s.is_empty()
            && s.split('-').all(|part| {
                !part.is_empty()
                    && part
                        .chars()
                        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
            });

        if well_formed {
            Ok(Self(s.to_owned()))
        } else {
            Err(SlugError::Invalid(s.to_owned()))
        }
    }

    /// Returns `self` with a numeric disambiguation suffix appended.
    #[must_use]
    pub fn with_suffix(&self, n: u32) -> Self {
        Self(format!("{}-{n}", self.0))
    }

    /// Returns the disambiguation number of `self` relative to `base`.
    ///
    /// `base` itself counts as 1, `base-7` as 7; unrelated slugs give `None`.
    #[must_use]
    pub fn suffix_relative_to(&self, base: &Self) -> Option<u32> {
        if self == base {
            return Some(1);
        }
        let rest = self.0.strip_prefix(base.as_str())?.strip_prefix('-')?;
        if rest.is_empty() || !rest.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        rest.parse().ok()
    }

    /// Choose the slug to use for `base` given the slugs already taken.
    ///
    /// The bare base wins when it is free; otherwise the highest existing
    /// suffix plus one is appended. Any numeric tail counts as a suffix, even
    /// one that came from a name: with `cafe` and `cafe-2024` taken, the next
    /// `cafe` becomes `cafe-2025`. Gaps are never filled.
    #[must_use]
    pub fn next_available(base: &Self, taken: &[Self]) -> Self {
        if !taken.contains(base) {
            return base.clone();
        }

        let highest = taken
            .iter()
            .filter_map(|slug| slug.suffix_relative_to(base))
            .max()
            .unwrap_or(1);

        base.with_suffix(highest.saturating_add(1))
    }

    /// Returns the slug as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `Slug` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Slug {
    type Err = SlugError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Slug {
    type Error = SlugError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Slug> for String {
    fn from(slug: Slug) -> Self {
        slug.0
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Slug {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Slug {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::parse(&s)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Slug {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn slug(s: &str) -> Slug {
        Slug::parse(s).unwrap()
    }

    #[test]
    fn test_from_name_strips_accents_and_punctuation() {
        assert_eq!(Slug::from_name("Café Crêpe!!").unwrap().as_str(), "cafe-crepe");
        assert_eq!(
            Slug::from_name("  --Über   Strasse 42--  ").unwrap().as_str(),
            "uber-strasse-42"
        );
        assert_eq!(Slug::from_name("Wes's Diner").unwrap().as_str(), "wess-diner");
    }

    #[test]
    fn test_from_name_output_is_always_well_formed() {
        for name in ["a", "A & B", "ÉÉÉ", "x__y", "1 2 3", "Crème brûlée — bar"] {
            let derived = Slug::from_name(name).unwrap();
            assert_eq!(Slug::parse(derived.as_str()).unwrap(), derived);
        }
    }

    #[test]
    fn test_from_name_rejects_names_without_alphanumerics() {
        assert_eq!(Slug::from_name("!!!"), Err(SlugError::Empty));
        assert_eq!(Slug::from_name(""), Err(SlugError::Empty));
        assert_eq!(Slug::from_name("日本"), Err(SlugError::Empty));
    }

    #[test]
    fn test_from_name_truncates_long_names() {
        let name = "ab ".repeat(60);
        let derived = Slug::from_name(&name).unwrap();
        assert!(derived.as_str().len() <= Slug::MAX_LENGTH);
        assert!(!derived.as_str().ends_with('-'));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["", "-a", "a-", "a--b", "A", "a b", "é"] {
            assert!(Slug::parse(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_suffix_relative_to() {
        let base = slug("cafe");
        assert_eq!(slug("cafe").suffix_relative_to(&base), Some(1));
        assert_eq!(slug("cafe-12").suffix_relative_to(&base), Some(12));
        assert_eq!(slug("cafe-bar").suffix_relative_to(&base), None);
        assert_eq!(slug("cafeteria").suffix_relative_to(&base), None);
    }

    #[test]
    fn test_next_available_prefers_bare_base() {
        let base = slug("cafe");
        assert_eq!(Slug::next_available(&base, &[]), base);
        assert_eq!(Slug::next_available(&base, &[slug("cafe-2")]), base);
    }

    #[test]
    fn test_next_available_counts_numeric_names_as_suffixes() {
        let taken = [slug("cafe"), slug("cafe-2024"), slug("cafe-crepe")];
        assert_eq!(
            Slug::next_available(&slug("cafe"), &taken).as_str(),
            "cafe-2025"
        );
    }

    #[test]
    fn test_next_available_appends_highest_suffix_plus_one() {
        let base = slug("cafe");
        assert_eq!(
            Slug::next_available(&base, &[slug("cafe")]).as_str(),
            "cafe-2"
        );
        assert_eq!(
            Slug::next_available(&base, &[slug("cafe"), slug("cafe-2"), slug("cafe-5")]).as_str(),
            "cafe-6"
        );
    }

    #[test]
    fn test_serde_validates() {
        let ok: Slug = serde_json::from_str("\"cafe-crepe\"").unwrap();
        assert_eq!(ok.as_str(), "cafe-crepe");
        assert!(serde_json::from_str::<Slug>("\"Not A Slug\"").is_err());
    }
}
