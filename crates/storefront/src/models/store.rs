//! Store listing domain types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use delicious_core::{Slug, StoreId, UserId};

/// Geometry marker for a store location.
///
/// Only single points are supported, so a location always carries `"Point"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeoKind {
    #[default]
    Point,
}

impl GeoKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Point => "Point",
        }
    }
}

impl fmt::Display for GeoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GeoKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Point" => Ok(Self::Point),
            other => Err(format!("unsupported geometry type: {other}")),
        }
    }
}

/// A longitude/latitude pair, serialized as `[lng, lat]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Coordinates {
    pub lng: f64,
    pub lat: f64,
}

impl Coordinates {
    #[must_use]
    pub const fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }

    /// Whether both values are finite and inside WGS84 bounds.
    #[must_use]
    pub fn in_bounds(&self) -> bool {
        self.lng.is_finite()
            && self.lat.is_finite()
            && (-180.0..=180.0).contains(&self.lng)
            && (-90.0..=90.0).contains(&self.lat)
    }
}

impl From<[f64; 2]> for Coordinates {
    fn from([lng, lat]: [f64; 2]) -> Self {
        Self { lng, lat }
    }
}

impl From<Coordinates> for [f64; 2] {
    fn from(c: Coordinates) -> Self {
        [c.lng, c.lat]
    }
}

/// Where a store is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(rename = "type")]
    pub kind: GeoKind,
    pub coordinates: Coordinates,
    pub address: Option<String>,
}

impl Location {
    /// Build a point location; the only way locations are constructed.
    #[must_use]
    pub const fn point(coordinates: Coordinates, address: Option<String>) -> Self {
        Self {
            kind: GeoKind::Point,
            coordinates,
            address,
        }
    }
}

/// A store listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Store {
    pub id: StoreId,
    pub name: String,
    pub slug: Slug,
    pub description: String,
    pub tags: Vec<String>,
    pub location: Option<Location>,
    pub photo: Option<String>,
    pub author: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl Store {
    /// Whether `user` may edit this store. Stores without an author are open to
    /// any logged-in user.
    #[must_use]
    pub fn is_editable_by(&self, user: UserId) -> bool {
        self.author.is_none_or(|author| author == user)
    }
}

/// Validated data for inserting a store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewStore {
    pub name: String,
    pub slug: Slug,
    pub description: String,
    pub tags: Vec<String>,
    pub location: Option<Location>,
    pub photo: Option<String>,
    pub author: Option<UserId>,
}

/// Validated partial update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreUpdate {
    pub name: Option<String>,
    pub slug: Option<Slug>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub location: Option<Location>,
    pub photo: Option<String>,
}

impl StoreUpdate {
    /// Apply the update to an in-memory store.
    pub fn apply_to(&self, store: &mut Store) {
        if let Some(name) = &self.name {
            store.name.clone_from(name);
        }
        if let Some(slug) = &self.slug {
            store.slug = slug.clone();
        }
        if let Some(description) = &self.description {
            store.description.clone_from(description);
        }
        if let Some(tags) = &self.tags {
            store.tags.clone_from(tags);
        }
        if let Some(location) = &self.location {
            store.location = Some(location.clone());
        }
        if let Some(photo) = &self.photo {
            store.photo = Some(photo.clone());
        }
    }
}

/// A tag in use and how many stores carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub tag: String,
    pub count: i64,
}
