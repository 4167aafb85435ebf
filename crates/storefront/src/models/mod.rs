//! Domain models for the storefront.
//!
//! These types represent validated domain objects, separate from the
//! database row types in [`crate::db`].

pub mod flash;
pub mod session;
pub mod store;
pub mod user;

pub use flash::{Flash, FlashKind};
pub use session::{CurrentUser, keys as session_keys};
pub use store::{
    Coordinates, GeoKind, Location, NewStore, Store, StoreUpdate, TagCount,
};
pub use user::{NewUser, User};
