//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Registration and password login
//! - `password_reset` - Reset token issue, validation and consumption
//! - `stores` - Store listings, slugs and tag browsing
//! - `email` - Transactional email (SMTP or log)
//! - `photos` - Upload resizing and storage
//! - `clock` - Time source for token expiry
//!
//! Services hold `Arc` handles to repositories and never call each other.

pub mod auth;
pub mod clock;
pub mod email;
pub mod password_reset;
pub mod photos;
pub mod stores;
