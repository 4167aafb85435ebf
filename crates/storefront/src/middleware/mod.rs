//! HTTP middleware and extractors for the storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, transactions)
//! 2. `TraceLayer` (request spans)
//! 3. Request ID (propagate or generate `x-request-id`)
//! 4. Session layer (tower-sessions)
//!
//! Authentication and per-page context are extractors rather than layers:
//! see [`RequireAuth`] and [`Page`].

pub mod auth;
pub mod flash;
pub mod page;
pub mod request_id;
pub mod session;

pub use auth::{
    RequireAuth, clear_current_user, current_user, is_authenticated, set_current_user,
};
pub use flash::{push_flash, take_flashes};
pub use page::Page;
pub use request_id::{RequestId, request_id_middleware};
pub use session::{create_session_layer, postgres_session_store};
