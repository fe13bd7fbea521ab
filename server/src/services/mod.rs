//! Domain services used by the HTTP routes.
//!
//! Route handlers stay focused on request validation and status mapping;
//! the messaging service owns the admin messaging API surface.

pub mod fcm;
