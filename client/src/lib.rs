//! Client-side core for the nube apps: session state, credential
//! operations, and notification token sync.
//!
//! ARCHITECTURE
//! ============
//! The authentication backend is reached through two injected contracts:
//! [`identity::IdentityProvider`] (sign-in, sign-up, social sign-in,
//! account linking, the identity change stream) and
//! `nube_core::store::DocumentStore` (user records and notification
//! profiles). [`session::SessionStore`] derives the in-memory session from
//! the identity change stream; [`credentials::CredentialService`] wraps the
//! provider calls and maps provider rejection codes to fixed user-facing
//! messages; [`sync::TokenSync`] registers freshly issued device tokens
//! against the persisted profile once both halves of the (token, identity)
//! pair are available.
//!
//! Concrete handles are constructed at the composition root — see
//! [`firebase`] for the production adapters — and passed down as
//! `Arc<dyn Trait>`. Nothing in this crate owns ambient global state.

pub mod credentials;
pub mod firebase;
pub mod identity;
pub mod messaging;
pub mod session;
pub mod sync;
pub mod user;

#[cfg(test)]
pub(crate) mod fakes;
