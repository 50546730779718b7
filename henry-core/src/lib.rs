//! Henry Core - Identity Types and View-As Resolution
//!
//! Pure data structures for principals and request identity, plus the
//! view-as decision procedure that turns the two identity headers into an
//! effective identity. This crate performs no I/O of its own: principal
//! lookups go through the [`PrincipalDirectory`] trait.
//!
//! # Trust boundary
//!
//! The caller identity header is assumed to have been authenticated by an
//! upstream layer (gateway, reverse proxy or session verifier). Nothing in
//! this crate verifies it cryptographically.

pub mod directory;
pub mod error;
pub mod identity;
pub mod resolve;

pub use directory::PrincipalDirectory;
pub use error::{DirectoryError, IdentityRejection};
pub use identity::{
    parse_principal_id, IdentityContext, Principal, PrincipalId, Role, Timestamp, ViewAsAudit,
};
pub use resolve::{resolve_identity, CALLER_HEADER, VIEW_AS_HEADER};
