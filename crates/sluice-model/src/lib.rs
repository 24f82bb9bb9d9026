//! Data model shared by every sluice crate.
//!
//! Everything here is plain serializable data: no handles, no clients, no closures.
//! A [`DeferredTaskHandle`] written by one process can be read back by another and polled from there.

mod domain;
pub use domain::*;

mod kind;
pub use kind::*;

mod policy;
pub use policy::*;

mod wire;
pub use wire::*;
