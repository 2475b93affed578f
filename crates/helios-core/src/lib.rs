//! Pure simulation engine for the Helios world core.
//!
//! Everything in this crate is a pure function over values: the economic
//! drift model, the fuel-budget pathfinder, the combat resolver, and the
//! action validators. No storage, no async, no wall clock. The API crate
//! composes these into the tick pipeline and the request handlers.

pub mod catalog;
pub mod combat;
pub mod economy;
pub mod pathfind;
pub mod rng;
pub mod validate;
