//! Domain layer types and invariants.

pub mod block;
pub mod carousel;
pub mod locale;
pub mod menu;
pub mod thumbnail;
pub mod visitor;
