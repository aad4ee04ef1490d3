//! Composition root: wires config, providers, history and dispatcher.

mod builder;

pub use builder::{Bifrost, BifrostBuilder, Gateway};
