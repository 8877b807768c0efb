pub mod classifier;
pub mod screen_model;
pub mod signature;

pub use classifier::discover;
pub use screen_model::{ElementDescriptor, ElementRole, RawElement};
pub use signature::{ScreenSignature, compute_signature};
