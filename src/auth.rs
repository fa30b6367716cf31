//! Session credential models and the redacting secret wrapper.

pub mod credentials;
pub mod secret;

pub use credentials::*;
pub use secret::*;
