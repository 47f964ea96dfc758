//! Service-account credentials, signed assertions, and the self-renewing token manager.

pub mod assertion;
pub mod credential;
pub mod manager;
pub mod secret;
pub mod token;

pub use assertion::*;
pub use credential::*;
pub use manager::*;
pub use secret::*;
pub use token::*;
