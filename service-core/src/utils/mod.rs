pub mod signature;

pub use signature::{SignatureError, TimestampSigner};
