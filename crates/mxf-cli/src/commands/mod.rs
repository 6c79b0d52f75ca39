pub mod channel;
pub mod key;
pub mod setup;
