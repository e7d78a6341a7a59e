#![forbid(unsafe_code)]

mod derive;
mod entry;
mod store;
mod timer;

pub use store::ExpiringMap;
pub use timer::{Timeout, Ttl};
