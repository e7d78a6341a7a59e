#![forbid(unsafe_code)]

mod error;

pub use error::*;

/// Timeout padrão do shell em ms (0 = sem expiração).
pub const DEFAULT_TIMEOUT_MS: i64 = 0;
pub const DEFAULT_PROMPT: &str = "stormcache> ";
/// Limite de entradas listadas de uma vez pelo shell.
pub const MAX_LISTED_ENTRIES: usize = 1024;
