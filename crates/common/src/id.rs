//! ID generation utilities.

use ulid::Ulid;

/// ID generator for relationship and comment rows.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    _private: (),
}

impl IdGenerator {
    /// Create a new ID generator.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Generate a new lower-case ULID.
    ///
    /// Ids sort by creation time, which the list queries rely on when they
    /// order by id.
    #[must_use]
    pub fn generate(&self) -> String {
        Ulid::new().to_string().to_lowercase()
    }
}
