// Repository layer: one file per domain, each adding methods to `ContentRepository`.
//
// Ownership is enforced here and only here: every read or delete takes the
// caller's owner id and carries it into the SQL predicate.

use sqlx::sqlite::SqlitePool;

mod content;

#[cfg(test)]
pub(crate) mod test_helpers;

#[derive(Clone)]
pub struct ContentRepository {
    pub(crate) pool: SqlitePool,
}

impl ContentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}
