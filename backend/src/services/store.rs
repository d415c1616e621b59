//! Postgres access shared by the stock ledger and the recipe resolver

use sqlx::PgConnection;

/// Ledger and recipe access over one borrowed connection.
///
/// Services build a `PgStore` over an open transaction (`&mut *tx`) so every
/// ledger write made through it commits or rolls back with that transaction.
pub struct PgStore<'c> {
    pub(crate) conn: &'c mut PgConnection,
}

impl<'c> PgStore<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }
}
