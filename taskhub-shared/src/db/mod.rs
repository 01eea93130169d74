/// PostgreSQL plumbing for `PgStore`: the connection pool and embedded
/// migrations. Queries live with the models.

pub mod migrations;
pub mod pool;
