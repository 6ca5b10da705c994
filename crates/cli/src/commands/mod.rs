//! CLI command implementations.

pub mod migrate;
pub mod user;

/// Read the storefront database URL, loading `.env` first.
fn database_url() -> Result<String, std::env::VarError> {
    dotenvy::dotenv().ok();
    std::env::var("STOREFRONT_DATABASE_URL")
}
