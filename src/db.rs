use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

pub async fn create_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the data directory exists
    if let Some(parent) = std::path::Path::new(
        database_url
            .trim_start_matches("sqlite://")
            .split('?')
            .next()
            .unwrap_or_default(),
    )
    .parent()
    {
        std::fs::create_dir_all(parent).ok();
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&format!("{}{}", database_url, create_mode_suffix(database_url)))
        .await?;

    Ok(pool)
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

// sqlx refuses to open a missing sqlite file unless `mode=rwc` is requested
fn create_mode_suffix(database_url: &str) -> &'static str {
    if database_url.contains("mode=") || database_url.contains(":memory:") {
        ""
    } else if database_url.contains('?') {
        "&mode=rwc"
    } else {
        "?mode=rwc"
    }
}
