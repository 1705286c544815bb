use anyhow::Context;
use cvewatch_migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, DatabaseConnection};
use std::ops::{Deref, DerefMut};

#[derive(Clone, Debug)]
pub struct Database {
    pub db: DatabaseConnection,
}

impl Database {
    async fn new(url: String) -> Result<Self, anyhow::Error> {
        let mut opt = ConnectOptions::new(url);
        opt.sqlx_logging_level(log::LevelFilter::Trace);

        let db = sea_orm::Database::connect(opt).await?;

        log::debug!("applying migrations");
        Migrator::up(&db, None).await?;
        log::debug!("applied migrations");

        Ok(Self { db })
    }

    pub async fn with_external_config(
        database: &crate::config::Database,
    ) -> Result<Self, anyhow::Error> {
        let url = format!(
            "postgres://{}:{}@{}:{}/{}",
            database.username, database.password, database.host, database.port, database.name
        );
        log::info!("connect to {url}");

        Self::new(url).await
    }

    /// An in-memory database, migrations applied. The pool is limited to a
    /// single connection so that every statement sees the same database.
    pub async fn for_test() -> Result<Self, anyhow::Error> {
        let mut opt = ConnectOptions::new("sqlite::memory:");
        opt.max_connections(1)
            .sqlx_logging_level(log::LevelFilter::Trace);

        let db = sea_orm::Database::connect(opt).await?;
        Migrator::up(&db, None).await?;

        Ok(Self { db })
    }

    pub async fn close(self) -> anyhow::Result<()> {
        Ok(self.db.close().await?)
    }

    /// Ping the database.
    ///
    /// Intended to be used for health checks.
    pub async fn ping(&self) -> anyhow::Result<()> {
        self.db
            .ping()
            .await
            .context("failed to ping the database")?;
        Ok(())
    }
}

impl Deref for Database {
    type Target = DatabaseConnection;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

impl DerefMut for Database {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.db
    }
}

#[cfg(test)]
mod test {
    use super::Database;
    use test_log::test;

    #[test(tokio::test)]
    async fn test_database() -> Result<(), anyhow::Error> {
        let db = Database::for_test().await?;
        db.ping().await?;
        db.close().await?;

        Ok(())
    }
}
