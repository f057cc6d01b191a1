use tokio_postgres::{Config, NoTls};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};

use crate::config;

pub fn from_config(config: &config::Config) -> Result<Pool, deadpool_postgres::BuildError> {
    let db = &config.settings.db;
    let mut pg_config = Config::new();

    pg_config.user(db.user.as_str());

    if let Some(password) = &db.password {
        pg_config.password(password.as_str());
    }

    pg_config.host(db.host.as_str());
    pg_config.port(db.port);
    pg_config.dbname(db.dbname.as_str());
    pg_config.application_name("mfgsite");

    let manager_config = ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    };

    let manager = Manager::from_config(pg_config, NoTls, manager_config);

    tracing::debug!(
        "creating database pool. {}@{}:{}/{} size: {}",
        db.user,
        db.host,
        db.port,
        db.dbname,
        db.pool_size
    );

    Pool::builder(manager)
        .max_size(db.pool_size)
        .build()
}
