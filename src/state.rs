use std::sync::Arc;

use deadpool_postgres::Pool;
use mfgsite_lib::gate::Gate;

use crate::error;
use crate::config;
use crate::notify;
use crate::sec;
use crate::sec::authn::provider::{PgSessions, PgAccounts};

pub mod db;

pub type RequestGate = Gate<PgSessions, PgAccounts>;

pub struct Shared {
    pool: Pool,
    sec: sec::state::Sec,
    gate: Arc<RequestGate>,
    accounts: notify::Channel<notify::AccountEvent>,
}

pub type ArcShared = Arc<Shared>;

impl Shared {
    pub fn from_config(config: &config::Config) -> error::Result<Shared> {
        tracing::debug!("creating Shared state");

        let pool = db::from_config(config)?;
        let sec = sec::state::Sec::from_config(config)?;

        let gate = Arc::new(Gate::new(
            config.settings.gate.clone(),
            PgSessions::new(pool.clone(), sec.session_info().clone()),
            PgAccounts::new(pool.clone()),
        ));

        Ok(Shared {
            pool,
            sec,
            gate,
            accounts: notify::Channel::new(64),
        })
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn sec(&self) -> &sec::state::Sec {
        &self.sec
    }

    pub fn gate(&self) -> &Arc<RequestGate> {
        &self.gate
    }

    /// approval changes made through the admin api
    pub fn account_events(&self) -> &notify::Channel<notify::AccountEvent> {
        &self.accounts
    }
}

