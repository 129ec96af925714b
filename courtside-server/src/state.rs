use std::fs;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use sqlx::pool::PoolOptions;
use sqlx::MySqlPool;
use tokio::sync::watch;

use crate::auth::Authorization;
use crate::config::Config;
use crate::playoffs::{BracketLocks, Playoffs};
use crate::store::Store;
use crate::Error;

#[derive(Clone, Debug)]
pub struct State(Arc<StateInner>);

impl State {
    pub fn new(config: Config, shutdown_rx: watch::Receiver<bool>) -> Result<Self, Error> {
        let pool: MySqlPool = PoolOptions::new()
            .max_connections(8)
            .max_lifetime(Duration::new(3600, 0))
            .idle_timeout(Duration::new(60, 0))
            .connect_lazy(&config.database.connect_string())?;

        let store = Store {
            pool,
            table_prefix: config.database.prefix.clone(),
        };

        let secret = fs::read(&config.authorization.secret)?;
        let auth = Authorization::new(config.authorization.alg, &secret);

        Ok(Self(Arc::new(StateInner {
            store,
            config,
            auth,
            bracket_locks: BracketLocks::default(),
            shutdown_rx,
        })))
    }

    /// Returns the playoff service, the entry point for all bracket
    /// operations.
    #[inline]
    pub fn playoffs(&self) -> Playoffs<'_> {
        Playoffs::new(self)
    }
}

impl Deref for State {
    type Target = StateInner;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Debug)]
pub struct StateInner {
    pub store: Store,
    pub config: Config,
    pub auth: Authorization,
    pub bracket_locks: BracketLocks,
    pub shutdown_rx: watch::Receiver<bool>,
}
