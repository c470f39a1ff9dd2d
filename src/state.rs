use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::auth::token::JwtKeys;
use crate::config::Config;
use crate::ratelimit::RateLimiters;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub jwt: Arc<JwtKeys>,
    pub limiters: Arc<RateLimiters>,
}

impl AppState {
    pub fn new(db: DbPool, config: Config) -> Self {
        let jwt = Arc::new(JwtKeys::from_config(&config.auth));
        let limiters = Arc::new(RateLimiters::new(&config.rate_limit));
        Self {
            db,
            config,
            jwt,
            limiters,
        }
    }
}
