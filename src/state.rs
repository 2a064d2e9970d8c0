use crate::{
    cache::FastPathCache,
    config::AppConfig,
    db::{DbPool, OrmConn},
    realtime::RealtimeHub,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub realtime: RealtimeHub,
    pub cache: FastPathCache,
    pub config: AppConfig,
}
