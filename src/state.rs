use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::config::AppConfig;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
}
