use std::path::PathBuf;
use std::collections::HashMap;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Db {
    pub user: Option<String>,
    pub password: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub dbname: Option<String>,
    pub pool_size: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct Session {
    pub secure: Option<bool>,
    pub domain: Option<String>,
    /// seconds
    pub duration: Option<u64>,
    /// seconds
    pub refresh: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct Sec {
    pub session: Option<Session>,
}

#[derive(Debug, Deserialize)]
pub struct Gate {
    pub protected: Option<Vec<String>>,
    pub admin_only: Option<Vec<String>>,
    pub auth: Option<Vec<String>>,
    pub reset_confirm: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Listener {
    pub addr: String,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub data: Option<PathBuf>,
    pub master_key: Option<String>,

    pub listeners: Option<HashMap<String, Listener>>,

    pub sec: Option<Sec>,
    pub gate: Option<Gate>,
    pub db: Option<Db>,
}
