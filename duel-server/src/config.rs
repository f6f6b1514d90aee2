use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub auth_token_secret: String,
    pub auth_token_ttl_seconds: u64,
    pub auth_dev_mode: bool,
    pub state_store_url: String,
    pub words_directory: String,
    pub matchmaking_wait_budget_ms: u64,
    pub initial_band: i32,
    pub max_band: i32,
    pub disconnect_grace_ms: u64,
    pub match_ttl_ms: u64,
}

impl Config {
    pub fn new() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .expect("Invalid SERVER_PORT"),
            auth_token_secret: env::var("AUTH_TOKEN_SECRET")
                .unwrap_or_else(|_| "dev-secret-change-me".to_string()),
            auth_token_ttl_seconds: env::var("AUTH_TOKEN_TTL")
                .unwrap_or_else(|_| "86400".to_string())
                .parse()
                .expect("Invalid AUTH_TOKEN_TTL"),
            auth_dev_mode: env::var("AUTH_DEV_MODE").unwrap_or_else(|_| "false".to_string())
                == "true",
            state_store_url: env::var("STATE_STORE_URL")
                .unwrap_or_else(|_| "memory:".to_string()),
            words_directory: env::var("WORDS_DIRECTORY").unwrap_or_else(|_| "./data".to_string()),
            matchmaking_wait_budget_ms: env::var("MATCHMAKING_WAIT_BUDGET_MS")
                .unwrap_or_else(|_| "15000".to_string())
                .parse()
                .expect("Invalid MATCHMAKING_WAIT_BUDGET_MS"),
            initial_band: env::var("INITIAL_BAND")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .expect("Invalid INITIAL_BAND"),
            max_band: env::var("MAX_BAND")
                .unwrap_or_else(|_| "400".to_string())
                .parse()
                .expect("Invalid MAX_BAND"),
            disconnect_grace_ms: env::var("DISCONNECT_GRACE_MS")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()
                .expect("Invalid DISCONNECT_GRACE_MS"),
            match_ttl_ms: env::var("MATCH_TTL_MS")
                .unwrap_or_else(|_| "3600000".to_string())
                .parse()
                .expect("Invalid MATCH_TTL_MS"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
