#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub server: Server,
    pub database: Database,
    pub stripe: Stripe,
    pub access_policy: AccessPolicy,
}

#[derive(Debug, Clone)]
pub struct Server {
    pub port: u16,
    pub body_limit: u64,
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct Stripe {
    pub secret_key: String,
    /// Optional outside Production; webhook payloads are accepted unverified
    /// when unset.
    pub webhook_secret: Option<String>,
    pub price_id_monthly: String,
    pub price_id_yearly: String,
    /// Frontend base URL used for checkout success/cancel and portal returns.
    pub app_url: String,
}

#[derive(Debug, Clone)]
pub struct AccessPolicy {
    pub free_trial_days: i64,
    pub free_max_transactions: i64,
}

#[derive(Debug, Clone)]
pub struct JwtSecret {
    pub secret: String,
    pub expiry_days: i64,
}
