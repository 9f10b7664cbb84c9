use crate::config::{config_model::JwtSecret, stage::Stage};
use anyhow::{Ok, Result};

use super::config_model::DotEnvyConfig;

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let server = super::config_model::Server {
        port: std::env::var("SERVER_PORT")
            .expect("SERVER_PORT is invalid")
            .parse()?,
        body_limit: std::env::var("SERVER_BODY_LIMIT")
            .expect("SERVER_BODY_LIMIT is invalid")
            .parse()?,
        timeout: std::env::var("SERVER_TIMEOUT")
            .expect("SERVER_TIMEOUT is invalid")
            .parse()?,
    };

    let database = super::config_model::Database {
        url: std::env::var("DATABASE_URL").expect("DATABASE_URL is invalid"),
    };

    let webhook_secret = std::env::var("STRIPE_WEBHOOK_SECRET")
        .ok()
        .filter(|secret| !secret.is_empty());
    if get_stage() == Stage::Production && webhook_secret.is_none() {
        anyhow::bail!("STRIPE_WEBHOOK_SECRET is required in Production");
    }

    let stripe = super::config_model::Stripe {
        secret_key: std::env::var("STRIPE_SECRET_KEY").expect("STRIPE_SECRET_KEY is invalid"),
        webhook_secret,
        price_id_monthly: std::env::var("STRIPE_PRICE_ID_MONTHLY")
            .expect("STRIPE_PRICE_ID_MONTHLY is invalid"),
        price_id_yearly: std::env::var("STRIPE_PRICE_ID_YEARLY")
            .expect("STRIPE_PRICE_ID_YEARLY is invalid"),
        app_url: std::env::var("APP_URL").expect("APP_URL is invalid"),
    };

    let access_policy = super::config_model::AccessPolicy {
        free_trial_days: std::env::var("FREE_TRIAL_DAYS")
            .unwrap_or_else(|_| "60".to_string())
            .parse()?,
        free_max_transactions: std::env::var("FREE_MAX_TRANSACTIONS")
            .unwrap_or_else(|_| "50".to_string())
            .parse()?,
    };

    Ok(DotEnvyConfig {
        server,
        database,
        stripe,
        access_policy,
    })
}

pub fn get_stage() -> Stage {
    dotenvy::dotenv().ok();

    let stage_str = std::env::var("STAGE").unwrap_or("".to_string());
    Stage::try_from(&stage_str).unwrap_or_default()
}

pub fn get_jwt_secret() -> Result<JwtSecret> {
    dotenvy::dotenv().ok();

    Ok(JwtSecret {
        secret: std::env::var("JWT_SECRET").expect("JWT_SECRET is invalid"),
        expiry_days: std::env::var("JWT_EXPIRY_DAYS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()?,
    })
}
