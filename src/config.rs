use std::env;

/// Runtime configuration for the monitoring engine, loaded from the
/// environment (a `.env` file is honored by the binary before this runs).
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub smtp: Option<SmtpConfig>,
    pub twilio: Option<TwilioConfig>,
}

/// SMTP settings for the email alert channel.
#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
    pub recipients: Vec<String>,
}

/// Twilio credentials for the SMS alert channel.
#[derive(Clone, Debug)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
    pub admin_number: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let database_url =
            env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set".to_string())?;

        let smtp = load_smtp_config()?;
        let twilio = load_twilio_config()?;

        Ok(Config {
            database_url,
            smtp,
            twilio,
        })
    }
}

/// Reads the SMTP channel block. Returns `Ok(None)` when none of the SMTP
/// variables are present; a partially configured block is a startup error.
fn load_smtp_config() -> Result<Option<SmtpConfig>, String> {
    let vars = [
        "SMTP_HOST",
        "SMTP_PORT",
        "SMTP_USERNAME",
        "SMTP_PASSWORD",
        "ALERT_FROM_EMAIL",
        "ALERT_RECIPIENTS",
    ];
    if vars.iter().all(|v| env::var(v).is_err()) {
        return Ok(None);
    }

    let host = require_var("SMTP_HOST")?;
    let port = require_var("SMTP_PORT")?
        .parse::<u16>()
        .map_err(|_| "SMTP_PORT must be a valid port number".to_string())?;
    let username = require_var("SMTP_USERNAME")?;
    let password = require_var("SMTP_PASSWORD")?;
    let from_address = require_var("ALERT_FROM_EMAIL")?;
    let recipients = parse_recipients(&require_var("ALERT_RECIPIENTS")?);
    if recipients.is_empty() {
        return Err("ALERT_RECIPIENTS must contain at least one address".to_string());
    }

    Ok(Some(SmtpConfig {
        host,
        port,
        username,
        password,
        from_address,
        recipients,
    }))
}

/// Reads the Twilio channel block, with the same all-or-nothing rule as SMTP.
fn load_twilio_config() -> Result<Option<TwilioConfig>, String> {
    let vars = [
        "TWILIO_ACCOUNT_SID",
        "TWILIO_AUTH_TOKEN",
        "TWILIO_FROM_NUMBER",
        "ADMIN_PHONE_NUMBER",
    ];
    if vars.iter().all(|v| env::var(v).is_err()) {
        return Ok(None);
    }

    Ok(Some(TwilioConfig {
        account_sid: require_var("TWILIO_ACCOUNT_SID")?,
        auth_token: require_var("TWILIO_AUTH_TOKEN")?,
        from_number: require_var("TWILIO_FROM_NUMBER")?,
        admin_number: require_var("ADMIN_PHONE_NUMBER")?,
    }))
}

fn require_var(name: &str) -> Result<String, String> {
    env::var(name).map_err(|_| format!("{name} must be set"))
}

/// Splits a comma-separated recipient list, dropping empty entries.
pub fn parse_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
