use std::env;
use std::net::SocketAddr;

use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use tracing::warn;

pub const DEFAULT_ANALYSIS_ERROR_MESSAGE: &str =
    "Nepodarilo sa vykonať analýzu. Skontrolujte prosím pripojenie alebo platnosť API kľúča.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyProfile {
    Standard,
    Permissive,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_api_base: String,
    pub gemini_temperature: Option<f32>,
    pub gemini_safety_settings: SafetyProfile,
    pub max_upload_bytes: usize,
    pub copy_ack_millis: u64,
    pub analysis_error_message: String,
}

pub static CONFIG: Lazy<Config> =
    Lazy::new(|| Config::load().expect("Failed to load configuration"));

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_f32_opt(name: &str) -> Option<f32> {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<f32>().ok())
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

pub fn normalize_safety_settings(value: &str) -> SafetyProfile {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return SafetyProfile::Permissive;
    }

    match trimmed.to_lowercase().as_str() {
        "permissive" | "off" | "none" => SafetyProfile::Permissive,
        "standard" => SafetyProfile::Standard,
        _ => {
            warn!(
                "Unknown GEMINI_SAFETY_SETTINGS value '{}'; defaulting to permissive.",
                value
            );
            SafetyProfile::Permissive
        }
    }
}

fn upload_limit_bytes(megabytes: usize) -> usize {
    megabytes.max(1).saturating_mul(1024 * 1024)
}

/// Read ahead of [`CONFIG`] so logging is up before config warnings fire.
pub fn env_log_level() -> String {
    env_string("LOG_LEVEL", "info").to_lowercase()
}

fn normalize_api_base(value: String) -> String {
    value.trim().trim_end_matches('/').to_string()
}

impl Config {
    pub fn load() -> Result<Self> {
        let listen_raw = env_string("LISTEN_ADDR", "127.0.0.1:8080");
        let listen_addr = listen_raw
            .trim()
            .parse::<SocketAddr>()
            .map_err(|err| anyhow!("Invalid LISTEN_ADDR '{}': {}", listen_raw, err))?;

        // API_KEY is what the hosted build injects; GEMINI_API_KEY is the local fallback.
        let gemini_api_key = env_non_empty("API_KEY")
            .or_else(|| env_non_empty("GEMINI_API_KEY"))
            .unwrap_or_default();
        if gemini_api_key.is_empty() {
            warn!("No API_KEY or GEMINI_API_KEY set; analysis requests will fail.");
        }

        Ok(Config {
            listen_addr,
            gemini_api_key,
            gemini_model: env_non_empty("GEMINI_MODEL")
                .unwrap_or_else(|| "gemini-3-pro-preview".to_string()),
            gemini_api_base: normalize_api_base(env_string(
                "GEMINI_API_BASE",
                "https://generativelanguage.googleapis.com/v1beta",
            )),
            gemini_temperature: env_f32_opt("GEMINI_TEMPERATURE"),
            gemini_safety_settings: normalize_safety_settings(&env_string(
                "GEMINI_SAFETY_SETTINGS",
                "permissive",
            )),
            max_upload_bytes: upload_limit_bytes(env_usize("MAX_UPLOAD_MB", 20)),
            copy_ack_millis: env_u64("COPY_ACK_MILLIS", 2000),
            analysis_error_message: env_non_empty("ANALYSIS_ERROR_MESSAGE")
                .unwrap_or_else(|| DEFAULT_ANALYSIS_ERROR_MESSAGE.to_string()),
        })
    }
}
