use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use rust_decimal::Decimal;

/// Application-level constants
pub const APP_NAME: &str = "Clinica";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "clinica=info,clinica_lib=info,tower_http=warn"
}

/// Get the application data directory (~/Clinica/)
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_NAME)
}

/// Default database location inside the data directory
pub fn default_db_path() -> PathBuf {
    app_data_dir().join("clinica.db")
}

pub const DEFAULT_BIND: &str = "127.0.0.1:8787";

/// Name of the catalog procedure whose price is the home-visit surcharge.
pub const SURCHARGE_ITEM_NAME: &str = "toma de muestra";

/// Pricing parameters for lab quotes, injected into the calculator.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteConfig {
    /// Client price multiplier (1.2 = 20% markup).
    pub markup_rate: Decimal,
    /// Surcharge used when the catalog item can't be resolved.
    pub fallback_surcharge: Decimal,
    pub surcharge_item_name: String,
}

impl Default for QuoteConfig {
    fn default() -> Self {
        Self {
            markup_rate: Decimal::new(12, 1),
            fallback_surcharge: Decimal::from(120),
            surcharge_item_name: SURCHARGE_ITEM_NAME.to_string(),
        }
    }
}

/// Optional remote aggregation endpoint (PostgREST-style RPC).
#[derive(Debug, Clone, PartialEq)]
pub struct RpcConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub bind: SocketAddr,
    pub quote: QuoteConfig,
    pub rpc: Option<RpcConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            bind: SocketAddr::from(([127, 0, 0, 1], 8787)),
            quote: QuoteConfig::default(),
            rpc: None,
        }
    }
}

impl AppConfig {
    /// Build from `CLINICA_*` environment variables. Unparseable values
    /// are logged and replaced by defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let db_path = lookup("CLINICA_DB_PATH")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let bind = parse_or("CLINICA_BIND", lookup("CLINICA_BIND"), defaults.bind);

        let quote = QuoteConfig {
            markup_rate: parse_or(
                "CLINICA_MARKUP_RATE",
                lookup("CLINICA_MARKUP_RATE"),
                defaults.quote.markup_rate,
            ),
            fallback_surcharge: parse_or(
                "CLINICA_FALLBACK_SURCHARGE",
                lookup("CLINICA_FALLBACK_SURCHARGE"),
                defaults.quote.fallback_surcharge,
            ),
            surcharge_item_name: lookup("CLINICA_SURCHARGE_ITEM")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.quote.surcharge_item_name),
        };

        let rpc = lookup("CLINICA_RPC_URL")
            .filter(|s| !s.trim().is_empty())
            .map(|base_url| RpcConfig {
                base_url: base_url.trim_end_matches('/').to_string(),
                api_key: lookup("CLINICA_RPC_KEY"),
            });

        Self { db_path, bind, quote, rpc }
    }
}

fn parse_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %value, "Invalid configuration value, using default");
            default
        }),
        None => default,
    }
}
