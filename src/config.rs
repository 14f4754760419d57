//! # config — Configuration from Environment Variables
//!
//! Every tunable has a default so the server runs with an empty environment.
//! `.env` is loaded by `main` through `dotenvy` before [`Config::from_env`].
//!
//! | Variable                  | Default                       |
//! |---------------------------|-------------------------------|
//! | `BIND_ADDR`               | `0.0.0.0:3000`                |
//! | `EXCHANGE`                | `binance`                     |
//! | `SYMBOLS`                 | `BTC:95000,ETH:3500,SOL:180`  |
//! | `TICK_INTERVAL_MS`        | `1000`                        |
//! | `PORTFOLIO_INTERVAL_MS`   | `1000`                        |
//! | `HISTORY_CAPACITY`        | `100`                         |
//! | `ANALYSIS_WINDOW`         | `30`                          |
//! | `PATTERN_THRESHOLD`       | `0.7`                         |
//! | `ANNUALIZATION_DAYS`      | `252`                         |
//! | `VAR_TAIL`                | `0.05`                        |
//! | `RECOMMENDATION_TTL_SECS` | `10`                          |
//! | `ORACLE_TIMEOUT_SECS`     | `5`                           |
//! | `ORACLE_WAIT_MS`          | `250`                         |
//! | `SEND_TIMEOUT_MS`         | `100`                         |
//! | `SUBSCRIBER_BUFFER`       | `64`                          |
//! | `WALK_STEP`               | `0.001`                       |
//! | `AI_PROVIDER`             | `none` (`claude` / `openai`)  |
//! | `AI_API_KEY`              | required unless provider=none |
//! | `DATABASE_URL`            | unset (postgres feature only) |

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context};

// ─── AI Provider ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiProvider {
    /// No remote model — the local heuristic oracle answers.
    None,
    Claude,
    OpenAi,
}

impl std::fmt::Display for AiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AiProvider::None   => write!(f, "heuristic"),
            AiProvider::Claude => write!(f, "Claude"),
            AiProvider::OpenAi => write!(f, "OpenAI"),
        }
    }
}

impl FromStr for AiProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" => Ok(AiProvider::None),
            "claude"    => Ok(AiProvider::Claude),
            "openai"    => Ok(AiProvider::OpenAi),
            other => bail!("Unknown AI_PROVIDER: '{other}'. Use 'none', 'claude' or 'openai'"),
        }
    }
}

// ─── Sections ─────────────────────────────────────────────────────────────────

/// A tracked symbol and the quote its random walk starts from.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolSeed {
    pub symbol:     String,
    pub price:      f64,
    pub volume_24h: f64,
}

#[derive(Debug, Clone)]
pub struct AnalyticsConfig {
    /// Prices required before patterns / volatility are computed.
    pub window:             usize,
    /// Minimum |correlation| for a pattern hit.
    pub pattern_threshold:  f64,
    /// Trading days per year used to annualise volatility.
    pub annualization_days: f64,
    /// Tail fraction used to pick the VaR index.
    pub var_tail:           f64,
}

#[derive(Debug, Clone)]
pub struct AdvisoryConfig {
    pub provider:       AiProvider,
    pub api_key:        Option<String>,
    /// How long a recommendation (or fallback) stays fresh.
    pub ttl:            Duration,
    /// Hard ceiling on a single oracle call.
    pub oracle_timeout: Duration,
    /// How long the market loop waits on a refresh before using what it has.
    pub wait_budget:    Duration,
}

#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    pub send_timeout:      Duration,
    pub subscriber_buffer: usize,
}

// ─── Config ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr:          SocketAddr,
    /// Exchange label stamped on every broadcast message.
    pub exchange:           String,
    pub symbols:            Vec<SymbolSeed>,
    pub tick_interval:      Duration,
    pub portfolio_interval: Duration,
    pub history_capacity:   usize,
    /// Max relative move per tick of the random walk.
    pub walk_step:          f64,
    pub analytics:          AnalyticsConfig,
    pub advisory:           AdvisoryConfig,
    pub broadcast:          BroadcastConfig,
    pub database_url:       Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let bind_addr = std::env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
            .parse()
            .context("BIND_ADDR must be a socket address")?;

        let symbols = match std::env::var("SYMBOLS") {
            Ok(raw) => parse_symbols(&raw).context("SYMBOLS is malformed")?,
            Err(_)  => defaults.symbols,
        };

        let provider: AiProvider = std::env::var("AI_PROVIDER").unwrap_or_default().parse()?;
        let api_key = std::env::var("AI_API_KEY").ok().filter(|k| !k.trim().is_empty());
        if provider != AiProvider::None && api_key.is_none() {
            bail!("AI_API_KEY environment variable is required when AI_PROVIDER={provider}");
        }

        let history_capacity = env_or("HISTORY_CAPACITY", defaults.history_capacity);
        let window = env_or("ANALYSIS_WINDOW", defaults.analytics.window);
        if window < 5 || window > history_capacity {
            bail!("ANALYSIS_WINDOW must be between 5 and HISTORY_CAPACITY ({history_capacity})");
        }

        Ok(Self {
            bind_addr,
            exchange:           std::env::var("EXCHANGE").unwrap_or(defaults.exchange),
            symbols,
            tick_interval:      Duration::from_millis(env_or("TICK_INTERVAL_MS", 1000)),
            portfolio_interval: Duration::from_millis(env_or("PORTFOLIO_INTERVAL_MS", 1000)),
            history_capacity,
            walk_step:          env_or("WALK_STEP", defaults.walk_step),
            analytics: AnalyticsConfig {
                window,
                pattern_threshold:  env_or("PATTERN_THRESHOLD", defaults.analytics.pattern_threshold),
                annualization_days: env_or("ANNUALIZATION_DAYS", defaults.analytics.annualization_days),
                var_tail:           env_or("VAR_TAIL", defaults.analytics.var_tail),
            },
            advisory: AdvisoryConfig {
                provider,
                api_key,
                ttl:            Duration::from_secs(env_or("RECOMMENDATION_TTL_SECS", 10)),
                oracle_timeout: Duration::from_secs(env_or("ORACLE_TIMEOUT_SECS", 5)),
                wait_budget:    Duration::from_millis(env_or("ORACLE_WAIT_MS", 250)),
            },
            broadcast: BroadcastConfig {
                send_timeout:      Duration::from_millis(env_or("SEND_TIMEOUT_MS", 100)),
                subscriber_buffer: env_or("SUBSCRIBER_BUFFER", defaults.broadcast.subscriber_buffer),
            },
            database_url: std::env::var("DATABASE_URL").ok(),
        })
    }

    pub fn symbol_names(&self) -> Vec<String> {
        self.symbols.iter().map(|s| s.symbol.clone()).collect()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr:          SocketAddr::from(([0, 0, 0, 0], 3000)),
            exchange:           "binance".to_string(),
            symbols:            vec![
                SymbolSeed { symbol: "BTC".into(), price: 95_000.0, volume_24h: 28_000_000_000.0 },
                SymbolSeed { symbol: "ETH".into(), price: 3_500.0,  volume_24h: 15_000_000_000.0 },
                SymbolSeed { symbol: "SOL".into(), price: 180.0,    volume_24h: 3_000_000_000.0 },
            ],
            tick_interval:      Duration::from_secs(1),
            portfolio_interval: Duration::from_secs(1),
            history_capacity:   100,
            walk_step:          0.001,
            analytics: AnalyticsConfig {
                window:             30,
                pattern_threshold:  0.7,
                annualization_days: 252.0,
                var_tail:           0.05,
            },
            advisory: AdvisoryConfig {
                provider:       AiProvider::None,
                api_key:        None,
                ttl:            Duration::from_secs(10),
                oracle_timeout: Duration::from_secs(5),
                wait_budget:    Duration::from_millis(250),
            },
            broadcast: BroadcastConfig {
                send_timeout:      Duration::from_millis(100),
                subscriber_buffer: 64,
            },
            database_url: None,
        }
    }
}

/// `SYMBOL:PRICE[:VOLUME]` entries separated by commas.
pub fn parse_symbols(raw: &str) -> anyhow::Result<Vec<SymbolSeed>> {
    let mut seeds = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let mut parts = entry.split(':');
        let symbol = parts.next().unwrap_or_default().trim().to_uppercase();
        if symbol.is_empty() {
            bail!("empty symbol in '{entry}'");
        }
        let price: f64 = parts
            .next()
            .with_context(|| format!("missing price for {symbol}"))?
            .trim()
            .parse()
            .with_context(|| format!("invalid price for {symbol}"))?;
        if !(price.is_finite() && price > 0.0) {
            bail!("price for {symbol} must be positive");
        }
        let volume_24h = match parts.next() {
            Some(v) => v.trim().parse().with_context(|| format!("invalid volume for {symbol}"))?,
            None    => 0.0,
        };
        if seeds.iter().any(|s: &SymbolSeed| s.symbol == symbol) {
            bail!("duplicate symbol {symbol}");
        }
        seeds.push(SymbolSeed { symbol, price, volume_24h });
    }
    if seeds.is_empty() {
        bail!("no symbols configured");
    }
    Ok(seeds)
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_symbol_list() {
        let seeds = parse_symbols("btc:95000, eth:3500:1000000").unwrap();
        assert_eq!(seeds.len(), 2);
        assert_eq!(seeds[0], SymbolSeed { symbol: "BTC".into(), price: 95000.0, volume_24h: 0.0 });
        assert_eq!(seeds[1].volume_24h, 1_000_000.0);
    }

    #[test]
    fn rejects_bad_symbol_lists() {
        assert!(parse_symbols("").is_err());
        assert!(parse_symbols("BTC").is_err());
        assert!(parse_symbols("BTC:-1").is_err());
        assert!(parse_symbols("BTC:1,BTC:2").is_err());
    }

    #[test]
    fn provider_names() {
        assert_eq!("Claude".parse::<AiProvider>().unwrap(), AiProvider::Claude);
        assert_eq!("".parse::<AiProvider>().unwrap(), AiProvider::None);
        assert!("gemini".parse::<AiProvider>().is_err());
    }
}
