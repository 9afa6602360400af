use std::net::SocketAddr;
use std::time::Duration;

const DEFAULT_SWEEP_SECS: u64 = 30;
const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_url: String,
    pub http_addr: SocketAddr,
    pub sweep_interval: Duration,
    /// The sweep does not run; reads are still served.
    pub read_only: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let database_url =
            get("DATABASE_URL").ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required"))?;

        let sweep_secs = get("PRINTDESK_SWEEP_INTERVAL_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_SWEEP_SECS)
            .clamp(5, 3600);

        let raw_addr = get("PRINTDESK_HTTP_ADDR").unwrap_or_else(|| DEFAULT_HTTP_ADDR.to_string());
        let http_addr = raw_addr
            .parse::<SocketAddr>()
            .map_err(|e| anyhow::anyhow!("invalid PRINTDESK_HTTP_ADDR {raw_addr:?}: {e}"))?;

        Ok(Self {
            database_url,
            http_addr,
            sweep_interval: Duration::from_secs(sweep_secs),
            read_only: get("PRINTDESK_READ_ONLY").is_some_and(|v| is_truthy(&v)),
        })
    }
}

fn is_truthy(v: &str) -> bool {
    matches!(
        v.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_only_database_url_is_set() {
        let cfg = config(&[("DATABASE_URL", "postgres://localhost/printdesk")]).unwrap();
        assert_eq!(cfg.sweep_interval, Duration::from_secs(30));
        assert_eq!(cfg.http_addr, "0.0.0.0:8080".parse().unwrap());
        assert!(!cfg.read_only);
    }

    #[test]
    fn database_url_is_required() {
        let err = config(&[("DATABASE_URL", "  ")]).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn sweep_interval_is_clamped() {
        let low = config(&[("DATABASE_URL", "x"), ("PRINTDESK_SWEEP_INTERVAL_SECS", "1")]).unwrap();
        assert_eq!(low.sweep_interval, Duration::from_secs(5));

        let high =
            config(&[("DATABASE_URL", "x"), ("PRINTDESK_SWEEP_INTERVAL_SECS", "86400")]).unwrap();
        assert_eq!(high.sweep_interval, Duration::from_secs(3600));

        let junk =
            config(&[("DATABASE_URL", "x"), ("PRINTDESK_SWEEP_INTERVAL_SECS", "soon")]).unwrap();
        assert_eq!(junk.sweep_interval, Duration::from_secs(30));
    }

    #[test]
    fn read_only_accepts_common_spellings() {
        for v in ["1", "true", "YES", " on "] {
            let cfg = config(&[("DATABASE_URL", "x"), ("PRINTDESK_READ_ONLY", v)]).unwrap();
            assert!(cfg.read_only);
        }
        assert!(!config(&[("DATABASE_URL", "x"), ("PRINTDESK_READ_ONLY", "0")]).unwrap().read_only);
    }

    #[test]
    fn bad_http_addr_is_an_error() {
        assert!(config(&[("DATABASE_URL", "x"), ("PRINTDESK_HTTP_ADDR", "nowhere")]).is_err());
    }
}
