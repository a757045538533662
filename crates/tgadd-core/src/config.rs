use std::{env, fs, num::NonZeroUsize, path::Path, time::Duration};

use crate::{
    engine::{
        DEFAULT_CHUNK_DELAY, DEFAULT_CHUNK_SIZE, DEFAULT_FORWARD_LIMIT, DEFAULT_MAX_RETRIES,
        DEFAULT_REQUEST_DELAY,
    },
    errors::Error,
    Result,
};

pub const DEFAULT_BRIDGE_CMD: &str = "tgadd-mtproto-bridge";
pub const DEFAULT_SESSION_NAME: &str = "telegram";
pub const DEFAULT_BRIDGE_TIMEOUT: Duration = Duration::from_secs(120);

/// Typed configuration for tgadd.
#[derive(Clone, Debug)]
pub struct Config {
    // Account
    pub api_id: String,
    pub api_hash: String,
    pub phone_number: String,
    pub session_name: String,

    // Platform bridge
    pub bridge_cmd: String,
    pub bridge_args: Vec<String>,
    pub bridge_timeout: Duration,

    // Pacing
    pub chunk_size: NonZeroUsize,
    pub chunk_delay: Duration,
    pub request_delay: Duration,
    pub max_retries: u32,
    pub forward_limit: u32,
}

impl Config {
    /// Load from the process environment, after merging `.env` if present.
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).and_then(non_empty);

        let required = |key: &str| {
            get(key).ok_or_else(|| Error::Config(format!("{key} environment variable is required")))
        };
        let api_id = required("TELEGRAM_API_ID")?;
        let api_hash = required("TELEGRAM_API_HASH")?;
        let phone_number = required("TELEGRAM_PHONE_NUMBER")?;

        if api_id.trim().parse::<i64>().is_err() {
            return Err(Error::Config(format!(
                "TELEGRAM_API_ID must be numeric, got {api_id:?}"
            )));
        }

        let session_name =
            get("TELEGRAM_SESSION_NAME").unwrap_or_else(|| DEFAULT_SESSION_NAME.to_string());
        let bridge_cmd = get("TGADD_BRIDGE_CMD").unwrap_or_else(|| DEFAULT_BRIDGE_CMD.to_string());
        let bridge_args = parse_csv(get("TGADD_BRIDGE_ARGS"));
        let bridge_timeout = match parse_num::<u64>(&get, "TGADD_BRIDGE_TIMEOUT")? {
            None => DEFAULT_BRIDGE_TIMEOUT,
            Some(0) => {
                return Err(Error::Config(
                    "TGADD_BRIDGE_TIMEOUT must be at least 1".to_string(),
                ))
            }
            Some(secs) => Duration::from_secs(secs),
        };

        let chunk_size = parse_num::<usize>(&get, "TELEGRAM_CHUNK_SIZE")?
            .unwrap_or(DEFAULT_CHUNK_SIZE);
        let chunk_size = NonZeroUsize::new(chunk_size)
            .ok_or_else(|| Error::Config("TELEGRAM_CHUNK_SIZE must be at least 1".to_string()))?;

        let chunk_delay = parse_num::<u64>(&get, "TELEGRAM_CHUNK_DELAY")?
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_CHUNK_DELAY);
        let request_delay = parse_num::<u64>(&get, "TELEGRAM_REQUEST_DELAY")?
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REQUEST_DELAY);
        let max_retries =
            parse_num::<u32>(&get, "TELEGRAM_MAX_RETRIES")?.unwrap_or(DEFAULT_MAX_RETRIES);
        let forward_limit =
            parse_num::<u32>(&get, "TELEGRAM_FORWARD_LIMIT")?.unwrap_or(DEFAULT_FORWARD_LIMIT);

        Ok(Self {
            api_id: api_id.trim().to_string(),
            api_hash,
            phone_number,
            session_name,
            bridge_cmd,
            bridge_args,
            bridge_timeout,
            chunk_size,
            chunk_delay,
            request_delay,
            max_retries,
            forward_limit,
        })
    }

    /// Environment handed to the bridge process.
    pub fn bridge_env(&self) -> Vec<(String, String)> {
        vec![
            ("TELEGRAM_API_ID".to_string(), self.api_id.clone()),
            ("TELEGRAM_API_HASH".to_string(), self.api_hash.clone()),
            ("TELEGRAM_PHONE_NUMBER".to_string(), self.phone_number.clone()),
            ("TELEGRAM_SESSION_NAME".to_string(), self.session_name.clone()),
        ]
    }
}

fn parse_num<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    let Some(raw) = get(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| Error::Config(format!("{key} must be a non-negative integer, got {raw:?}")))
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn parse_csv(v: Option<String>) -> Vec<String> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    const ACCOUNT: [(&str, &str); 3] = [
        ("TELEGRAM_API_ID", "123456"),
        ("TELEGRAM_API_HASH", "abcdef"),
        ("TELEGRAM_PHONE_NUMBER", "+254700000000"),
    ];

    #[test]
    fn defaults_apply_when_only_account_is_set() {
        let cfg = Config::from_lookup(lookup(&ACCOUNT)).unwrap();
        assert_eq!(cfg.chunk_size.get(), 10);
        assert_eq!(cfg.chunk_delay, Duration::from_secs(60));
        assert_eq!(cfg.request_delay, Duration::from_secs(3));
        assert_eq!(cfg.max_retries, 5);
        assert_eq!(cfg.forward_limit, 50);
        assert_eq!(cfg.session_name, "telegram");
        assert_eq!(cfg.bridge_cmd, DEFAULT_BRIDGE_CMD);
        assert!(cfg.bridge_args.is_empty());
        assert_eq!(cfg.bridge_timeout, DEFAULT_BRIDGE_TIMEOUT);
    }

    #[test]
    fn overrides_are_parsed() {
        let mut pairs = ACCOUNT.to_vec();
        pairs.extend([
            ("TELEGRAM_CHUNK_SIZE", "25"),
            ("TELEGRAM_CHUNK_DELAY", " 120 "),
            ("TELEGRAM_REQUEST_DELAY", "0"),
            ("TELEGRAM_MAX_RETRIES", "2"),
            ("TGADD_BRIDGE_CMD", "python3"),
            ("TGADD_BRIDGE_ARGS", "bridge.py, --verbose ,"),
            ("TGADD_BRIDGE_TIMEOUT", "30"),
        ]);
        let cfg = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(cfg.chunk_size.get(), 25);
        assert_eq!(cfg.chunk_delay, Duration::from_secs(120));
        assert_eq!(cfg.request_delay, Duration::ZERO);
        assert_eq!(cfg.max_retries, 2);
        assert_eq!(cfg.bridge_cmd, "python3");
        assert_eq!(cfg.bridge_args, vec!["bridge.py", "--verbose"]);
        assert_eq!(cfg.bridge_timeout, Duration::from_secs(30));
    }

    #[test]
    fn missing_account_is_a_config_error() {
        let err = Config::from_lookup(lookup(&ACCOUNT[..2])).unwrap_err();
        assert!(err.to_string().contains("TELEGRAM_PHONE_NUMBER"));

        let mut blank = ACCOUNT.to_vec();
        blank[1] = ("TELEGRAM_API_HASH", "  ");
        assert!(matches!(
            Config::from_lookup(lookup(&blank)),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn zero_chunk_size_and_garbage_numbers_are_rejected() {
        let mut zero = ACCOUNT.to_vec();
        zero.push(("TELEGRAM_CHUNK_SIZE", "0"));
        assert!(Config::from_lookup(lookup(&zero)).is_err());

        let mut bad = ACCOUNT.to_vec();
        bad.push(("TELEGRAM_REQUEST_DELAY", "soon"));
        let err = Config::from_lookup(lookup(&bad)).unwrap_err();
        assert!(err.to_string().contains("TELEGRAM_REQUEST_DELAY"));

        let mut timeout = ACCOUNT.to_vec();
        timeout.push(("TGADD_BRIDGE_TIMEOUT", "0"));
        assert!(matches!(
            Config::from_lookup(lookup(&timeout)),
            Err(Error::Config(_))
        ));

        let mut api = ACCOUNT.to_vec();
        api[0] = ("TELEGRAM_API_ID", "abc");
        assert!(Config::from_lookup(lookup(&api)).is_err());
    }

    #[test]
    fn dotenv_parsing_strips_quotes_and_comments() {
        let parsed = parse_dotenv(
            "# account\nTELEGRAM_API_ID=42\nexport TELEGRAM_API_HASH=\"h a s h\"\n\nBROKEN\n =x\nTELEGRAM_SESSION_NAME='main'\n",
        );
        assert_eq!(
            parsed,
            vec![
                ("TELEGRAM_API_ID".to_string(), "42".to_string()),
                ("TELEGRAM_API_HASH".to_string(), "h a s h".to_string()),
                ("TELEGRAM_SESSION_NAME".to_string(), "main".to_string()),
            ]
        );
    }

    #[test]
    fn bridge_env_carries_account() {
        let cfg = Config::from_lookup(lookup(&ACCOUNT)).unwrap();
        let env = cfg.bridge_env();
        assert!(env.contains(&("TELEGRAM_API_ID".to_string(), "123456".to_string())));
        assert!(env.contains(&("TELEGRAM_SESSION_NAME".to_string(), "telegram".to_string())));
    }
}
