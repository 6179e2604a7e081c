//! Source backed by one key of a remote key/value service.
//!
//! The key's payload is a properties document. Keys may carry an override
//! suffix (`db.host@prod`), which is preferred over the plain key when the
//! suffix is configured. A source that cannot be loaded stays in the chain
//! as an empty source.

use std::cell::OnceCell;
use std::thread::sleep;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use log::{debug, warn};
use url::Url;

use super::{MapSource, NamedValue, VariableSource};
use crate::config::parse_properties;
use crate::error::{Error, Result};
use crate::logger::DiagnosticSink;

pub const PROP_REMOTE_HOSTS: &str = "envstamp.remote.hosts";
pub const PROP_REMOTE_PATH: &str = "envstamp.remote.path";
pub const PROP_OVERRIDE_SUFFIX: &str = "envstamp.remote.overrideSuffix";
pub const PROP_CONNECT_RETRIES: &str = "envstamp.remote.connectRetries";

const DEFAULT_CONNECT_RETRIES: u32 = 2;
const RETRY_DELAY: Duration = Duration::from_millis(333);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings, read from the process configuration properties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteConfig {
    pub hosts: Option<String>,
    pub path: Option<String>,
    pub override_suffix: Option<String>,
    pub connect_retries: u32,
}

impl RemoteConfig {
    pub fn from_properties(properties: &IndexMap<String, String>) -> Self {
        let non_blank = |key: &str| {
            properties
                .get(key)
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        let connect_retries = match non_blank(PROP_CONNECT_RETRIES) {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!("Invalid {PROP_CONNECT_RETRIES}={raw}, using {DEFAULT_CONNECT_RETRIES}");
                DEFAULT_CONNECT_RETRIES
            }),
            None => DEFAULT_CONNECT_RETRIES,
        };

        Self {
            hosts: non_blank(PROP_REMOTE_HOSTS),
            path: non_blank(PROP_REMOTE_PATH),
            override_suffix: non_blank(PROP_OVERRIDE_SUFFIX),
            connect_retries,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.hosts.is_some() && self.path.is_some()
    }

    pub fn connect_str(&self) -> String {
        format!(
            "{}{}",
            self.hosts.as_deref().unwrap_or_default(),
            self.path.as_deref().unwrap_or_default()
        )
    }
}

/// Transport used to read the remote key. One call is one connection attempt.
pub trait RemoteLoader {
    fn fetch(&self, config: &RemoteConfig) -> Result<Vec<u8>>;
}

/// Reads the key with an HTTP GET of `<hosts><path>`. The client is built on
/// the first fetch, so runs without a remote source never touch it.
#[derive(Debug, Default)]
pub struct HttpLoader {
    client: OnceCell<reqwest::blocking::Client>,
}

impl HttpLoader {
    pub fn new() -> Self {
        Self::default()
    }

    fn client(&self) -> Result<&reqwest::blocking::Client> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let client = reqwest::blocking::Client::builder().timeout(CONNECT_TIMEOUT).build()?;
        Ok(self.client.get_or_init(|| client))
    }

    /// Builds the request URL; hosts given without a scheme default to http.
    pub fn url(config: &RemoteConfig) -> Result<Url> {
        let connect_str = config.connect_str();
        let raw = if connect_str.contains("://") {
            connect_str
        } else {
            format!("http://{connect_str}")
        };
        Url::parse(&raw).map_err(|e| Error::RemoteError(format!("invalid remote url '{raw}': {e}")))
    }
}

impl RemoteLoader for HttpLoader {
    fn fetch(&self, config: &RemoteConfig) -> Result<Vec<u8>> {
        let url = Self::url(config)?;
        debug!("Fetching {url}");
        let response = self.client()?.get(url).send()?.error_for_status()?;
        Ok(response.bytes()?.to_vec())
    }
}

/// Calls the loader until it succeeds, at most `connect_retries + 1` times.
pub fn load_with_retries(loader: &dyn RemoteLoader, config: &RemoteConfig) -> Result<Vec<u8>> {
    let mut last_error = None;
    for attempt in 0..=config.connect_retries {
        match loader.fetch(config) {
            Ok(data) => return Ok(data),
            Err(e) => {
                warn!("Could not connect and load data: {e}");
                if attempt < config.connect_retries {
                    sleep(RETRY_DELAY);
                }
                last_error = Some(e);
            }
        }
    }

    Err(Error::RemoteError(format!(
        "Could not connect to {} even after {} retries: {}",
        config.connect_str(),
        config.connect_retries,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    )))
}

#[derive(Debug, Clone)]
pub struct RemoteSource {
    inner: MapSource,
    override_suffix: Option<String>,
}

impl RemoteSource {
    pub const NAME: &'static str = "ZooKeeper";

    /// Loads the remote key; any failure leaves the source empty.
    pub fn load(config: &RemoteConfig, loader: &dyn RemoteLoader, sink: &dyn DiagnosticSink) -> Self {
        let empty = || Self::from_variables(IndexMap::new(), config.override_suffix.clone());

        if !config.is_valid() {
            sink.log(&format!(
                "Missing properties {PROP_REMOTE_HOSTS} and {PROP_REMOTE_PATH} - not applying any properties from {}",
                Self::NAME
            ));
            return empty();
        }

        let started = Instant::now();
        sink.log(&format!(
            "Connecting to {} at {} ...",
            Self::NAME,
            config.hosts.as_deref().unwrap_or_default()
        ));
        let data = match load_with_retries(loader, config) {
            Ok(data) => data,
            Err(e) => {
                sink.error(&format!(
                    "Could not load variables from {} {}: {e}",
                    Self::NAME,
                    config.connect_str()
                ));
                return empty();
            }
        };

        let text = String::from_utf8_lossy(&data);
        let variables = parse_properties(&text);
        let source = Self::from_variables(variables, config.override_suffix.clone());

        let suffix_summary = match &source.override_suffix {
            Some(suffix) => format!("({} with suffix '{suffix}') ", source.count_overrides()),
            None => String::new(),
        };
        sink.log(&format!(
            "Loaded {} properties {suffix_summary}from {} at {} in {}ms",
            source.inner.len(),
            Self::NAME,
            config.path.as_deref().unwrap_or_default(),
            started.elapsed().as_millis()
        ));

        source
    }

    pub fn from_variables(variables: IndexMap<String, String>, override_suffix: Option<String>) -> Self {
        Self {
            inner: MapSource::new(Self::NAME, variables),
            override_suffix: override_suffix.filter(|suffix| !suffix.trim().is_empty()),
        }
    }

    fn count_overrides(&self) -> usize {
        match &self.override_suffix {
            Some(suffix) => {
                let marker = format!("@{suffix}");
                self.inner.keys().filter(|key| key.ends_with(&marker)).count()
            }
            None => 0,
        }
    }
}

impl VariableSource for RemoteSource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn get(&self, var_name: &str) -> Option<NamedValue> {
        if let Some(suffix) = &self.override_suffix {
            let override_key = format!("{var_name}@{suffix}");
            // presence of the key decides, an empty override value still wins
            if self.inner.contains_key(&override_key) {
                debug!("Using key '{override_key}' as {PROP_OVERRIDE_SUFFIX}={suffix} is set");
                return self.inner.get(&override_key);
            }
        }
        self.inner.get(var_name)
    }
}
