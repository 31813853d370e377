use serde::Deserialize;
use std::fs::File;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// MQTT transport settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Interval between unconditional poll requests to every device.
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    /// Delay before a local-mode override is mirrored back to the pump.
    #[serde(with = "humantime_serde")]
    pub correction_delay: Duration,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            url: String::from("mqtt://127.0.0.1:1883"),
            username: None,
            password: None,
            poll_interval: Duration::from_secs(5),
            correction_delay: Duration::from_secs(1),
        }
    }
}

/// TLS material for the secured deployment variant.
#[derive(Debug, Clone, Deserialize)]
pub struct TlsConfig {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// HTTP API settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub listen: SocketAddr,
    /// Static shared secret expected in the `Authorization` header.
    /// When unset the API is open.
    pub token: Option<String>,
    /// Exempt read requests from the token check. The reference deployment
    /// gates everything, so this defaults to off.
    pub open_reads: bool,
    pub tls: Option<TlsConfig>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 3000)),
            token: None,
            open_reads: false,
            tls: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mqtt: MqttConfig,
    pub http: HttpConfig,
}

const DEFAULT_CONFIG_FILE: &str = "config.yml";

/// Loads the configuration: the explicit `--config` file, else `config.yml`
/// next to the process if present, else built-in defaults. Environment
/// variables override the file in all cases.
pub fn load(explicit: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = match explicit {
        Some(path) => read_file(path)?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => read_file(Path::new(DEFAULT_CONFIG_FILE))?,
        None => Config::default(),
    };
    apply_env(&mut config)?;
    Ok(config)
}

fn read_file(path: &Path) -> anyhow::Result<Config> {
    log::debug!("Loading config file from {path:?}");
    let file = File::open(path)
        .map_err(|err| anyhow::anyhow!("Cannot open config file {path:?}: {err}"))?;
    Ok(serde_yaml::from_reader(&file)?)
}

fn apply_env(config: &mut Config) -> anyhow::Result<()> {
    if let Ok(url) = std::env::var("MQTT_URL") {
        config.mqtt.url = url;
    }
    if let Ok(user) = std::env::var("MQTT_USER") {
        config.mqtt.username = Some(user);
    }
    if let Ok(pass) = std::env::var("MQTT_PASS") {
        config.mqtt.password = Some(pass);
    }
    if let Ok(listen) = std::env::var("HTTP_LISTEN") {
        config.http.listen = listen
            .parse()
            .map_err(|err| anyhow::anyhow!("Invalid HTTP_LISTEN '{listen}': {err}"))?;
    }
    if let Ok(token) = std::env::var("API_TOKEN") {
        config.http.token = Some(token);
    }
    match (std::env::var("TLS_CERT"), std::env::var("TLS_KEY")) {
        (Ok(cert), Ok(key)) => {
            config.http.tls = Some(TlsConfig {
                cert: PathBuf::from(cert),
                key: PathBuf::from(key),
            });
        }
        (Ok(_), Err(_)) | (Err(_), Ok(_)) => {
            anyhow::bail!("TLS_CERT and TLS_KEY must be set together");
        }
        (Err(_), Err(_)) => {}
    }
    Ok(())
}
