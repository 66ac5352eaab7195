use config::{Config, ConfigError, Environment, File, Map};
use tarifsync_core::config::AppConfig;

/// Variables the original deployment used for the downstream API.
const LEGACY_OVERRIDES: [(&str, &str); 3] = [
    ("api.base_url", "BASE_URL"),
    ("api.username", "USER_NAME"),
    ("api.password", "PASS_WORD"),
];

/// # Summary
/// Loads the configuration from the process environment.
///
/// # Logic
/// 1. Built-in defaults.
/// 2. Optional `<file>.toml` (or any format `config` recognizes).
/// 3. `TARIFSYNC__SECTION__KEY` variables.
/// 4. `BASE_URL`, `USER_NAME` and `PASS_WORD` on top.
///
/// # Returns
/// `ConfigError` when a source cannot be read or `api.base_url` is unset.
pub fn load(file: &str) -> Result<AppConfig, ConfigError> {
    build(file, None, |name| std::env::var(name).ok())
}

fn build(
    file: &str,
    env: Option<Map<String, String>>,
    legacy: impl Fn(&str) -> Option<String>,
) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder()
        .add_source(Config::try_from(&AppConfig::default())?)
        .add_source(File::with_name(file).required(false))
        .add_source(
            Environment::with_prefix("TARIFSYNC")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .source(env),
        );
    for (key, var) in LEGACY_OVERRIDES {
        builder = builder.set_override_option(key, legacy(var).filter(|v| !v.is_empty()))?;
    }

    let config: AppConfig = builder.build()?.try_deserialize()?;
    if config.api.base_url.trim().is_empty() {
        return Err(ConfigError::Message(
            "api.base_url is not set (TARIFSYNC__API__BASE_URL or BASE_URL)".to_string(),
        ));
    }
    Ok(config)
}
