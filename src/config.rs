use camino::Utf8Path;
use config::{Config, ConfigError};

pub use oelo_api::config::*;

pub fn parse(filename: &Utf8Path) -> Result<AppConfig, ConfigError> {
    let settings = Config::builder()
        .set_default(
            "controller.poll_interval_secs",
            ControllerConfig::DEFAULT_POLL_INTERVAL_SECS,
        )?
        .set_default("controller.debounce_ms", ControllerConfig::DEFAULT_DEBOUNCE_MS)?
        .set_default("controller.timeout_secs", ControllerConfig::DEFAULT_TIMEOUT_SECS)?
        .set_default("oelo.state_file", "state.yaml")?
        .set_default("server.listen", "127.0.0.1")?
        .set_default("server.port", 8080)?
        .add_source(config::File::with_name(filename.as_str()))
        .build()?;

    settings.try_deserialize()
}
