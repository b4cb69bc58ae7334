use crate::env::{
    parse_level, ColorChoice, ConfigError, LOG_SINK_COLOR_ENV, LOG_SINK_NAME_ENV,
    LOG_SINK_SYNC_LEVEL_ENV,
};
use crate::format::is_tty;
use crate::layer::HumanLayer;
use crate::record::Level;
use crate::sink::Sink;
use crate::sync_writer::SyncWriter;
use std::io;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Configuration of the console layer.
///
/// **Fields**
/// - `color`: whether to colorize; [`ColorChoice::Auto`] colorizes only
///   when the sink is a terminal.
/// - `sink_name`: name printed with sync failures on the diagnostics
///   stream.
/// - `sync_level`: events at or above this level are followed by a sync
///   of the sink.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayerConfig {
    pub color: ColorChoice,
    pub sink_name: String,
    pub sync_level: Level,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            color: ColorChoice::Auto,
            sink_name: "stderr".to_string(),
            sync_level: Level::Error,
        }
    }
}

impl LayerConfig {
    /// Defaults overridden by the `LOG_SINK_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`LayerConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(color) = lookup(LOG_SINK_COLOR_ENV) {
            config.color = color.parse()?;
        }
        if let Some(level) = lookup(LOG_SINK_SYNC_LEVEL_ENV) {
            config.sync_level = parse_level(&level)?;
        }
        if let Some(name) = lookup(LOG_SINK_NAME_ENV) {
            config.sink_name = name;
        }
        Ok(config)
    }

    /// Decide whether output to `sink` is colorized.
    pub fn enable_color<S: Sink + ?Sized>(&self, sink: &S) -> bool {
        match self.color {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => is_tty(sink),
        }
    }
}

/// Error type returned when installing the global subscriber.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("global subscriber already set: {0}")]
    AlreadySet(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Wrap `sink` and build a [`HumanLayer`] for it according to `config`.
///
/// Terminal detection happens before the sink is wrapped.
pub fn build_layer<W: Sink + Send + 'static>(sink: W, config: &LayerConfig) -> HumanLayer<W> {
    let enable_color = config.enable_color(&sink);
    HumanLayer::new(Arc::new(SyncWriter::new(sink)), enable_color)
        .with_sink_name(config.sink_name.clone())
        .with_sync_level(config.sync_level)
}

/// Install a [`Registry`] with a [`HumanLayer`] writing to `sink` as the
/// global default subscriber.
///
/// **Returns**
/// - the shared writer, so shutdown paths can call
///   [`SyncWriter::sync`] on it;
/// - `Err(InitError::AlreadySet)` if a global subscriber already exists.
pub fn init_with_config<W: Sink + Send + 'static>(
    sink: W,
    config: LayerConfig,
) -> Result<Arc<SyncWriter<W>>, InitError> {
    let layer = build_layer(sink, &config);
    let writer = Arc::clone(layer.writer());
    tracing::subscriber::set_global_default(Registry::default().with(layer))?;
    Ok(writer)
}

/// Log to stderr, configured from the environment.
///
/// This is the recommended entrypoint for command line tools.
pub fn init_stderr() -> Result<Arc<SyncWriter<io::Stderr>>, InitError> {
    let config = LayerConfig::from_env()?;
    init_with_config(io::stderr(), config)
}
