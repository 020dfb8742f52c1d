use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Init(#[from] tracing_subscriber::util::TryInitError),

    #[error("invalid RUST_LOG: {0}")]
    Filter(#[from] tracing_subscriber::filter::FromEnvError),
}

pub struct TracingBuilder {
    level: Level,
    json: bool,
}

impl Default for TracingBuilder {
    fn default() -> Self {
        TracingBuilder {
            level: Level::INFO,
            json: false,
        }
    }
}

impl TracingBuilder {
    /// Set the log level. RUST_LOG still has a higher priority over this
    /// value.
    pub fn level(mut self, level: Level) -> TracingBuilder {
        self.level = level;
        self
    }

    /// Emit one JSON object per event instead of human readable lines.
    pub fn json(mut self, json: bool) -> TracingBuilder {
        self.json = json;
        self
    }

    fn filter(&self) -> Result<EnvFilter, Error> {
        Ok(EnvFilter::builder()
            .with_default_directive(self.level.into())
            .from_env()?)
    }

    /// This will setup tracing based on the configuration passed in.
    /// Events go to stderr, so command output on stdout stays parseable.
    pub fn build(self) -> Result<(), Error> {
        let registry = tracing_subscriber::registry().with(self.filter()?);

        if self.json {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_current_span(true)
                        .with_writer(std::io::stderr),
                )
                .try_init()?;
        } else {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .compact()
                        .with_writer(std::io::stderr),
                )
                .try_init()?;
        }

        Ok(())
    }
}
