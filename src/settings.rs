//! Settings, read with the `config` crate from an optional file and from
//! `LOADDATA_*` environment variables, plus the [`LoadContext`] derived from
//! them and handed to the codec and the deserializer.
use std::path::Path;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, File};
use serde::Deserialize;

use crate::charset::Charset;
use crate::error::Result;
use crate::persist::PersistenceMode;

pub const ENV_PREFIX: &str = "LOADDATA";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Live,
    /// Tests run against a throwaway in-memory datastore.
    Test,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Settings {
    pub app_id: String,
    pub default_charset: String,
    pub datastore_dir: String,
    pub environment: Environment,
    pub log_filter: String,
    /// Fixture reinstalled after every flush, when it exists.
    pub initial_data: String,
}

/// Configuration threaded explicitly into a load.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadContext {
    pub app_id: Option<String>,
    pub default_charset: Charset,
}

impl Settings {
    /// Defaults, then the file (if it exists), then the environment.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let builder = Self::defaults(file)?.add_source(config::Environment::with_prefix(ENV_PREFIX));
        Self::build(builder)
    }
    /// Defaults overridden by the file only.
    pub fn from_file(file: &Path) -> Result<Self> {
        Self::build(Self::defaults(Some(file))?)
    }
    fn defaults(file: Option<&Path>) -> Result<ConfigBuilder<DefaultState>> {
        let mut builder = Config::builder()
            .set_default("app_id", "app")?
            .set_default("default_charset", Charset::default().name())?
            .set_default("datastore_dir", ".")?
            .set_default("environment", "live")?
            .set_default("log_filter", "info")?
            .set_default("initial_data", "initial_data.json")?;
        if let Some(file) = file {
            builder = builder.add_source(File::from(file).required(false));
        }
        Ok(builder)
    }
    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let settings: Settings = builder.build()?.try_deserialize()?;
        // reject an unknown charset before any record is read
        settings.charset()?;
        Ok(settings)
    }

    pub fn charset(&self) -> Result<Charset> {
        self.default_charset.parse()
    }
    pub fn persistence_mode(&self) -> PersistenceMode {
        match self.environment {
            Environment::Test => PersistenceMode::InMemory,
            Environment::Live => {
                let path = Path::new(&self.datastore_dir).join(format!("{}.datastore.sqlite", self.app_id));
                PersistenceMode::File(path.to_string_lossy().into_owned())
            }
        }
    }
    pub fn context(&self) -> Result<LoadContext> {
        Ok(LoadContext {
            app_id: Some(self.app_id.clone()),
            default_charset: self.charset()?,
        })
    }
}
