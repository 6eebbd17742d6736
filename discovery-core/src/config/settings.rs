use std::path::Path;
use std::time::Duration;

use config::{Config, File, FileFormat};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::error::Result;
use crate::util::duration::ConfigDuration;

#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
pub struct MetadataSettings {
    #[builder(default = "http://169.254.169.254".to_string(), setter(into))]
    pub endpoint: String,
    #[builder(default = ConfigDuration::from_millis(1500))]
    pub timeout: ConfigDuration,
}

impl Default for MetadataSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
pub struct Settings {
    #[builder(default)]
    pub metadata: MetadataSettings,
    #[serde(rename = "refresh-interval", default)]
    #[builder(default, setter(strip_option))]
    pub refresh_interval: Option<ConfigDuration>,
    #[serde(rename = "page-size")]
    #[builder(default = 50)]
    pub page_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Settings {
    pub fn new(config: &Config) -> Result<Self> {
        let settings: Self = config.get("discovery")?;
        Ok(settings)
    }

    /// Layers an optional user file over the embedded reference settings.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder()
            .add_source(File::from_str(crate::REFERENCE, FileFormat::Toml));
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }
        let config = builder.build()?;
        Self::new(&config)
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        self.refresh_interval
            .map(|interval| interval.to_std_duration())
            .filter(|interval| !interval.is_zero())
    }
}
