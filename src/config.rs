// src/config.rs

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use url::Url;

use crate::schema::SourceKind;
use crate::upload::esri::{Projection, SpatialReference};

/// The three exported service layers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourcesConfig {
    pub apartments: PathBuf,
    pub mobile_homes: PathBuf,
    pub schools: PathBuf,
}

impl SourcesConfig {
    /// Layers in append order.
    pub fn layers(&self) -> [(SourceKind, &Path); 3] {
        [
            (SourceKind::Apartment, self.apartments.as_path()),
            (SourceKind::MobileHome, self.mobile_homes.as_path()),
            (SourceKind::School, self.schools.as_path()),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub geojson_dir: PathBuf,
    pub prefix: String,
    pub chunk_size: u64,
    /// Optional single-file copy of the merged layer.
    pub merged: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            geojson_dir: PathBuf::from("geojson"),
            prefix: "Building_Services".to_string(),
            chunk_size: 100,
            merged: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    pub portal_url: String,
    pub item_id: Option<String>,
    pub layer: u32,
    pub token: Option<String>,
    pub username: Option<String>,
    /// Pause between `applyEdits` calls.
    pub delay_secs: f64,
    pub wkid: u32,
    pub reproject: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            portal_url: "https://www.arcgis.com".to_string(),
            item_id: None,
            layer: 0,
            token: None,
            username: None,
            delay_secs: 3.0,
            wkid: 3857,
            reproject: true,
        }
    }
}

impl ServiceConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_secs_f64(self.delay_secs)
    }

    pub fn projection(&self) -> Projection {
        Projection {
            spatial_reference: SpatialReference::new(self.wkid),
            reproject: self.reproject,
        }
    }

    pub fn item_id(&self) -> Result<&str> {
        self.item_id
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| anyhow!("service.item_id is required to upload"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub sources: Option<SourcesConfig>,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default = "default_history_dir")]
    pub history_dir: PathBuf,
}

fn default_history_dir() -> PathBuf {
    PathBuf::from("history")
}

impl Config {
    /// Read and validate a YAML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text =
            fs::read_to_string(path).with_context(|| format!("reading config {:?}", path))?;
        Self::from_yaml(&text).with_context(|| format!("loading config {:?}", path))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let cfg: Config = serde_yaml::from_str(text).context("parsing YAML")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.output.chunk_size == 0 {
            bail!("output.chunk_size must be greater than zero");
        }
        if self.output.prefix.trim().is_empty() {
            bail!("output.prefix must not be empty");
        }
        if !self.service.delay_secs.is_finite() || self.service.delay_secs < 0.0 {
            bail!("service.delay_secs must be a non-negative number");
        }
        if self.service.reproject && !self.service.projection().spatial_reference.is_web_mercator() {
            bail!(
                "service.reproject only targets Web Mercator (3857 or 102100), got wkid {}",
                self.service.wkid
            );
        }
        Url::parse(&self.service.portal_url)
            .with_context(|| format!("service.portal_url `{}` is not a URL", self.service.portal_url))?;
        Ok(())
    }

    pub fn sources(&self) -> Result<&SourcesConfig> {
        self.sources
            .as_ref()
            .ok_or_else(|| anyhow!("config has no `sources` section"))
    }
}
