//! Delivery of rendered CSV exports to the user.
//!
//! The host application supplies the platform hooks; this module decides
//! which hook to use and, for file-sharing platforms, persists the file
//! before handing it over.

use super::CsvExport;
use crate::error::{Result, StoreError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

/// MIME type used for every export.
pub const CSV_MIME: &str = "text/csv";

/// What a delivery did with an export.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delivered {
    /// Offered to the user as a download with this file name.
    Offered { filename: String },
    /// Written to this path and passed to the platform share action.
    Shared { path: PathBuf },
}

/// Hands a rendered export to the user.
#[async_trait]
pub trait CsvDelivery: Send + Sync {
    async fn deliver(&self, export: &CsvExport) -> Result<Delivered>;
}

/// Host hook that offers bytes as a browser download.
pub trait DownloadTarget: Send + Sync {
    fn offer(&self, filename: &str, mime: &str, content: &[u8]) -> io::Result<()>;
}

impl<F> DownloadTarget for F
where
    F: Fn(&str, &str, &[u8]) -> io::Result<()> + Send + Sync,
{
    fn offer(&self, filename: &str, mime: &str, content: &[u8]) -> io::Result<()> {
        self(filename, mime, content)
    }
}

/// Host hook that opens the platform share sheet for a file.
pub trait ShareTarget: Send + Sync {
    fn share(&self, path: &Path, mime: &str) -> io::Result<()>;
}

impl<F> ShareTarget for F
where
    F: Fn(&Path, &str) -> io::Result<()> + Send + Sync,
{
    fn share(&self, path: &Path, mime: &str) -> io::Result<()> {
        self(path, mime)
    }
}

/// Browser-style delivery: the export never touches the local disk.
pub struct DownloadDelivery {
    target: Arc<dyn DownloadTarget>,
}

impl DownloadDelivery {
    pub fn new(target: Arc<dyn DownloadTarget>) -> Self {
        Self { target }
    }
}

#[async_trait]
impl CsvDelivery for DownloadDelivery {
    async fn deliver(&self, export: &CsvExport) -> Result<Delivered> {
        self.target
            .offer(&export.filename, CSV_MIME, export.as_bytes())
            .map_err(|e| StoreError::Delivery(format!("download of {}: {}", export.filename, e)))?;

        info!(filename = %export.filename, rows = export.rows, "offered export download");
        Ok(Delivered::Offered {
            filename: export.filename.clone(),
        })
    }
}

/// Mobile-style delivery: persist the file, then share it.
pub struct ShareDelivery {
    export_dir: PathBuf,
    target: Arc<dyn ShareTarget>,
}

impl ShareDelivery {
    pub fn new(export_dir: impl Into<PathBuf>, target: Arc<dyn ShareTarget>) -> Self {
        Self {
            export_dir: export_dir.into(),
            target,
        }
    }

    pub fn export_dir(&self) -> &Path {
        &self.export_dir
    }
}

#[async_trait]
impl CsvDelivery for ShareDelivery {
    async fn deliver(&self, export: &CsvExport) -> Result<Delivered> {
        let filename = Path::new(&export.filename);
        if filename.file_name() != Some(filename.as_os_str()) {
            return Err(StoreError::Delivery(format!(
                "export file name {:?} is not a plain file name",
                export.filename
            )));
        }
        let path = self.export_dir.join(filename);
        let write_err =
            |e: io::Error| StoreError::Delivery(format!("writing {}: {}", path.display(), e));

        tokio::fs::create_dir_all(&self.export_dir)
            .await
            .map_err(write_err)?;
        tokio::fs::write(&path, export.as_bytes())
            .await
            .map_err(write_err)?;
        debug!(path = %path.display(), bytes = export.content.len(), "wrote export file");

        self.target
            .share(&path, CSV_MIME)
            .map_err(|e| StoreError::Delivery(format!("sharing {}: {}", path.display(), e)))?;

        info!(path = %path.display(), rows = export.rows, "shared export file");
        Ok(Delivered::Shared { path })
    }
}

/// Runtime platform of the host application.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Web,
    Android,
    Ios,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Web => "web",
            Platform::Android => "android",
            Platform::Ios => "ios",
        }
    }

    /// Whether exports on this platform are written to disk and shared.
    pub fn shares_files(self) -> bool {
        !matches!(self, Platform::Web)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "web" => Ok(Platform::Web),
            "android" => Ok(Platform::Android),
            "ios" => Ok(Platform::Ios),
            other => Err(StoreError::InvalidArgument(format!(
                "unknown platform: {}",
                other
            ))),
        }
    }
}

/// Delivery configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Platform the host runs on; picks the delivery variant.
    pub platform: Platform,

    /// Where file-sharing platforms persist exports.
    pub export_dir: PathBuf,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            platform: Platform::Web,
            export_dir: PathBuf::from("./exports"),
        }
    }
}

impl DeliveryConfig {
    /// Build the delivery for the configured platform.
    pub fn build(
        &self,
        download: Arc<dyn DownloadTarget>,
        share: Arc<dyn ShareTarget>,
    ) -> Arc<dyn CsvDelivery> {
        if self.platform.shares_files() {
            Arc::new(ShareDelivery::new(self.export_dir.clone(), share))
        } else {
            Arc::new(DownloadDelivery::new(download))
        }
    }
}
