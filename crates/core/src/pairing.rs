//! Pairing artifact rendering and storage.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use image::Luma;
use qrcode::QrCode;
use tracing::info;

use mb_protocol::TenantId;

use crate::error::{Error, Result};

/// A stored pairing code image plus the URL it is served under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingArtifact {
    /// Public URL the caller can fetch the scannable image from.
    pub url: String,
    /// Where the rendered PNG was written.
    pub image_path: PathBuf,
}

/// Renders pairing payloads into scannable PNGs fetchable by reference.
///
/// Stateless per call apart from an attempt counter: the file name is
/// derived from the tenant id plus a monotone sequence number, so artifacts
/// from distinct pairing attempts never alias each other.
pub struct PairingArtifactProducer {
    output_dir: PathBuf,
    public_base_url: String,
    attempt: AtomicU64,
}

impl PairingArtifactProducer {
    pub fn new(output_dir: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            public_base_url: public_base_url.into(),
            attempt: AtomicU64::new(0),
        }
    }

    /// Directory the rendered images are written to.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Renders `payload` as a QR PNG, persists it, and returns the artifact.
    ///
    /// Callers invoke this at most once per pairing attempt; every call
    /// renders fresh and yields a new reference URL.
    pub fn produce(&self, tenant: &TenantId, payload: &str) -> Result<PairingArtifact> {
        std::fs::create_dir_all(&self.output_dir)?;

        let code = QrCode::new(payload.as_bytes()).map_err(|e| Error::Pairing(e.to_string()))?;
        let rendered = code.render::<Luma<u8>>().build();

        let seq = self.attempt.fetch_add(1, Ordering::Relaxed);
        let file_name = format!("{}_pairing_{seq}.png", tenant.as_str());
        let image_path = self.output_dir.join(&file_name);
        rendered
            .save_with_format(&image_path, image::ImageFormat::Png)
            .map_err(|e| Error::Pairing(e.to_string()))?;

        let url = format!(
            "{}/pairing/{file_name}",
            self.public_base_url.trim_end_matches('/')
        );
        info!(
            target = "mb.session",
            tenant = %tenant,
            path = %image_path.display(),
            "pairing code image saved"
        );
        Ok(PairingArtifact { url, image_path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant(raw: &str) -> TenantId {
        TenantId::parse(raw).unwrap()
    }

    #[test]
    fn produce_writes_a_png_and_builds_the_url() {
        let tmp = tempfile::TempDir::new().unwrap();
        let producer = PairingArtifactProducer::new(tmp.path(), "http://localhost:3000");

        let artifact = producer.produce(&tenant("u1"), "2@AbCdEf").unwrap();
        assert!(artifact.image_path.exists());
        assert_eq!(artifact.url, "http://localhost:3000/pairing/u1_pairing_0.png");

        let bytes = std::fs::read(&artifact.image_path).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn successive_artifacts_are_distinct() {
        let tmp = tempfile::TempDir::new().unwrap();
        let producer = PairingArtifactProducer::new(tmp.path(), "http://localhost:3000");

        let first = producer.produce(&tenant("u1"), "payload-a").unwrap();
        let second = producer.produce(&tenant("u1"), "payload-b").unwrap();
        assert_ne!(first.url, second.url);
        assert_ne!(first.image_path, second.image_path);
    }

    #[test]
    fn trailing_slash_in_base_url_is_tolerated() {
        let tmp = tempfile::TempDir::new().unwrap();
        let producer = PairingArtifactProducer::new(tmp.path(), "https://bridge.example.com/");

        let artifact = producer.produce(&tenant("u9"), "x").unwrap();
        assert_eq!(
            artifact.url,
            "https://bridge.example.com/pairing/u9_pairing_0.png"
        );
    }
}
