// Filesystem-backed certificate source

use super::{Candidate, CertificateSource};
use crate::certificates::RawCertificate;
use crate::error::MonitorError;
use crate::monitor::config::{FilesystemSettings, MonitorSpec};
use crate::monitor::types::SourceKind;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Scans certificate directories on the local node
#[derive(Debug, Clone)]
pub struct FilesystemSource {
    node_name: String,
    extensions: Vec<String>,
}

impl FilesystemSource {
    pub fn new(settings: &FilesystemSettings) -> Self {
        Self {
            node_name: settings.node_name.clone(),
            extensions: settings
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    fn is_certificate_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }

    /// Walk `root` and collect matching files in path order
    fn collect_files(&self, root: &Path) -> Result<Vec<PathBuf>, MonitorError> {
        let mut files = Vec::new();
        let mut pending = vec![root.to_path_buf()];

        while let Some(dir) = pending.pop() {
            let entries = fs::read_dir(&dir).map_err(|e| {
                MonitorError::discovery(
                    SourceKind::Filesystem,
                    format!("failed to read directory {}: {}", dir.display(), e),
                )
            })?;

            for entry in entries {
                let Ok(entry) = entry else { continue };
                let path = entry.path();
                let Ok(file_type) = entry.file_type() else { continue };

                if file_type.is_dir() {
                    pending.push(path);
                } else if self.is_certificate_file(&path) {
                    files.push(path);
                }
            }
        }

        files.sort();
        Ok(files)
    }

    fn scan(&self, dirs: &[PathBuf]) -> Result<Vec<Candidate>, MonitorError> {
        let mut candidates = Vec::new();
        let mut visited = BTreeSet::new();

        for dir in dirs {
            for path in self.collect_files(dir)? {
                // Overlapping directories yield the same file more than once
                if !visited.insert(path.clone()) {
                    continue;
                }
                let identity = path.display().to_string();
                let candidate = match fs::read(&path) {
                    Ok(bytes) => Candidate::ok(identity, &self.node_name, RawCertificate::Pem(bytes)),
                    Err(e) => Candidate::failed(identity, &self.node_name, e.to_string()),
                };
                candidates.push(candidate);
            }
        }

        Ok(candidates)
    }
}

#[async_trait]
impl CertificateSource for FilesystemSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Filesystem
    }

    async fn list_candidates(&self, spec: &MonitorSpec) -> Result<Vec<Candidate>, MonitorError> {
        if spec.cert_dirs.is_empty() {
            return Ok(Vec::new());
        }

        let source = self.clone();
        let dirs = spec.cert_dirs.clone();

        tokio::task::spawn_blocking(move || source.scan(&dirs))
            .await
            .map_err(|e| MonitorError::discovery(SourceKind::Filesystem, format!("scan task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn settings() -> FilesystemSettings {
        FilesystemSettings {
            node_name: "node-1".to_string(),
            extensions: vec![".crt".to_string(), "pem".to_string()],
        }
    }

    #[tokio::test]
    async fn test_scans_nested_directories() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("etcd")).unwrap();
        fs::write(dir.path().join("ca.crt"), b"ca").unwrap();
        fs::write(dir.path().join("etcd").join("server.PEM"), b"server").unwrap();
        fs::write(dir.path().join("ca.key"), b"key").unwrap();

        let source = FilesystemSource::new(&settings());
        let spec = MonitorSpec {
            cert_dirs: vec![dir.path().to_path_buf()],
            ..MonitorSpec::default()
        };

        let candidates = source.list_candidates(&spec).await.unwrap();
        assert_eq!(candidates.len(), 2);
        assert!(candidates.iter().all(|c| c.namespace == "node-1"));
        assert!(candidates[0].identity.ends_with("ca.crt"));
        assert!(candidates[1].identity.ends_with("server.PEM"));
        assert_eq!(
            candidates[0].material.as_ref().unwrap(),
            &RawCertificate::Pem(b"ca".to_vec())
        );
    }

    #[tokio::test]
    async fn test_overlapping_directories_list_each_file_once() {
        let dir = TempDir::new().unwrap();
        let etcd = dir.path().join("etcd");
        fs::create_dir(&etcd).unwrap();
        fs::write(dir.path().join("ca.crt"), b"ca").unwrap();
        fs::write(etcd.join("ca.crt"), b"etcd-ca").unwrap();

        let source = FilesystemSource::new(&settings());
        let spec = MonitorSpec {
            cert_dirs: vec![dir.path().to_path_buf(), etcd.clone(), dir.path().to_path_buf()],
            ..MonitorSpec::default()
        };

        let candidates = source.list_candidates(&spec).await.unwrap();
        let identities: Vec<&str> = candidates.iter().map(|c| c.identity.as_str()).collect();
        assert_eq!(
            identities,
            vec![
                dir.path().join("ca.crt").display().to_string(),
                etcd.join("ca.crt").display().to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_directory_is_discovery_error() {
        let dir = TempDir::new().unwrap();
        let source = FilesystemSource::new(&settings());
        let spec = MonitorSpec {
            cert_dirs: vec![dir.path().join("does-not-exist")],
            ..MonitorSpec::default()
        };

        let err = source.list_candidates(&spec).await.unwrap_err();
        assert!(matches!(
            err,
            MonitorError::Discovery {
                kind: SourceKind::Filesystem,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_no_dirs_means_no_candidates() {
        let source = FilesystemSource::new(&settings());
        let candidates = source.list_candidates(&MonitorSpec::default()).await.unwrap();
        assert!(candidates.is_empty());
    }
}
