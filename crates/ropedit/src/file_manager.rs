use anyhow::Result;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::config::FileConfig;
use crate::editor::Editor;

pub struct FileManager {
    current_path: Option<PathBuf>,
    is_readonly: bool,
    backup_on_save: bool,
    large_file_threshold: u64,
}

impl FileManager {
    pub fn new() -> Self {
        Self::with_config(&FileConfig::default())
    }

    pub fn with_config(config: &FileConfig) -> Self {
        Self {
            current_path: None,
            is_readonly: false,
            backup_on_save: config.backup_on_save,
            large_file_threshold: config.large_file_warning_bytes,
        }
    }

    pub fn get_current_path(&self) -> Option<&PathBuf> {
        self.current_path.as_ref()
    }

    pub fn is_readonly(&self) -> bool {
        self.is_readonly
    }

    pub fn has_file(&self) -> bool {
        self.current_path.is_some()
    }

    /// Reads the whole file. The current path only changes once the read
    /// succeeded.
    pub async fn open_file(&mut self, path: PathBuf) -> Result<Vec<u8>> {
        if !path.exists() {
            return Err(anyhow::anyhow!("File not found: {}", path.display()));
        }

        if !path.is_file() {
            return Err(anyhow::anyhow!("Path is not a file: {}", path.display()));
        }

        let readonly = match fs::metadata(&path).await {
            Ok(metadata) => {
                if metadata.len() > self.large_file_threshold {
                    log::warn!(
                        "Large file detected ({} bytes): {}",
                        metadata.len(),
                        path.display()
                    );
                }
                metadata.permissions().readonly()
            }
            Err(e) => {
                log::warn!("Failed to get file metadata: {}", e);
                false
            }
        };

        match fs::read(&path).await {
            Ok(content) => {
                if content.contains(&0) {
                    log::warn!("File contains NUL bytes, may be binary: {}", path.display());
                }
                self.is_readonly = readonly;
                self.current_path = Some(path.clone());
                log::info!(
                    "Successfully opened file: {} ({} bytes)",
                    path.display(),
                    content.len()
                );
                Ok(content)
            }
            Err(e) => {
                let error_msg = match e.kind() {
                    std::io::ErrorKind::PermissionDenied => {
                        format!("Permission denied: {}", path.display())
                    }
                    std::io::ErrorKind::NotFound => {
                        format!("File not found: {}", path.display())
                    }
                    _ => format!("Failed to read file: {} - {}", path.display(), e),
                };
                Err(anyhow::anyhow!(error_msg))
            }
        }
    }

    pub async fn save_file(&self, editor: &mut Editor) -> Result<String> {
        let Some(ref path) = self.current_path else {
            return Err(anyhow::anyhow!("No file name specified"));
        };
        if self.is_readonly {
            return Err(anyhow::anyhow!("File is read-only: {}", path.display()));
        }

        if self.backup_on_save {
            Self::backup(path).await;
        }

        let mut attempts = 0;
        const MAX_ATTEMPTS: u32 = 3;

        loop {
            match write_leaves(path, editor).await {
                Ok(()) => {
                    editor.mark_saved();
                    log::info!("Successfully saved file: {}", path.display());
                    return Ok(format!(
                        "\"{}\" {} lines, {} bytes written",
                        path.display(),
                        editor.line_count(),
                        editor.len()
                    ));
                }
                Err(e) => {
                    attempts += 1;
                    if attempts >= MAX_ATTEMPTS {
                        return Err(anyhow::anyhow!(write_error_message(path, &e)));
                    }

                    tokio::time::sleep(tokio::time::Duration::from_millis(100 * attempts as u64))
                        .await;
                    log::warn!(
                        "Save attempt {} failed for {}, retrying...",
                        attempts,
                        path.display()
                    );
                }
            }
        }
    }

    pub async fn save_file_as(&mut self, path: PathBuf, editor: &mut Editor) -> Result<String> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    anyhow::anyhow!(
                        "Failed to create directory: {} - {}",
                        parent.display(),
                        e
                    )
                })?;
                log::info!("Created directory: {}", parent.display());
            }
        }

        if path.exists() {
            match fs::metadata(&path).await {
                Ok(metadata) => {
                    if metadata.permissions().readonly() {
                        return Err(anyhow::anyhow!(
                            "Target file is read-only: {}",
                            path.display()
                        ));
                    }
                }
                Err(e) => {
                    log::warn!("Failed to check target file metadata: {}", e);
                }
            }
            if self.backup_on_save {
                Self::backup(&path).await;
            }
        }

        match write_leaves(&path, editor).await {
            Ok(()) => {
                self.current_path = Some(path.clone());
                self.is_readonly = false;
                editor.mark_saved();
                log::info!("Successfully saved file as: {}", path.display());
                Ok(format!(
                    "\"{}\" {} lines, {} bytes written",
                    path.display(),
                    editor.line_count(),
                    editor.len()
                ))
            }
            Err(e) => Err(anyhow::anyhow!(write_error_message(&path, &e))),
        }
    }

    /// Copies a non-empty existing file to `<name>.bak`. Failures are only
    /// logged.
    async fn backup(path: &Path) {
        let Ok(metadata) = fs::metadata(path).await else {
            return;
        };
        if metadata.len() == 0 {
            return;
        }
        let backup_path = path.with_extension("bak");
        if let Err(e) = fs::copy(path, &backup_path).await {
            log::warn!("Failed to create backup: {}", e);
        } else {
            log::info!("Created backup: {}", backup_path.display());
        }
    }
}

impl Default for FileManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Streams the rope to `path` one leaf at a time through a buffered writer.
async fn write_leaves(path: &Path, editor: &Editor) -> std::io::Result<()> {
    let file = fs::File::create(path).await?;
    let mut writer = BufWriter::with_capacity(64 * 1024, file);
    for leaf in editor.document().rope().leaves() {
        writer.write_all(leaf).await?;
    }
    writer.flush().await?;
    writer.into_inner().sync_all().await?;
    Ok(())
}

fn write_error_message(path: &Path, e: &std::io::Error) -> String {
    match e.kind() {
        std::io::ErrorKind::PermissionDenied => {
            format!("Permission denied: {}", path.display())
        }
        std::io::ErrorKind::WriteZero => {
            format!("Disk may be full: {}", path.display())
        }
        _ => format!("Failed to write file: {} - {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[tokio::test]
    async fn test_file_manager_creation() {
        let fm = FileManager::new();
        assert!(!fm.has_file());
        assert!(fm.get_current_path().is_none());
        assert!(!fm.is_readonly());
    }

    #[tokio::test]
    async fn test_open_and_save_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "Hello World\nTest content").unwrap();

        let mut fm = FileManager::new();
        let mut editor = Editor::new();

        let content = fm.open_file(temp_file.path().to_path_buf()).await.unwrap();
        editor.load_bytes(&content).unwrap();
        assert!(fm.has_file());
        assert_eq!(editor.line_count(), 3);

        editor.insert_str("!").unwrap();
        assert!(fm.save_file(&mut editor).await.is_ok());
        assert!(!editor.is_modified());
        assert_eq!(
            std::fs::read_to_string(temp_file.path()).unwrap(),
            "!Hello World\nTest content\n"
        );
    }

    #[tokio::test]
    async fn test_open_missing_file_keeps_state() {
        let dir = TempDir::new().unwrap();
        let mut fm = FileManager::new();
        let result = fm.open_file(dir.path().join("missing.txt")).await;
        assert!(result.is_err());
        assert!(!fm.has_file());

        let result = fm.open_file(dir.path().to_path_buf()).await;
        assert!(result.unwrap_err().to_string().contains("not a file"));
    }

    #[tokio::test]
    async fn test_save_without_path_fails() {
        let fm = FileManager::new();
        let mut editor = Editor::new();
        assert!(fm.save_file(&mut editor).await.is_err());
    }

    #[tokio::test]
    async fn test_save_file_as() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("out.txt");
        let mut fm = FileManager::new();
        let mut editor = Editor::new();

        editor.insert_str("Test").unwrap();

        let result = fm.save_file_as(path.clone(), &mut editor).await;
        assert!(result.is_ok());
        assert!(fm.has_file());
        assert!(!editor.is_modified());
        assert_eq!(std::fs::read(&path).unwrap(), b"Test");
    }

    #[tokio::test]
    async fn test_save_creates_backup() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.txt");
        std::fs::write(&path, "original").unwrap();

        let mut fm = FileManager::new();
        let mut editor = Editor::new();
        editor
            .load_bytes(&fm.open_file(path.clone()).await.unwrap())
            .unwrap();
        editor.delete(0, 4).unwrap();
        fm.save_file(&mut editor).await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "inal");
        assert_eq!(
            std::fs::read_to_string(dir.path().join("doc.bak")).unwrap(),
            "original"
        );
    }

    #[tokio::test]
    async fn test_backup_can_be_disabled() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.txt");
        std::fs::write(&path, "original").unwrap();

        let config = FileConfig {
            backup_on_save: false,
            ..FileConfig::default()
        };
        let mut fm = FileManager::with_config(&config);
        let mut editor = Editor::new();
        editor
            .load_bytes(&fm.open_file(path.clone()).await.unwrap())
            .unwrap();
        fm.save_file(&mut editor).await.unwrap();
        assert!(!dir.path().join("doc.bak").exists());
    }

    #[tokio::test]
    async fn test_large_document_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("big.txt");
        let text: String = (0..2000).map(|i| format!("line {}\n", i)).collect();

        let mut fm = FileManager::new();
        let mut editor = Editor::new();
        editor.set_content(&text).unwrap();
        fm.save_file_as(path.clone(), &mut editor).await.unwrap();

        let bytes = fm.open_file(path).await.unwrap();
        assert_eq!(bytes, text.as_bytes());
    }

    #[tokio::test]
    async fn test_save_many_small_leaves() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("leaves.txt");
        let text: Vec<u8> = (0..2 * 1024 * 1024).map(|i| b'a' + (i % 26) as u8).collect();

        let mut fm = FileManager::new();
        let mut editor = Editor::new();
        editor.load_bytes(&text).unwrap();
        assert!(editor.document().rope().leaves().count() > 100_000);

        fm.save_file_as(path.clone(), &mut editor).await.unwrap();
        assert_eq!(fm.get_current_path(), Some(&path));
        assert!(!fm.is_readonly());
        assert_eq!(std::fs::read(&path).unwrap(), text);
    }
}
