use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// @module: File and directory utilities

/// Extension of the supported presentation format
pub const PRESENTATION_EXTENSION: &str = "pptx";

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path).with_context(|| format!("Failed to create directory: {:?}", path))?;
        }
        Ok(())
    }

    // @generates: `<stem>.<lang>.pptx` inside output_dir
    pub fn generate_output_path<P1: AsRef<Path>, P2: AsRef<Path>>(
        input_file: P1,
        output_dir: P2,
        target_language: &str,
    ) -> PathBuf {
        let stem = input_file.as_ref().file_stem().unwrap_or_default().to_string_lossy();
        output_dir
            .as_ref()
            .join(format!("{}.{}.{}", stem, target_language, PRESENTATION_EXTENSION))
    }

    /// Whether a path looks like a presentation we can process.
    ///
    /// Office lock files (`~$deck.pptx`) are skipped.
    pub fn is_presentation<P: AsRef<Path>>(path: P) -> bool {
        let path = path.as_ref();
        let has_extension = path
            .extension()
            .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(PRESENTATION_EXTENSION));
        let is_lock_file = path
            .file_name()
            .is_some_and(|name| name.to_string_lossy().starts_with("~$"));
        has_extension && !is_lock_file
    }

    /// Find presentations in a directory, recursively, in sorted order
    pub fn find_presentations<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
        let mut result = Vec::new();
        for entry in WalkDir::new(dir.as_ref()).follow_links(true).sort_by_file_name() {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();
            if path.is_file() && Self::is_presentation(path) {
                result.push(path.to_path_buf());
            }
        }
        Ok(result)
    }

    /// Expand files and directories given on the command line into input files.
    ///
    /// Files are taken as given; directories are walked for presentations.
    pub fn collect_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut inputs = Vec::new();
        for path in paths {
            if path.is_dir() {
                inputs.extend(Self::find_presentations(path)?);
            } else if path.is_file() {
                inputs.push(path.clone());
            } else {
                return Err(anyhow::anyhow!("Input path does not exist: {:?}", path));
            }
        }
        inputs.dedup();
        Ok(inputs)
    }

    /// Read a whole file
    pub fn read_bytes<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
        fs::read(&path).with_context(|| format!("Failed to read file: {:?}", path.as_ref()))
    }

    /// Write bytes through a temporary file in the target directory, so a
    /// reader never sees a half-written document
    pub fn write_atomic<P: AsRef<Path>>(path: P, content: &[u8]) -> Result<()> {
        let path = path.as_ref();
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self::ensure_dir(&parent)?;

        let mut temp = tempfile::NamedTempFile::new_in(&parent)
            .with_context(|| format!("Failed to create temporary file in {:?}", parent))?;
        temp.write_all(content)
            .with_context(|| format!("Failed to write temporary file for {:?}", path))?;
        temp.persist(path)
            .with_context(|| format!("Failed to move output into place: {:?}", path))?;
        Ok(())
    }
}
