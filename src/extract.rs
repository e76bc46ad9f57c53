//! Archive extraction. Several interchangeable extractors are tried in order
//! and the first one that succeeds wins.

use crate::error::{PvmError, PvmResult};
use crate::fs_util::clear_dir_contents;
use anyhow::{anyhow, Result};
use flate2::read::GzDecoder;
use std::fs;
use std::io;
use std::path::Path;
use std::process::Command;
use tar::Archive;

pub trait Extractor {
    fn name(&self) -> &str;
    fn extract(&self, archive_path: &Path, dest: &Path) -> Result<()>;
}

/// In-process extraction of zip, tar.gz and tar.xz archives.
pub struct NativeExtractor;

impl Extractor for NativeExtractor {
    fn name(&self) -> &str {
        "built-in"
    }

    fn extract(&self, archive_path: &Path, dest: &Path) -> Result<()> {
        let name = archive_path.to_string_lossy().to_lowercase();
        if name.ends_with(".zip") {
            extract_zip(archive_path, dest)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            extract_tar_gz(archive_path, dest)
        } else if name.ends_with(".tar.xz") {
            extract_tar_xz(archive_path, dest)
        } else {
            Err(anyhow!(
                "Unsupported archive format: {}",
                archive_path.display()
            ))
        }
    }
}

fn extract_zip(archive_path: &Path, dest: &Path) -> Result<()> {
    let file = fs::File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(relative) = entry.enclosed_name().map(|p| p.to_path_buf()) else {
            tracing::warn!("Skipping unsafe path in zip: {}", entry.name());
            continue;
        };
        let outpath = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&outpath)?;
        } else {
            if let Some(parent) = outpath.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut outfile = fs::File::create(&outpath)?;
            io::copy(&mut entry, &mut outfile)?;
        }
    }

    Ok(())
}

fn extract_tar_gz(archive_path: &Path, dest: &Path) -> Result<()> {
    let file = fs::File::open(archive_path)?;
    Archive::new(GzDecoder::new(file)).unpack(dest)?;
    Ok(())
}

fn extract_tar_xz(archive_path: &Path, dest: &Path) -> Result<()> {
    let file = fs::File::open(archive_path)?;
    Archive::new(xz2::read::XzDecoder::new(file)).unpack(dest)?;
    Ok(())
}

/// Shells out to an external unpacker.
pub struct CommandExtractor {
    name: String,
    program: String,
    args: fn(&Path, &Path) -> Vec<String>,
}

impl CommandExtractor {
    pub fn new(name: &str, program: &str, args: fn(&Path, &Path) -> Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            program: program.to_string(),
            args,
        }
    }

    pub fn seven_zip() -> Self {
        Self::new("7-Zip", "7z", |archive, dest| {
            vec![
                "x".to_string(),
                format!("-o{}", dest.display()),
                "-y".to_string(),
                archive.display().to_string(),
            ]
        })
    }

    pub fn powershell() -> Self {
        Self::new("PowerShell Expand-Archive", "powershell", |archive, dest| {
            vec![
                "-NoProfile".to_string(),
                "-Command".to_string(),
                format!(
                    "Expand-Archive -Path '{}' -DestinationPath '{}' -Force",
                    archive.display().to_string().replace('\'', "''"),
                    dest.display().to_string().replace('\'', "''")
                ),
            ]
        })
    }

    pub fn unzip() -> Self {
        Self::new("unzip", "unzip", |archive, dest| {
            vec![
                "-o".to_string(),
                archive.display().to_string(),
                "-d".to_string(),
                dest.display().to_string(),
            ]
        })
    }
}

impl Extractor for CommandExtractor {
    fn name(&self) -> &str {
        &self.name
    }

    fn extract(&self, archive_path: &Path, dest: &Path) -> Result<()> {
        let args = (self.args)(archive_path, dest);
        tracing::debug!("Running {} {:?}", self.program, args);

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|e| anyhow!("could not run {}: {}", self.program, e))?;

        if !output.status.success() {
            return Err(anyhow!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(())
    }
}

pub struct ExtractorChain {
    extractors: Vec<Box<dyn Extractor>>,
}

impl Default for ExtractorChain {
    fn default() -> Self {
        Self::new(vec![
            Box::new(NativeExtractor),
            Box::new(CommandExtractor::seven_zip()),
            Box::new(CommandExtractor::powershell()),
            Box::new(CommandExtractor::unzip()),
        ])
    }
}

impl ExtractorChain {
    pub fn new(extractors: Vec<Box<dyn Extractor>>) -> Self {
        Self { extractors }
    }

    /// Unpacks `archive_path` into `dest` with the first extractor that
    /// succeeds and returns its name. `dest` is emptied between attempts.
    pub fn extract(&self, archive_path: &Path, dest: &Path) -> PvmResult<String> {
        fs::create_dir_all(dest).map_err(|e| PvmError::fs("create", dest, e))?;

        let mut attempts = Vec::new();
        for extractor in &self.extractors {
            tracing::info!(
                "Extracting {} with {}",
                archive_path.display(),
                extractor.name()
            );
            match extractor.extract(archive_path, dest) {
                Ok(()) => return Ok(extractor.name().to_string()),
                Err(e) => {
                    tracing::warn!("{} could not extract: {:#}", extractor.name(), e);
                    attempts.push(format!("{}: {:#}", extractor.name(), e));
                    clear_dir_contents(dest)?;
                }
            }
        }

        Err(PvmError::ExtractionExhausted {
            archive: archive_path.to_path_buf(),
            attempts,
        })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::io::Write;
    use zip::write::FileOptions;

    /// Builds an in-memory zip holding `files` (path, contents). Paths ending
    /// in `/` become directories.
    pub fn zip_bytes(files: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        for (name, contents) in files {
            if name.ends_with('/') {
                writer.add_directory(*name, FileOptions::default()).unwrap();
            } else {
                writer.start_file(*name, FileOptions::default()).unwrap();
                writer.write_all(contents.as_bytes()).unwrap();
            }
        }
        writer.finish().unwrap().into_inner()
    }
}
