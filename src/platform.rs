//! Build variants published on windows.php.net and the naming scheme of
//! their archives.

use regex::Regex;

pub const RUNTIME_NAME: &str = "php";
pub const ARCHIVE_EXTENSION: &str = ".zip";

/// Name of the interpreter binary inside an installed version.
pub fn executable_name() -> &'static str {
    if cfg!(windows) {
        "php.exe"
    } else {
        "php"
    }
}

pub fn normalize_arch(arch: &str) -> String {
    match arch.to_lowercase().as_str() {
        "x86_64" | "amd64" | "x64" => "x64".to_string(),
        "x86" | "i386" | "i686" => "x86".to_string(),
        "aarch64" | "arm64" => "arm64".to_string(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadSafety {
    ThreadSafe,
    NonThreadSafe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toolset {
    Vc15,
    Vc16,
    Vs16,
    Vs17,
}

impl Toolset {
    pub const ALL: [Toolset; 4] = [Toolset::Vc15, Toolset::Vc16, Toolset::Vs16, Toolset::Vs17];

    pub fn tag(self) -> &'static str {
        match self {
            Toolset::Vc15 => "vc15",
            Toolset::Vc16 => "vc16",
            Toolset::Vs16 => "vs16",
            Toolset::Vs17 => "vs17",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildVariant {
    pub thread_safety: ThreadSafety,
    pub toolset: Toolset,
    pub arch: String,
}

impl BuildVariant {
    /// Every known variant for `arch`, most likely first: thread-safe builds
    /// before non-thread-safe ones, older toolsets before newer ones.
    pub fn all(arch: &str) -> Vec<BuildVariant> {
        let arch = normalize_arch(arch);
        [ThreadSafety::ThreadSafe, ThreadSafety::NonThreadSafe]
            .into_iter()
            .flat_map(|thread_safety| {
                let arch = arch.clone();
                Toolset::ALL.into_iter().map(move |toolset| BuildVariant {
                    thread_safety,
                    toolset,
                    arch: arch.clone(),
                })
            })
            .collect()
    }

    /// Everything after the version in an archive name, e.g. `-nts-Win32-vs16-x64`.
    pub fn suffix(&self) -> String {
        let nts = match self.thread_safety {
            ThreadSafety::ThreadSafe => "",
            ThreadSafety::NonThreadSafe => "-nts",
        };
        format!("{}-Win32-{}-{}", nts, self.toolset.tag(), self.arch)
    }

    pub fn file_name(&self, version: &str) -> String {
        format!(
            "{}-{}{}{}",
            RUNTIME_NAME,
            version,
            self.suffix(),
            ARCHIVE_EXTENSION
        )
    }

    /// Matches archives of this variant whose version is `spec` exactly or
    /// `spec` followed by further dot-separated digits. Group 1 is the full
    /// version.
    pub fn pattern(&self, spec: &str) -> Result<Regex, regex::Error> {
        let pattern = format!(
            r"{}-({}(?:\.\d+)*){}{}",
            RUNTIME_NAME,
            regex::escape(spec),
            regex::escape(&self.suffix()),
            regex::escape(ARCHIVE_EXTENSION)
        );
        Regex::new(&pattern)
    }
}
