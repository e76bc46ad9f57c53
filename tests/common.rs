use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Nothing listens here, so network lookups fail fast.
pub const UNREACHABLE_URL: &str = "http://127.0.0.1:9/";

// Not every test binary uses every helper.
#[allow(dead_code)]
pub struct TestContext {
    pub _temp_dir: TempDir,
    pub config_path: PathBuf,
    pub home_dir: PathBuf,
    pub profile_path: PathBuf,
    pub bin_path: PathBuf,
}

#[allow(dead_code)]
impl TestContext {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("config").join("config.json");
        let home_dir = temp_dir.path().join("pvm");
        let profile_path = temp_dir.path().join("profile").join(".bashrc");

        let bin_path = PathBuf::from(env!("CARGO_BIN_EXE_pvm"));

        Self {
            _temp_dir: temp_dir,
            config_path,
            home_dir,
            profile_path,
            bin_path,
        }
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.home_dir.join("phps")
    }

    pub fn activation_dir(&self) -> PathBuf {
        self.home_dir.join("php_home")
    }

    /// Creates an installed-looking version directory under the install root.
    pub fn fake_version(&self, dir_name: &str) -> PathBuf {
        let dir = self.versions_dir().join(dir_name);
        std::fs::create_dir_all(dir.join("ext")).expect("Failed to create version dir");
        std::fs::write(dir.join(executable_name()), dir_name).expect("Failed to write php");
        dir
    }

    pub fn cmd(&self) -> Command {
        let mut cmd = Command::new(&self.bin_path);
        cmd.env("PVM_CONFIG_PATH", &self.config_path);
        cmd.env("PVM_HOME", &self.home_dir);
        cmd.env("PVM_INDEX_URL", UNREACHABLE_URL);
        cmd.env("PVM_RELEASE_URL", UNREACHABLE_URL);
        cmd.env("PVM_ARCHIVE_URL", UNREACHABLE_URL);
        cmd.env("PVM_SHELL_PROFILE", &self.profile_path);
        cmd.env_remove("PVM_UPDATE_PROFILE");
        cmd.env_remove("PVM_VERSIONS_DIR");
        cmd.env_remove("PVM_ACTIVATION_DIR");
        cmd.env_remove("PVM_SPAWN_SHELL");
        cmd.env_remove("RUST_LOG");
        cmd
    }

    /// Like `cmd`, but talks to the real release servers.
    pub fn online_cmd(&self) -> Command {
        let mut cmd = self.cmd();
        cmd.env_remove("PVM_INDEX_URL");
        cmd.env_remove("PVM_RELEASE_URL");
        cmd.env_remove("PVM_ARCHIVE_URL");
        cmd
    }
}

#[allow(dead_code)]
pub fn executable_name() -> &'static str {
    if cfg!(windows) {
        "php.exe"
    } else {
        "php"
    }
}

#[allow(dead_code)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: std::process::ExitStatus,
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            status: output.status,
        }
    }
}

#[allow(dead_code)]
impl CommandOutput {
    pub fn assert_success(&self) -> &Self {
        if !self.status.success() {
            panic!(
                "Command failed with status {:?}\nstdout: {}\nstderr: {}",
                self.status.code(),
                self.stdout,
                self.stderr
            );
        }
        self
    }

    pub fn assert_failure(&self) -> &Self {
        assert_eq!(
            self.status.code(),
            Some(1),
            "Expected exit code 1\nstdout: {}\nstderr: {}",
            self.stdout,
            self.stderr
        );
        self
    }

    pub fn assert_stdout_contains(&self, text: &str) -> &Self {
        assert!(
            self.stdout.contains(text),
            "Stdout did not contain '{}'\nActual stdout: {}",
            text,
            self.stdout
        );
        self
    }

    pub fn assert_stderr_contains(&self, text: &str) -> &Self {
        assert!(
            self.stderr.contains(text),
            "Stderr did not contain '{}'\nActual stderr: {}",
            text,
            self.stderr
        );
        self
    }
}
