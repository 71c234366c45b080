use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

pub const PATCH_FILE: &str = "solution.patch";

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Failed to read instance {path}: {source}")]
    InstanceRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid instance file: {0}")]
    InstanceFormat(#[from] serde_json::Error),

    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("`{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A candidate fix: the repository, the commit it applies to, and the diff
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Instance {
    pub repo: String,
    pub base_commit: String,
    pub patch: String,
}

impl Instance {
    pub fn load(path: &Path) -> Result<Self, HarnessError> {
        let text = fs::read_to_string(path).map_err(|source| HarnessError::InstanceRead {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Checkout directory name, `owner/name` becomes `owner__name`
    pub fn repo_dir(&self) -> String {
        self.repo.replace('/', "__")
    }

    pub fn clone_url(&self) -> String {
        format!("https://github.com/{}.git", self.repo)
    }
}

/// How a checkout's Python dependencies get installed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStrategy {
    Requirements,
    SetupPy,
    Pyproject,
}

impl InstallStrategy {
    /// First match wins: requirements.txt, then setup.py, then pyproject.toml
    pub fn detect(repo: &Path) -> Option<Self> {
        [
            ("requirements.txt", InstallStrategy::Requirements),
            ("setup.py", InstallStrategy::SetupPy),
            ("pyproject.toml", InstallStrategy::Pyproject),
        ]
        .into_iter()
        .find(|(marker, _)| repo.join(marker).exists())
        .map(|(_, strategy)| strategy)
    }

    pub fn pip_args(&self) -> &'static [&'static str] {
        match self {
            InstallStrategy::Requirements => &["install", "-r", "requirements.txt"],
            InstallStrategy::SetupPy => &["install", "-e", "."],
            InstallStrategy::Pyproject => &["install", "."],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    TestsFailed { stdout: String },
    PatchFailed { stderr: String },
}

impl Outcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Passed => 0,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Runs external programs; swapped out in tests
pub trait CommandRunner {
    fn run(&self, program: &str, args: &[&str], cwd: &Path) -> Result<CommandOutput, HarnessError>;
}

pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str], cwd: &Path) -> Result<CommandOutput, HarnessError> {
        tracing::debug!(program, ?args, cwd = %cwd.display(), "running command");
        let output = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .output()
            .map_err(|source| HarnessError::Spawn {
                program: program.to_string(),
                source,
            })?;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

pub struct Harness<R: CommandRunner> {
    workdir: PathBuf,
    runner: R,
}

impl<R: CommandRunner> Harness<R> {
    pub fn new<P: Into<PathBuf>>(workdir: P, runner: R) -> Self {
        Self {
            workdir: workdir.into(),
            runner,
        }
    }

    /// Check out the instance, apply its patch and run the test suite
    pub fn evaluate(&self, instance: &Instance) -> Result<Outcome, HarnessError> {
        let repo_path = self.workdir.join(instance.repo_dir());

        if !repo_path.exists() {
            tracing::info!(repo = %instance.repo, "cloning");
            // The target is relative to the workdir, which is also the cwd
            self.run_checked(
                "git",
                &["clone", &instance.clone_url(), &instance.repo_dir()],
                &self.workdir,
            )?;
        }

        tracing::info!(commit = %instance.base_commit, "checking out base commit");
        self.run_checked("git", &["checkout", &instance.base_commit], &repo_path)?;

        self.install_dependencies(&repo_path)?;

        let patch_path = repo_path.join(PATCH_FILE);
        fs::write(&patch_path, &instance.patch).map_err(|source| HarnessError::Write {
            path: patch_path.clone(),
            source,
        })?;

        let applied = self.runner.run("git", &["apply", PATCH_FILE], &repo_path)?;
        if !applied.success {
            tracing::warn!("patch did not apply");
            return Ok(Outcome::PatchFailed {
                stderr: applied.stderr,
            });
        }

        let tests = self.runner.run("pytest", &["-q"], &repo_path)?;
        if tests.success {
            Ok(Outcome::Passed)
        } else {
            Ok(Outcome::TestsFailed {
                stdout: tests.stdout,
            })
        }
    }

    /// Install failures are logged and the run continues; the test suite reports what is missing
    fn install_dependencies(&self, repo_path: &Path) -> Result<(), HarnessError> {
        let Some(strategy) = InstallStrategy::detect(repo_path) else {
            tracing::info!("no dependency manifest found, skipping install");
            return Ok(());
        };

        tracing::info!(?strategy, "installing dependencies");
        let output = self.runner.run("pip", strategy.pip_args(), repo_path)?;
        if !output.success {
            tracing::warn!("dependency install failed: {}", output.stderr.trim());
        }
        Ok(())
    }

    fn run_checked(&self, program: &str, args: &[&str], cwd: &Path) -> Result<(), HarnessError> {
        let output = self.runner.run(program, args, cwd)?;
        if output.success {
            Ok(())
        } else {
            Err(HarnessError::CommandFailed {
                command: format!("{} {}", program, args.join(" ")),
                stderr: output.stderr.trim().to_string(),
            })
        }
    }
}
