use std::process::Command;
use std::sync::{Arc, Mutex};

use log::info;

use crate::diagnostics::BuildError;
use crate::fs::{FsGateway, MemoryFs};

/// Interface between the core and child processes. `run` blocks until the
/// spawned process exits.
pub trait ProcessSpawner {
    fn run(&self, cmd: &[String]) -> Result<i32, BuildError>;
}

fn cmd_str(cmd: &[String]) -> String {
    cmd.join(" ")
}

/// Production spawner: executes the argument vector directly, resolving the
/// executable via `PATH`. No shell interpretation takes place.
#[derive(Debug, Default)]
pub struct OsProcessSpawner;

impl ProcessSpawner for OsProcessSpawner {
    fn run(&self, cmd: &[String]) -> Result<i32, BuildError> {
        let (program, args) = cmd
            .split_first()
            .ok_or_else(|| BuildError::system("Cannot spawn an empty command"))?;

        info!("{}", cmd_str(cmd));

        let status = Command::new(program).args(args).status().map_err(|err| {
            BuildError::system(format!(
                "Process execution failed for command '{}': {err}",
                cmd_str(cmd)
            ))
        })?;

        if !status.success() {
            return Err(BuildError::system(format!(
                "Command '{}' exited with {status}",
                cmd_str(cmd)
            )));
        }

        Ok(status.code().unwrap_or_default())
    }
}

/// Spawner that records every dispatched command instead of executing it,
/// mimicking each command's effect against a [`MemoryFs`]: `-o` outputs are
/// touched and `rm` targets are removed.
pub struct RecordingSpawner {
    fs: Arc<MemoryFs>,
    commands: Mutex<Vec<Vec<String>>>,
}

impl RecordingSpawner {
    pub fn new(fs: Arc<MemoryFs>) -> Self {
        Self {
            fs,
            commands: Mutex::new(Vec::new()),
        }
    }

    /// Every command dispatched so far, in order.
    pub fn commands(&self) -> Vec<Vec<String>> {
        self.commands.lock().unwrap().clone()
    }
}

impl ProcessSpawner for RecordingSpawner {
    fn run(&self, cmd: &[String]) -> Result<i32, BuildError> {
        self.commands.lock().unwrap().push(cmd.to_vec());

        if cmd.first().map(String::as_str) == Some("rm") {
            for target in &cmd[1..] {
                self.fs.remove(target);
            }
        } else if let Some(flag) = cmd.iter().position(|arg| arg == "-o") {
            if let Some(output) = cmd.get(flag + 1) {
                self.fs.touch(output)?;
            }
        }

        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::diagnostics::ErrorKind;
    use crate::fs::FsGateway;

    fn cmd(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn recording_spawner_touches_outputs() {
        let fs = Arc::new(MemoryFs::new());
        let spawner = RecordingSpawner::new(fs.clone());

        spawner.run(&cmd(&["g++", "a.cpp", "-o", "a.o"])).unwrap();
        assert!(fs.exists("a.o"));
        assert_eq!(spawner.commands(), [cmd(&["g++", "a.cpp", "-o", "a.o"])]);
    }

    #[test]
    fn recording_spawner_removes_rm_targets() {
        let fs = Arc::new(MemoryFs::new());
        fs.touch("app").unwrap();
        fs.touch("a.o").unwrap();
        let spawner = RecordingSpawner::new(fs.clone());

        spawner.run(&cmd(&["rm", "app", "a.o"])).unwrap();
        assert!(!fs.exists("app"));
        assert!(!fs.exists("a.o"));
    }

    #[test]
    fn empty_command_is_a_system_error() {
        let spawner = OsProcessSpawner;
        let err = spawner.run(&[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::System);
    }

    #[test]
    fn missing_executable_is_a_system_error() {
        let spawner = OsProcessSpawner;
        let err = spawner
            .run(&cmd(&["definitely-not-a-real-binary-1b8d"]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::System);
        assert!(err.message().contains("definitely-not-a-real-binary-1b8d"));
    }

    #[test]
    fn non_zero_exit_is_a_system_error() {
        let spawner = OsProcessSpawner;
        let err = spawner.run(&cmd(&["false"])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::System);
    }
}
