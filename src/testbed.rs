//! Operations on the machines of the testbed: launching binaries in the background, checking
//! their logs for markers, killing them by name, and pushing files to the cloud machine.
//!
//! Commands for the current machine run locally; everything else goes over SSH.

use std::path::Path;

use crate::config::{Machine, Topology};
use crate::logger;
use crate::role::Role;
use crate::shell::{quote, Shell, ShellOutput};
use crate::HarnessError;

/// Result of grepping a log file for a marker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MarkerStatus {
    Present,
    Absent,
    /// The check itself failed (e.g. unreadable log, SSH trouble).
    Failed(String),
}

/// The testbed as seen from the current machine.
pub struct Testbed<S: Shell> {
    pub shell: S,
    pub topology: Topology,
    /// Index of the machine the harness runs on.
    pub current: usize,
    /// Project directory. The binaries live here on every machine.
    pub proj_dir: String,
    pub username: String,
}

impl<S: Shell> Testbed<S> {
    pub fn new(
        shell: S,
        topology: Topology,
        current: usize,
        proj_dir: &Path,
        username: &str,
    ) -> Self {
        Testbed {
            shell,
            topology,
            current,
            proj_dir: proj_dir.display().to_string(),
            username: username.to_owned(),
        }
    }

    pub fn machine(&self, idx: usize) -> Result<&Machine, failure::Error> {
        self.topology.machine(idx)
    }

    pub fn is_current(&self, idx: usize) -> bool {
        idx == self.current
    }

    /// Run a command on the given machine and wait for it.
    pub fn exec(&self, idx: usize, command: &str) -> Result<ShellOutput, failure::Error> {
        if self.is_current(idx) {
            self.shell.run(command, true)
        } else {
            self.shell.remote(self.machine(idx)?, command, false)
        }
    }

    /// Start `role`'s binary on the given machine with the given CLI, detached from us, with both
    /// output streams going to `logfile` (relative to the project directory unless absolute).
    pub fn launch(
        &self,
        idx: usize,
        role: Role,
        cli: &str,
        logfile: &str,
    ) -> Result<ShellOutput, failure::Error> {
        let command = format!(
            "cd {} && nohup {} {} > {} 2>&1 < /dev/null &",
            quote(&self.proj_dir),
            role.binary(),
            cli,
            quote(logfile)
        );

        if self.is_current(idx) {
            self.shell.run(&command, false)
        } else {
            self.shell.remote(self.machine(idx)?, &command, true)
        }
    }

    /// Look for `marker` in `logfile` on the given machine.
    pub fn check_marker(
        &self,
        idx: usize,
        logfile: &str,
        marker: &str,
    ) -> Result<MarkerStatus, failure::Error> {
        let command = format!(
            "cd {} && grep -F -- {} {}",
            quote(&self.proj_dir),
            quote(marker),
            quote(logfile)
        );

        let out = self.exec(idx, &command)?;
        Ok(match out.exit_code {
            0 if !out.stdout.trim().is_empty() => MarkerStatus::Present,
            0 | 1 => MarkerStatus::Absent,
            _ => MarkerStatus::Failed(out.errstr()),
        })
    }

    /// Kill every process of the operator whose command line contains `binary` on the given
    /// machine. Processes that are already gone are not an error.
    ///
    /// Every PID gets a kill attempt even if an earlier one failed; the first failure is
    /// returned afterwards.
    pub fn kill_component(&self, idx: usize, binary: &str) -> Result<(), failure::Error> {
        let list = format!(
            "ps -aux | grep -F -- {} | grep -v grep | grep -F -- {} | awk '{{print $2}}'",
            quote(binary),
            quote(&self.username)
        );
        let out = self.exec(idx, &list)?;
        let pids: Vec<&str> = if out.success() {
            out.stdout.split_whitespace().collect()
        } else {
            // Nothing to kill.
            log::debug!("`{}` exited with {}", list, out.exit_code);
            vec![]
        };
        if let Some(bad) = pids.iter().find(|p| !p.chars().all(|c| c.is_ascii_digit())) {
            return Err(HarnessError::CleanupResidual {
                machine: idx,
                binary: binary.to_owned(),
                errmsg: format!("pid {} is not numeric; output of `{}` is {:?}", bad, list, out.stdout),
            }
            .into());
        }

        let mut residual = None;
        for pid in pids {
            let out = self.exec(idx, &format!("kill -9 {}", pid))?;
            if !out.success() {
                let err = HarnessError::CleanupResidual {
                    machine: idx,
                    binary: binary.to_owned(),
                    errmsg: out.errstr(),
                };
                logger::die_no_exit(&err.to_string());
                residual.get_or_insert(err);
            }
        }

        match residual {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    /// Make sure the cloud machine has a copy of `path` (same absolute path). Nothing to do if
    /// the current machine is the cloud or the cloud already has the file.
    pub fn copy_to_cloud(&self, path: &Path) -> Result<(), failure::Error> {
        let cloud = self.topology.cloud;
        if self.is_current(cloud) {
            return Ok(());
        }

        let machine = self.machine(cloud)?;
        let remote_path = path.display().to_string();

        let exists = self
            .shell
            .remote(machine, &format!("test -e {}", quote(&remote_path)), false)?;
        if exists.success() {
            logger::prompt(&format!(
                "{} already exists in cloud machine {}, skip copying",
                remote_path, machine.public_ip
            ));
            return Ok(());
        }

        if let Some(parent) = path.parent() {
            let parent = parent.display().to_string();
            let mkdir = self
                .shell
                .remote(machine, &format!("mkdir -p {}", quote(&parent)), false)?;
            if !mkdir.success() {
                failure::bail!(
                    "failed to create {} in cloud machine {} (errmsg: {})",
                    parent,
                    machine.public_ip,
                    mkdir.errstr()
                );
            }
        }

        logger::prompt(&format!(
            "copy {} to cloud machine {}...",
            remote_path, machine.public_ip
        ));
        let copy = self.shell.copy_to(machine, path, path)?;
        if !copy.success() {
            failure::bail!(
                "failed to copy {} to cloud machine {} (errmsg: {})",
                remote_path,
                machine.public_ip,
                copy.errstr()
            );
        }

        Ok(())
    }
}
