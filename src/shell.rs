//! Running shell commands on this machine and on the other machines of the testbed.
//!
//! A nonzero exit code is not an error at this level: it is returned to the caller, who decides
//! whether to escalate. Only transport failures (unable to spawn `bash`, unable to open an SSH
//! session) are reported as `Err`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use failure::ResultExt;

use spurs::{cmd, Execute, SshError, SshShell};

use crate::config::Machine;
use crate::paths::REMOTE_BASHRC;

/// The outcome of one command.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShellOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ShellOutput {
    pub fn ok(stdout: &str) -> Self {
        ShellOutput {
            exit_code: 0,
            stdout: stdout.to_owned(),
            stderr: String::new(),
        }
    }

    pub fn failed(exit_code: i32, stderr: &str) -> Self {
        ShellOutput {
            exit_code,
            stdout: String::new(),
            stderr: stderr.to_owned(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// The text to show the operator when the command failed.
    pub fn errstr(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            format!("exit code {}", self.exit_code)
        } else {
            stderr.to_owned()
        }
    }
}

/// Something that can run commands locally and on the other machines.
pub trait Shell {
    /// Run a command on this machine with `bash`. With `capture = false`, the child inherits the
    /// standard streams and the returned output is empty.
    fn run(&self, command: &str, capture: bool) -> Result<ShellOutput, failure::Error>;

    /// Run a command on another machine. The remote shell sources the non-interactive bashrc
    /// first. With `background = true`, the command is expected to detach itself (e.g. `nohup
    /// ... &`), and we return as soon as the remote shell exits.
    fn remote(
        &self,
        machine: &Machine,
        command: &str,
        background: bool,
    ) -> Result<ShellOutput, failure::Error>;

    /// Copy a local file to the same or another path on another machine.
    fn copy_to(
        &self,
        machine: &Machine,
        local: &Path,
        remote: &Path,
    ) -> Result<ShellOutput, failure::Error>;
}

/// Quote a string for use as one word in a `bash` command line.
pub fn quote<S: AsRef<str>>(s: S) -> String {
    format!("'{}'", spurs_util::escape_for_bash(s.as_ref()))
}

/// The real thing: `bash` for local commands, SSH (via `spurs`) for remote ones, and `scp` for
/// copies. One SSH session per machine is opened lazily and reused.
pub struct SystemShell {
    username: String,
    key: PathBuf,
    sessions: RefCell<HashMap<String, SshShell>>,
}

impl SystemShell {
    pub fn new(username: &str, key: &Path) -> Self {
        SystemShell {
            username: username.to_owned(),
            key: key.to_path_buf(),
            sessions: RefCell::new(HashMap::new()),
        }
    }

    fn with_session<T>(
        &self,
        machine: &Machine,
        f: impl FnOnce(&SshShell) -> T,
    ) -> Result<T, failure::Error> {
        let mut sessions = self.sessions.borrow_mut();
        if !sessions.contains_key(&machine.public_ip) {
            let addr = format!("{}:22", machine.public_ip);
            let shell = SshShell::with_key(&self.username, &addr, &self.key).with_context(|_| {
                format!(
                    "connecting to {}@{} with key {}",
                    self.username,
                    machine.public_ip,
                    self.key.display()
                )
            })?;
            sessions.insert(machine.public_ip.clone(), shell);
        }

        let shell = sessions
            .get(&machine.public_ip)
            .ok_or_else(|| failure::format_err!("no session for {}", machine.public_ip))?;

        Ok(f(shell))
    }
}

impl Shell for SystemShell {
    fn run(&self, command: &str, capture: bool) -> Result<ShellOutput, failure::Error> {
        log::debug!("[shell] {}", command);

        let mut child = Command::new("bash");
        child.arg("-c").arg(command);

        if capture {
            let output = child
                .output()
                .with_context(|_| format!("spawning `{}`", command))?;
            Ok(ShellOutput {
                exit_code: output.status.code().unwrap_or(-1),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        } else {
            let status = child
                .stdin(Stdio::null())
                .status()
                .with_context(|_| format!("spawning `{}`", command))?;
            Ok(ShellOutput {
                exit_code: status.code().unwrap_or(-1),
                ..ShellOutput::default()
            })
        }
    }

    fn remote(
        &self,
        machine: &Machine,
        command: &str,
        background: bool,
    ) -> Result<ShellOutput, failure::Error> {
        let wrapped = format!("source {} && {}", REMOTE_BASHRC, command);
        log::debug!("[shell] {}@{}: {}", self.username, machine.public_ip, wrapped);

        let result = self.with_session(machine, |shell| {
            let cmd = cmd!("{}", wrapped).use_bash();
            // Without a pty, the remote shell exits as soon as the detached child is forked.
            let cmd = if background { cmd.no_pty() } else { cmd };
            shell.run(cmd)
        })?;

        match result {
            Ok(output) => Ok(ShellOutput {
                exit_code: 0,
                stdout: output.stdout,
                stderr: output.stderr,
            }),
            Err(SshError::NonZeroExit { exit, .. }) => Ok(ShellOutput::failed(
                exit as i32,
                &format!("non-zero exit ({}) on {}", exit, machine.public_ip),
            )),
            Err(err) => Err(err.into()),
        }
    }

    fn copy_to(
        &self,
        machine: &Machine,
        local: &Path,
        remote: &Path,
    ) -> Result<ShellOutput, failure::Error> {
        let mut scp = Command::new("scp");
        scp.arg("-i")
            .arg(&self.key)
            .arg(local)
            .arg(format!(
                "{}@{}:{}",
                self.username,
                machine.public_ip,
                remote.display()
            ));

        log::debug!("[shell] {:?}", scp);

        let output = scp.output().context("spawning scp")?;

        Ok(ShellOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// A scripted shell for tests. Every command is recorded, and the reply comes from a closure.
#[cfg(test)]
pub mod testing {
    use super::*;

    /// Where a recorded command ran.
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum Target {
        Local,
        Remote { ip: String, background: bool },
        Copy { ip: String },
    }

    #[derive(Clone, Debug)]
    pub struct Call {
        pub target: Target,
        pub command: String,
    }

    impl Call {
        /// The IP of the machine the command ran on, or `None` for local commands.
        pub fn ip(&self) -> Option<&str> {
            match &self.target {
                Target::Local => None,
                Target::Remote { ip, .. } | Target::Copy { ip } => Some(ip.as_str()),
            }
        }
    }

    type Responder = Box<dyn Fn(&Call) -> ShellOutput>;

    pub struct ScriptedShell {
        pub calls: RefCell<Vec<Call>>,
        responder: Responder,
    }

    impl ScriptedShell {
        pub fn new(responder: impl Fn(&Call) -> ShellOutput + 'static) -> Self {
            ScriptedShell {
                calls: RefCell::new(vec![]),
                responder: Box::new(responder),
            }
        }

        /// A shell where every command succeeds with empty output.
        pub fn succeeding() -> Self {
            Self::new(|_| ShellOutput::ok(""))
        }

        pub fn commands(&self) -> Vec<String> {
            self.calls
                .borrow()
                .iter()
                .map(|c| c.command.clone())
                .collect()
        }

        /// Recorded calls whose command contains `needle`.
        pub fn matching(&self, needle: &str) -> Vec<Call> {
            self.calls
                .borrow()
                .iter()
                .filter(|c| c.command.contains(needle))
                .cloned()
                .collect()
        }

        fn record(&self, call: Call) -> ShellOutput {
            let out = (self.responder)(&call);
            self.calls.borrow_mut().push(call);
            out
        }
    }

    impl Shell for ScriptedShell {
        fn run(&self, command: &str, _capture: bool) -> Result<ShellOutput, failure::Error> {
            Ok(self.record(Call {
                target: Target::Local,
                command: command.to_owned(),
            }))
        }

        fn remote(
            &self,
            machine: &Machine,
            command: &str,
            background: bool,
        ) -> Result<ShellOutput, failure::Error> {
            Ok(self.record(Call {
                target: Target::Remote {
                    ip: machine.public_ip.clone(),
                    background,
                },
                command: command.to_owned(),
            }))
        }

        fn copy_to(
            &self,
            machine: &Machine,
            local: &Path,
            remote: &Path,
        ) -> Result<ShellOutput, failure::Error> {
            Ok(self.record(Call {
                target: Target::Copy {
                    ip: machine.public_ip.clone(),
                },
                command: format!("copy {} {}", local.display(), remote.display()),
            }))
        }
    }
}
