//! Running one evaluation binary to completion on the current machine: launch it into a log file,
//! poll the log for its completion marker, then kill it.
//!
//! The bookkeeping of launched components (`ComponentMap`) and the polling loop are shared with
//! the multi-machine orchestrator in `prototype`.

use std::time::{Duration, Instant};

use crate::cliutil::{self, CliStrings, Settings};
use crate::config::{Machine, Topology};
use crate::logger;
use crate::role::{Placement, Role};
use crate::shell::Shell;
use crate::testbed::{MarkerStatus, Testbed};
use crate::HarnessError;

/// The waits of a launch. None of them can be interrupted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timing {
    /// Before the first readiness check.
    pub readiness_delay: Duration,
    /// Between two completion checks.
    pub poll_interval: Duration,
    /// Between two completion checks of the total statistics loader.
    pub fast_poll_interval: Duration,
    /// After completion, before the kill, so that workers blocked on UDP sockets time out.
    pub drain_delay: Duration,
    /// Give up polling for a completion marker after this long. Off by default: benchmarks can
    /// run for hours.
    pub deadline: Option<Duration>,
}

impl Timing {
    pub fn standard() -> Self {
        Timing {
            readiness_delay: Duration::from_millis(500),
            poll_interval: Duration::from_secs(5),
            fast_poll_interval: Duration::from_secs(1),
            drain_delay: Duration::from_secs(5),
            deadline: None,
        }
    }

    /// No waiting at all.
    pub fn immediate() -> Self {
        Timing {
            readiness_delay: Duration::from_secs(0),
            poll_interval: Duration::from_secs(0),
            fast_poll_interval: Duration::from_secs(0),
            drain_delay: Duration::from_secs(0),
            deadline: None,
        }
    }

    pub fn with_deadline(self, deadline: Option<Duration>) -> Self {
        Timing { deadline, ..self }
    }

    pub fn poll_interval_for(&self, role: Role) -> Duration {
        match role {
            Role::TotalStatisticsLoader => self.fast_poll_interval,
            _ => self.poll_interval,
        }
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self::standard()
    }
}

/// A launched binary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentHandle {
    pub machine: Machine,
    pub role: Role,
    pub logfile: String,
}

/// Launched components, grouped by machine, in launch order.
#[derive(Clone, Debug, Default)]
pub struct ComponentMap {
    per_machine: Vec<(usize, Vec<ComponentHandle>)>,
}

impl ComponentMap {
    pub fn record(&mut self, handle: ComponentHandle) {
        let idx = handle.machine.index;
        match self.per_machine.iter_mut().find(|(i, _)| *i == idx) {
            Some((_, handles)) => handles.push(handle),
            None => self.per_machine.push((idx, vec![handle])),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.per_machine.is_empty()
    }

    pub fn handles(&self) -> impl Iterator<Item = &ComponentHandle> {
        self.per_machine.iter().flat_map(|(_, handles)| handles.iter())
    }

    /// Kill every recorded component. Every kill is attempted; the failures are returned.
    pub fn teardown<S: Shell>(&self, testbed: &Testbed<S>) -> Vec<failure::Error> {
        let mut errors = vec![];

        for handle in self.handles() {
            if let Err(err) = testbed.kill_component(handle.machine.index, handle.role.binary()) {
                logger::warn(&format!(
                    "{} on machine {} may still be running: {}",
                    handle.role, handle.machine.index, err
                ));
                errors.push(err);
            }
        }

        errors
    }
}

/// Check that `role` may be launched on the current machine.
pub fn check_placement(role: Role, topology: &Topology, current: usize) -> Result<(), failure::Error> {
    let mismatch = |msg: String| -> Result<(), failure::Error> {
        Err(HarnessError::PreconditionMismatch { msg }.into())
    };

    match role.placement() {
        Placement::Orchestrated | Placement::Anywhere => Ok(()),

        Placement::Cloud if topology.cloud != current => mismatch(format!(
            "cloud machine idx MUST be current machine idx for {}",
            role
        )),
        Placement::Evaluator if topology.evaluator != current => mismatch(format!(
            "evaluator machine idx MUST be current machine idx for {}",
            role
        )),
        Placement::AnyClient if !topology.clients.contains(&current) => mismatch(format!(
            "current machine idx {} MUST be one of client machine idxes {:?} for {}",
            current, topology.clients, role
        )),

        Placement::AllRolesHere => {
            if topology.evaluator != current {
                mismatch(format!(
                    "evaluator machine idx MUST be current machine idx for {}",
                    role
                ))
            } else if topology.cloud != current {
                mismatch(format!(
                    "cloud machine idx MUST be current machine idx for {}",
                    role
                ))
            } else if topology.edges != [current] {
                mismatch(format!(
                    "edge machine idxes MUST be current machine idx for {}",
                    role
                ))
            } else if topology.clients != [current] {
                mismatch(format!(
                    "client machine idxes MUST be current machine idx for {}",
                    role
                ))
            } else {
                Ok(())
            }
        }

        Placement::Cloud | Placement::Evaluator | Placement::AnyClient => Ok(()),
    }
}

/// Poll `logfile` on machine `idx` until `marker` shows up. Each round sleeps first, then
/// checks. An absent marker or a failed check means "not yet".
pub fn wait_for_marker<S: Shell>(
    testbed: &Testbed<S>,
    idx: usize,
    logfile: &str,
    marker: &str,
    interval: Duration,
    deadline: Option<Duration>,
) -> Result<(), failure::Error> {
    let start = Instant::now();

    loop {
        std::thread::sleep(interval);

        match testbed.check_marker(idx, logfile, marker)? {
            MarkerStatus::Present => return Ok(()),
            MarkerStatus::Absent => {}
            MarkerStatus::Failed(errmsg) => {
                log::debug!("checking {} for `{}` failed: {}", logfile, marker, errmsg)
            }
        }

        if let Some(deadline) = deadline {
            if start.elapsed() >= deadline {
                return Err(HarnessError::MarkerAbsent {
                    msg: format!(
                        "`{}` did not appear in {} on machine {} within {:?}",
                        marker, logfile, idx, deadline
                    ),
                }
                .into());
            }
        }
    }
}

/// Runs one single-host binary: DatasetLoader, TotalStatisticsLoader, TracePreprocessor,
/// Simulator, SingleNodeSimulator or SingleNodePrototype.
pub struct RoleLauncher<'t, S: Shell> {
    testbed: &'t Testbed<S>,
    role: Role,
    settings: Settings,
    logfile: String,
    timing: Timing,
    cli: Option<CliStrings>,
}

impl<'t, S: Shell> RoleLauncher<'t, S> {
    pub fn new(testbed: &'t Testbed<S>, role: Role, settings: Settings) -> Self {
        RoleLauncher {
            testbed,
            role,
            settings,
            logfile: role.default_logfile().to_owned(),
            timing: Timing::standard(),
            cli: None,
        }
    }

    pub fn logfile(mut self, logfile: &str) -> Self {
        self.logfile = logfile.to_owned();
        self
    }

    pub fn timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    /// Use these command lines instead of asking `./cliutil`.
    pub fn cli_strings(mut self, cli: CliStrings) -> Self {
        self.cli = Some(cli);
        self
    }

    /// Launch, wait for completion and clean up. Whatever happens after the launch, the binary is
    /// killed before returning.
    pub fn run(&self) -> Result<(), failure::Error> {
        let role = self.role;

        // Nothing has been launched yet, so there is nothing to clean up.
        check_placement(role, &self.testbed.topology, self.testbed.current)?;

        let mut launched = ComponentMap::default();
        let result = self.launch_and_wait(&mut launched);

        match &result {
            Ok(()) => {
                logger::prompt("wait for all launched threads to finish...");
                std::thread::sleep(self.timing.drain_delay);
            }
            Err(err) => logger::die_no_exit(&err.to_string()),
        }

        let residuals = launched.teardown(self.testbed);
        if !residuals.is_empty() {
            logger::warn(&format!(
                "{} component(s) of {} may still be running",
                residuals.len(),
                role
            ));
        }

        match result {
            Ok(()) => {
                logger::emphasize(&format!("cleanup {} successfully", role));
                Ok(())
            }
            Err(err) => {
                logger::die_no_exit(&format!("failed to launch {}", role));
                Err(err)
            }
        }
    }

    fn launch_and_wait(&self, launched: &mut ComponentMap) -> Result<(), failure::Error> {
        let role = self.role;
        let current = self.testbed.current;

        let cli = match &self.cli {
            Some(cli) => cli.clone(),
            None => cliutil::compose(self.testbed, &self.settings)?,
        };
        let cli = cli.get(role)?;

        let out = self.testbed.launch(current, role, cli, &self.logfile)?;
        launched.record(ComponentHandle {
            machine: self.testbed.machine(current)?.clone(),
            role,
            logfile: self.logfile.clone(),
        });
        if !out.success() {
            return Err(HarnessError::SpawnFailure {
                what: role.name().to_owned(),
                errmsg: out.errstr(),
            }
            .into());
        }

        let marker = role
            .completion_marker()
            .ok_or_else(|| failure::format_err!("{} has no completion marker", role))?;
        let (waiting, finished) = role.phase();

        logger::prompt(&format!("wait for {} to finish {}...", role, waiting));
        wait_for_marker(
            self.testbed,
            current,
            &self.logfile,
            marker,
            self.timing.poll_interval_for(role),
            self.timing.deadline,
        )?;
        logger::emphasize(&format!("{} has finished {}", role, finished));

        Ok(())
    }
}
