//! Everything a routine needs to talk to the testbed, built once from the command line.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::ConfigStore;
use crate::launcher::{RoleLauncher, Timing};
use crate::machine;
use crate::matrix::{Point, RunMatrix, RunSummary};
use crate::prototype::Prototype;
use crate::role::Role;
use crate::shell::{Shell, SystemShell};
use crate::testbed::Testbed;
use crate::HarnessError;

pub struct Harness<S: Shell = SystemShell> {
    pub config: ConfigStore,
    pub testbed: Testbed<S>,
    pub timing: Timing,
}

impl Harness<SystemShell> {
    /// Load the configuration, open the SSH transport and figure out where we are.
    pub fn connect(config: Option<&Path>, deadline: Option<Duration>) -> Result<Self, failure::Error> {
        let config = ConfigStore::locate(config)?;
        let topology = config.topology()?;

        let username = crate::invoking_username()?;
        let key = crate::ssh_key_path(&username);
        let shell = SystemShell::new(&username, &key);

        let current = machine::current_machine_index(&shell, &topology)?;
        let testbed = Testbed::new(shell, topology, current, config.root(), &username);

        Ok(Harness {
            config,
            testbed,
            timing: Timing::standard().with_deadline(deadline),
        })
    }

    /// `connect` with the options added by `cli::testbed::add_cli_options`.
    pub fn from_matches(sub_m: &clap::ArgMatches<'_>) -> Result<Self, failure::Error> {
        let (config, deadline) = crate::cli::testbed::parse_cli_options(sub_m);
        Self::connect(config, deadline)
    }
}

impl<S: Shell> Harness<S> {
    pub fn new(config: ConfigStore, testbed: Testbed<S>, timing: Timing) -> Self {
        Harness {
            config,
            testbed,
            timing,
        }
    }

    /// The root of all experiment logs.
    pub fn log_root(&self) -> Result<PathBuf, failure::Error> {
        self.config.get_path("output_log_dirpath")
    }

    /// The number of rounds, unless given on the command line.
    pub fn rounds(&self, explicit: Option<usize>) -> Result<usize, failure::Error> {
        match explicit {
            Some(rounds) => Ok(rounds),
            None => self.config.get("exp_round_number"),
        }
    }

    /// Multi-machine experiments are driven from the evaluator machine.
    pub fn require_evaluator(&self) -> Result<(), failure::Error> {
        if self.testbed.current != self.testbed.topology.evaluator {
            return Err(HarnessError::PreconditionMismatch {
                msg: "This script is only allowed to run on the evaluator machine".into(),
            }
            .into());
        }
        Ok(())
    }

    /// Run one point on the multi-machine prototype. The evaluator logs to the point's log file.
    pub fn run_prototype(&self, point: &Point) -> Result<(), failure::Error> {
        Prototype::new(&self.testbed, point.settings.clone())
            .evaluator_logfile(&point.log_path.display().to_string())
            .timing(self.timing)
            .run()
            .map(|_| ())
    }

    /// Run every missing point of `matrix` on the prototype.
    pub fn run_prototype_matrix(&self, matrix: &RunMatrix) -> Result<RunSummary, failure::Error> {
        self.require_evaluator()?;
        matrix.execute(|point| self.run_prototype(point))
    }

    /// Run every missing point of `matrix` with the single-node simulator.
    pub fn run_simulator_matrix(&self, matrix: &RunMatrix) -> Result<RunSummary, failure::Error> {
        matrix.execute(|point| self.run_single(Role::SingleNodeSimulator, point))
    }

    /// Run one point with a single-host binary logging to the point's log file.
    pub fn run_single(&self, role: Role, point: &Point) -> Result<(), failure::Error> {
        RoleLauncher::new(&self.testbed, role, point.settings.clone())
            .logfile(&point.log_path.display().to_string())
            .timing(self.timing)
            .run()
    }
}
