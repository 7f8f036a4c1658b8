//! One-off runs of a single binary (or of the whole prototype) with settings from the command
//! line, e.g. `runner single_node_simulator --set cache_name=covered --set keycnt=1000000`.

use clap::{AppSettings, SubCommand};

use crate::cli;
use crate::harness::Harness;
use crate::prototype::Prototype;
use crate::role::Role;
use crate::shell::Shell;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Adhoc {
    Prototype,
    Simulator,
    SingleNodePrototype,
    SingleNodeSimulator,
    TotalStatisticsLoader,
}

impl Adhoc {
    pub const ALL: [Adhoc; 5] = [
        Adhoc::Prototype,
        Adhoc::Simulator,
        Adhoc::SingleNodePrototype,
        Adhoc::SingleNodeSimulator,
        Adhoc::TotalStatisticsLoader,
    ];

    pub fn subcommand(self) -> &'static str {
        match self {
            Adhoc::Prototype => "prototype",
            Adhoc::Simulator => "simulator",
            Adhoc::SingleNodePrototype => "single_node_prototype",
            Adhoc::SingleNodeSimulator => "single_node_simulator",
            Adhoc::TotalStatisticsLoader => "load_total_statistics",
        }
    }

    pub fn from_subcommand(name: &str) -> Option<Adhoc> {
        Adhoc::ALL.iter().copied().find(|a| a.subcommand() == name)
    }

    fn about(self) -> &'static str {
        match self {
            Adhoc::Prototype => {
                "Run the multi-machine prototype once. Must be run on the evaluator machine."
            }
            Adhoc::Simulator => {
                "Run the simulator once. Every role of the topology must be on this machine."
            }
            Adhoc::SingleNodePrototype => {
                "Run the single-node prototype once. Every role of the topology must be on this \
                 machine."
            }
            Adhoc::SingleNodeSimulator => "Run the single-node simulator once.",
            Adhoc::TotalStatisticsLoader => {
                "Reload the total statistics of a finished run. Must be run on the evaluator \
                 machine."
            }
        }
    }

    /// The binary launched, for everything but the prototype.
    fn role(self) -> Option<Role> {
        match self {
            Adhoc::Prototype => None,
            Adhoc::Simulator => Some(Role::Simulator),
            Adhoc::SingleNodePrototype => Some(Role::SingleNodePrototype),
            Adhoc::SingleNodeSimulator => Some(Role::SingleNodeSimulator),
            Adhoc::TotalStatisticsLoader => Some(Role::TotalStatisticsLoader),
        }
    }
}

pub fn cli_options(kind: Adhoc) -> clap::App<'static, 'static> {
    let app = SubCommand::with_name(kind.subcommand())
        .about(kind.about())
        .setting(AppSettings::DisableVersion);
    cli::settings::add_cli_options(app)
}

pub fn run(kind: Adhoc, sub_m: &clap::ArgMatches<'_>) -> Result<(), failure::Error> {
    let (settings, logfile) = cli::settings::parse_cli_options(sub_m)?;
    let harness = Harness::from_matches(sub_m)?;
    run_with(&harness, kind, settings, logfile)
}

fn run_with<S: Shell>(
    harness: &Harness<S>,
    kind: Adhoc,
    settings: crate::cliutil::Settings,
    logfile: Option<&str>,
) -> Result<(), failure::Error> {
    match kind.role() {
        None => {
            harness.require_evaluator()?;

            let mut prototype = Prototype::new(&harness.testbed, settings).timing(harness.timing);
            if let Some(logfile) = logfile {
                prototype = prototype.evaluator_logfile(logfile);
            }
            prototype.run().map(|_| ())
        }
        Some(role) => {
            let mut launcher =
                crate::launcher::RoleLauncher::new(&harness.testbed, role, settings)
                    .timing(harness.timing);
            if let Some(logfile) = logfile {
                launcher = launcher.logfile(logfile);
            }
            launcher.run()
        }
    }
}
