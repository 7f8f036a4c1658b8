//! The evaluation binaries the harness knows how to launch.

use std::fmt;

/// Written by the evaluator once it is ready to accept registrations.
pub const EVALUATOR_INITIALIZED: &str = "Evaluator initialized";
/// Written by the evaluator (and the simulators) once the benchmark is over.
pub const EVALUATOR_DONE: &str = "Evaluator done";
pub const DATASET_LOADER_DONE: &str = "Dataset loader done";
pub const TOTAL_STATISTICS_LOADER_DONE: &str = "Total statistics loader done";
pub const TRACE_PREPROCESSOR_DONE: &str = "Trace preprocessor done";

/// A kind of process. Each role maps to a binary in the project directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    Client,
    Edge,
    Cloud,
    Evaluator,
    Simulator,
    DatasetLoader,
    TracePreprocessor,
    SingleNodePrototype,
    SingleNodeSimulator,
    TotalStatisticsLoader,
    CliUtil,
}

/// Where a single-host role may be launched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    /// Launched by the orchestrator on the machines of the topology.
    Orchestrated,
    /// Anywhere.
    Anywhere,
    /// Only on the cloud machine.
    Cloud,
    /// Only on the evaluator machine.
    Evaluator,
    /// Only on a client machine.
    AnyClient,
    /// Only when every role of the topology is placed on the current machine.
    AllRolesHere,
}

impl Role {
    pub const ALL: [Role; 11] = [
        Role::Client,
        Role::Edge,
        Role::Cloud,
        Role::Evaluator,
        Role::Simulator,
        Role::DatasetLoader,
        Role::TracePreprocessor,
        Role::SingleNodePrototype,
        Role::SingleNodeSimulator,
        Role::TotalStatisticsLoader,
        Role::CliUtil,
    ];

    /// Path of the binary, relative to the project directory.
    pub fn binary(self) -> &'static str {
        match self {
            Role::Client => "./client",
            Role::Edge => "./edge",
            Role::Cloud => "./cloud",
            Role::Evaluator => "./evaluator",
            Role::Simulator => "./simulator",
            Role::DatasetLoader => "./dataset_loader",
            Role::TracePreprocessor => "./trace_preprocessor",
            Role::SingleNodePrototype => "./single_node_prototype",
            Role::SingleNodeSimulator => "./single_node_simulator",
            Role::TotalStatisticsLoader => "./total_statistics_loader",
            Role::CliUtil => "./cliutil",
        }
    }

    /// Human-readable name used in messages.
    pub fn name(self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Edge => "edge",
            Role::Cloud => "cloud",
            Role::Evaluator => "evaluator",
            Role::Simulator => "simulator",
            Role::DatasetLoader => "dataset loader",
            Role::TracePreprocessor => "trace preprocessor",
            Role::SingleNodePrototype => "single-node prototype",
            Role::SingleNodeSimulator => "single-node simulator",
            Role::TotalStatisticsLoader => "total statistics loader",
            Role::CliUtil => "cliutil",
        }
    }

    /// The prefix of this role's line in the output of `cliutil`, if it has one.
    pub fn cli_prefix(self) -> Option<&'static str> {
        match self {
            Role::Client => Some("Client:"),
            Role::Edge => Some("Edge:"),
            Role::Cloud => Some("Cloud:"),
            Role::Evaluator => Some("Evaluator:"),
            Role::Simulator => Some("Simulator:"),
            Role::DatasetLoader => Some("DatasetLoader:"),
            Role::TracePreprocessor => Some("TracePreprocessor:"),
            _ => None,
        }
    }

    /// The role whose `cliutil` line this role is launched with. The statistics loader reads
    /// the evaluator's parameters, and both single-node binaries take the simulator's.
    pub fn cli_source(self) -> Option<Role> {
        match self {
            Role::TotalStatisticsLoader => Some(Role::Evaluator),
            Role::SingleNodePrototype | Role::SingleNodeSimulator => Some(Role::Simulator),
            Role::CliUtil => None,
            other => Some(other),
        }
    }

    /// The log file used when the caller does not pick one.
    pub fn default_logfile(self) -> &'static str {
        match self {
            Role::Client => "tmp_client.out",
            Role::Edge => "tmp_edge.out",
            Role::Cloud => "tmp_cloud.out",
            Role::Evaluator => "tmp_evaluator.out",
            Role::Simulator => "tmp_simulator.out",
            Role::DatasetLoader => "tmp_dataset_loader.out",
            Role::TracePreprocessor => "tmp_trace_preprocessor.out",
            Role::SingleNodePrototype => "tmp_single_node_prototype.out",
            Role::SingleNodeSimulator => "tmp_single_node_simulator.out",
            Role::TotalStatisticsLoader => "tmp_total_statistics_loader.out",
            Role::CliUtil => "tmp_cliutil.out",
        }
    }

    /// The line written to the log once the role has done its job.
    pub fn completion_marker(self) -> Option<&'static str> {
        match self {
            Role::Evaluator
            | Role::Simulator
            | Role::SingleNodePrototype
            | Role::SingleNodeSimulator => Some(EVALUATOR_DONE),
            Role::DatasetLoader => Some(DATASET_LOADER_DONE),
            Role::TotalStatisticsLoader => Some(TOTAL_STATISTICS_LOADER_DONE),
            Role::TracePreprocessor => Some(TRACE_PREPROCESSOR_DONE),
            Role::Client | Role::Edge | Role::Cloud | Role::CliUtil => None,
        }
    }

    /// What the role is busy with, as in "wait for dataset loader to finish loading phase".
    /// Returns `(waiting, finished)`.
    pub fn phase(self) -> (&'static str, &'static str) {
        match self {
            Role::DatasetLoader => ("loading phase", "loading"),
            Role::TotalStatisticsLoader => ("reloading phase", "reloading"),
            Role::TracePreprocessor => ("preprocessing phase", "preprocessing"),
            _ => ("benchmark", "benchmark"),
        }
    }

    pub fn placement(self) -> Placement {
        match self {
            Role::Client | Role::Edge | Role::Cloud | Role::Evaluator => Placement::Orchestrated,
            Role::Simulator | Role::SingleNodePrototype => Placement::AllRolesHere,
            Role::SingleNodeSimulator | Role::CliUtil => Placement::Anywhere,
            Role::DatasetLoader => Placement::Cloud,
            Role::TotalStatisticsLoader => Placement::Evaluator,
            Role::TracePreprocessor => Placement::AnyClient,
        }
    }

    /// Returns the role whose binary is `binary`, if any.
    #[cfg(test)]
    pub fn from_binary(binary: &str) -> Option<Role> {
        Role::ALL.iter().copied().find(|r| r.binary() == binary)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
