//! The multi-machine prototype: evaluator, then cloud, then edges, then clients, each on the
//! machine the topology assigns it, followed by a wait for the end of the benchmark and a
//! teardown of everything that was launched.

use crate::cliutil::{self, CliStrings, Settings};
use crate::launcher::{wait_for_marker, ComponentHandle, ComponentMap, Timing};
use crate::logger;
use crate::role::{self, Role};
use crate::shell::Shell;
use crate::testbed::{MarkerStatus, Testbed};
use crate::HarnessError;

/// How far a run got.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Init,
    EvalLaunched,
    EvalReady,
    CloudLaunched,
    EdgesLaunched,
    ClientsLaunched,
    BenchComplete,
    Cleaned,
    FailedCleaned,
}

/// One run of the multi-machine prototype.
pub struct Prototype<'t, S: Shell> {
    testbed: &'t Testbed<S>,
    settings: Settings,
    evaluator_logfile: String,
    timing: Timing,
    cli: Option<CliStrings>,

    stage: Stage,
    launched: ComponentMap,
}

impl<'t, S: Shell> Prototype<'t, S> {
    pub fn new(testbed: &'t Testbed<S>, settings: Settings) -> Self {
        Prototype {
            testbed,
            settings,
            evaluator_logfile: Role::Evaluator.default_logfile().to_owned(),
            timing: Timing::standard(),
            cli: None,
            stage: Stage::Init,
            launched: ComponentMap::default(),
        }
    }

    /// Where the evaluator writes its log (and thus the results of the run).
    pub fn evaluator_logfile(mut self, logfile: &str) -> Self {
        self.evaluator_logfile = logfile.to_owned();
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

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Run the benchmark. Every launched component is killed before returning, whether the run
    /// succeeded or not. Returns `Stage::Cleaned` on success.
    pub fn run(&mut self) -> Result<Stage, failure::Error> {
        let result = self.launch_all();

        match &result {
            Ok(()) => {
                logger::prompt("wait for all launched components to finish...");
                std::thread::sleep(self.timing.drain_delay);
            }
            Err(err) => logger::die_no_exit(&err.to_string()),
        }

        let _ = self.launched.teardown(self.testbed);

        match result {
            Ok(()) => {
                self.stage = Stage::Cleaned;
                logger::emphasize("cleanup prototype successfully");
                Ok(self.stage)
            }
            Err(err) => {
                log::debug!("prototype failed after reaching {:?}", self.stage);
                self.stage = Stage::FailedCleaned;
                logger::die_no_exit("failed to launch prototype");
                Err(err)
            }
        }
    }

    fn launch_all(&mut self) -> Result<(), failure::Error> {
        let topology = &self.testbed.topology;
        let (evaluator, cloud) = (topology.evaluator, topology.cloud);
        let edges = topology.edges.clone();
        let clients = topology.clients.clone();

        let cli = match self.cli.take() {
            Some(cli) => cli,
            None => cliutil::compose(self.testbed, &self.settings)?,
        };

        // Evaluator.
        let logfile = self.evaluator_logfile.clone();
        self.launch(evaluator, Role::Evaluator, cli.get(Role::Evaluator)?, &logfile)?;
        self.stage = Stage::EvalLaunched;

        std::thread::sleep(self.timing.readiness_delay);
        match self
            .testbed
            .check_marker(evaluator, &logfile, role::EVALUATOR_INITIALIZED)?
        {
            MarkerStatus::Present => {}
            MarkerStatus::Absent => {
                return Err(HarnessError::MarkerAbsent {
                    msg: format!(
                        "evaluator has NOT finished initialization (please check {} in \
                         corresponding machine)",
                        logfile
                    ),
                }
                .into())
            }
            MarkerStatus::Failed(errmsg) => {
                return Err(HarnessError::MarkerAbsent {
                    msg: format!(
                        "failed to verify evaluator initialization (errmsg: {})",
                        errmsg
                    ),
                }
                .into())
            }
        }
        self.stage = Stage::EvalReady;

        // Cloud.
        self.launch(cloud, Role::Cloud, cli.get(Role::Cloud)?, Role::Cloud.default_logfile())?;
        self.stage = Stage::CloudLaunched;

        // Edges.
        if has_duplicates(&edges) {
            failure::bail!("duplicate edge machine indexes");
        }
        for idx in edges {
            self.launch(idx, Role::Edge, cli.get(Role::Edge)?, Role::Edge.default_logfile())?;
        }
        self.stage = Stage::EdgesLaunched;

        // Clients, once cloud and edges had a chance to register with the evaluator.
        std::thread::sleep(self.timing.readiness_delay);
        if has_duplicates(&clients) {
            failure::bail!("duplicate client machine indexes");
        }
        for idx in clients {
            self.launch(idx, Role::Client, cli.get(Role::Client)?, Role::Client.default_logfile())?;
        }
        self.stage = Stage::ClientsLaunched;

        logger::prompt("wait for prototype to finish benchmark...");
        wait_for_marker(
            self.testbed,
            evaluator,
            &logfile,
            role::EVALUATOR_DONE,
            self.timing.poll_interval,
            self.timing.deadline,
        )?;
        logger::emphasize("evaluator has finished benchmark");
        self.stage = Stage::BenchComplete;

        Ok(())
    }

    /// Launch one component and record it, even if the launch reported a failure: the process
    /// may exist anyway.
    fn launch(&mut self, idx: usize, role: Role, cli: &str, logfile: &str) -> Result<(), failure::Error> {
        let machine = self.testbed.machine(idx)?.clone();
        let out = self.testbed.launch(idx, role, cli, logfile)?;

        self.launched.record(ComponentHandle {
            machine,
            role,
            logfile: logfile.to_owned(),
        });

        if !out.success() {
            return Err(HarnessError::SpawnFailure {
                what: format!("{} on machine {}", role, idx),
                errmsg: out.errstr(),
            }
            .into());
        }

        Ok(())
    }
}

fn has_duplicates(idxes: &[usize]) -> bool {
    let mut sorted = idxes.to_vec();
    sorted.sort_unstable();
    sorted.windows(2).any(|w| w[0] == w[1])
}

#[cfg(test)]
mod test {
    use super::*;

    use std::cell::Cell;
    use std::rc::Rc;

    use crate::cliutil::test::CLIUTIL_OUTPUT;
    use crate::config::test::{store, FOUR_MACHINES};
    use crate::shell::testing::{Call, ScriptedShell, Target};
    use crate::shell::ShellOutput;
    use crate::testbed::test::testbed;

    /// Launched binaries per machine IP, with `ps` reporting one PID per launched binary.
    fn healthy(call: &Call) -> ShellOutput {
        if call.command.contains("./cliutil") {
            ShellOutput::ok(CLIUTIL_OUTPUT)
        } else if call.command.contains("grep -F -- 'Evaluator initialized'") {
            ShellOutput::ok("[Evaluator] Evaluator initialized\n")
        } else if call.command.contains("grep -F -- 'Evaluator done'") {
            ShellOutput::ok("[Evaluator] Evaluator done\n")
        } else if call.command.starts_with("ps -aux") {
            ShellOutput::ok("4242\n")
        } else {
            ShellOutput::ok("")
        }
    }

    fn launches(shell: &ScriptedShell) -> Vec<(Option<String>, String)> {
        shell
            .calls
            .borrow()
            .iter()
            .filter(|c| c.command.contains("nohup"))
            .map(|c| {
                let binary = c
                    .command
                    .split_whitespace()
                    .skip_while(|w| *w != "nohup")
                    .nth(1)
                    .unwrap_or_default()
                    .to_owned();
                (c.ip().map(str::to_owned), binary)
            })
            .collect()
    }

    fn kills(shell: &ScriptedShell) -> Vec<(Option<String>, String)> {
        shell
            .calls
            .borrow()
            .iter()
            .filter(|c| c.command.starts_with("ps -aux"))
            .map(|c| {
                let binary = c.command.split('\'').nth(1).unwrap_or_default().to_owned();
                (c.ip().map(str::to_owned), binary)
            })
            .collect()
    }

    fn ip(s: &str) -> Option<String> {
        Some(s.to_owned())
    }

    #[test]
    fn launch_order_and_full_teardown() {
        // Evaluator and cloud on 0 (current), edges on 1 and 3, client on 2.
        let tb = testbed(ScriptedShell::new(healthy), 0);
        let mut proto = Prototype::new(&tb, Settings::default())
            .evaluator_logfile("output/exp/round0/tmp_evaluator_for_covered.out")
            .timing(Timing::immediate());

        assert_eq!(proto.run().unwrap(), Stage::Cleaned);

        assert_eq!(
            launches(&tb.shell),
            vec![
                (None, "./evaluator".into()),
                (None, "./cloud".into()),
                (ip("10.0.0.2"), "./edge".into()),
                (ip("10.0.0.4"), "./edge".into()),
                (ip("10.0.0.3"), "./client".into()),
            ]
        );

        // The evaluator is ready before the cloud is launched.
        let commands = tb.shell.commands();
        let ready = commands
            .iter()
            .position(|c| c.contains("Evaluator initialized"))
            .unwrap();
        let cloud = commands.iter().position(|c| c.contains("nohup ./cloud")).unwrap();
        assert!(ready < cloud);
        assert!(commands[ready].contains("'output/exp/round0/tmp_evaluator_for_covered.out'"));

        assert_eq!(
            kills(&tb.shell),
            vec![
                (None, "./evaluator".into()),
                (None, "./cloud".into()),
                (ip("10.0.0.2"), "./edge".into()),
                (ip("10.0.0.4"), "./edge".into()),
                (ip("10.0.0.3"), "./client".into()),
            ]
        );
        assert_eq!(tb.shell.matching("kill -9 4242").len(), 5);

        // Remote launches detach.
        assert!(tb
            .shell
            .calls
            .borrow()
            .iter()
            .filter(|c| c.command.contains("nohup") && c.ip().is_some())
            .all(|c| matches!(c.target, Target::Remote { background: true, .. })));
    }

    #[test]
    fn two_machines_as_in_the_small_testbed() {
        let text = FOUR_MACHINES
            .replace("\"edge_machine_indexes\": [1, 3]", "\"edge_machine_indexes\": [1]");
        let topology = store(&text).topology().unwrap();
        let tb = Testbed::new(
            ScriptedShell::new(healthy),
            topology,
            0,
            std::path::Path::new("/proj"),
            "alice",
        );

        let mut proto = Prototype::new(&tb, Settings::default()).timing(Timing::immediate());
        proto.run().unwrap();
        assert_eq!(launches(&tb.shell).len(), 4);
        assert_eq!(kills(&tb.shell).len(), 4);
    }

    #[test]
    fn edge_failure_kills_what_was_launched() {
        // The edge on machine 3 fails to launch.
        let tb = testbed(
            ScriptedShell::new(|call| {
                if call.command.contains("nohup ./edge") && call.ip() == Some("10.0.0.4") {
                    ShellOutput::failed(255, "ssh: connect to host 10.0.0.4 port 22: refused")
                } else {
                    healthy(call)
                }
            }),
            0,
        );

        let mut proto = Prototype::new(&tb, Settings::default()).timing(Timing::immediate());
        let err = proto.run().unwrap_err();

        assert_eq!(proto.stage(), Stage::FailedCleaned);
        assert!(err.to_string().contains("edge on machine 3"));
        assert!(launches(&tb.shell).iter().all(|(_, b)| b != "./client"));
        assert_eq!(
            kills(&tb.shell),
            vec![
                (None, "./evaluator".into()),
                (None, "./cloud".into()),
                (ip("10.0.0.2"), "./edge".into()),
                (ip("10.0.0.4"), "./edge".into()),
            ]
        );
        // No completion polling after a failure.
        assert!(tb.shell.matching("Evaluator done").is_empty());
    }

    #[test]
    fn evaluator_not_ready_is_fatal() {
        let tb = testbed(
            ScriptedShell::new(|call| {
                if call.command.contains("Evaluator initialized") {
                    ShellOutput::failed(1, "")
                } else {
                    healthy(call)
                }
            }),
            0,
        );

        let mut proto = Prototype::new(&tb, Settings::default()).timing(Timing::immediate());
        let err = proto.run().unwrap_err();

        assert_eq!(
            err.to_string(),
            "evaluator has NOT finished initialization (please check tmp_evaluator.out in \
             corresponding machine)"
        );
        assert_eq!(launches(&tb.shell), vec![(None, "./evaluator".into())]);
        assert_eq!(kills(&tb.shell), vec![(None, "./evaluator".into())]);
    }

    #[test]
    fn duplicate_edges_are_rejected_after_cloud() {
        let text = FOUR_MACHINES
            .replace("\"edge_machine_indexes\": [1, 3]", "\"edge_machine_indexes\": [1, 1]");
        let topology = store(&text).topology().unwrap();
        let tb = Testbed::new(
            ScriptedShell::new(healthy),
            topology,
            0,
            std::path::Path::new("/proj"),
            "alice",
        );

        let mut proto = Prototype::new(&tb, Settings::default()).timing(Timing::immediate());
        let err = proto.run().unwrap_err();

        assert_eq!(err.to_string(), "duplicate edge machine indexes");
        assert_eq!(launches(&tb.shell).len(), 2);
        assert_eq!(kills(&tb.shell).len(), 2);
    }

    #[test]
    fn benchmark_poll_waits_for_marker() {
        let checks = Rc::new(Cell::new(0));
        let tb = testbed(
            ScriptedShell::new(move |call| {
                if call.command.contains("grep -F -- 'Evaluator done'") {
                    checks.set(checks.get() + 1);
                    if checks.get() < 3 {
                        return ShellOutput::failed(1, "");
                    }
                }
                healthy(call)
            }),
            0,
        );

        let mut proto = Prototype::new(&tb, Settings::default()).timing(Timing::immediate());
        proto.run().unwrap();
        assert_eq!(tb.shell.matching("Evaluator done").len(), 3);

        // Teardown comes after the last poll.
        let commands = tb.shell.commands();
        let last_poll = commands.iter().rposition(|c| c.contains("Evaluator done")).unwrap();
        let first_kill = commands.iter().position(|c| c.starts_with("ps -aux")).unwrap();
        assert!(last_poll < first_kill);
    }

    #[test]
    fn duplicates() {
        assert!(!has_duplicates(&[1, 3, 2]));
        assert!(has_duplicates(&[1, 3, 1]));
        assert!(!has_duplicates(&[]));
    }
}
