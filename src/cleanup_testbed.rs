//! Kill every evaluation binary of the operator on every machine of the testbed, e.g. after a
//! run was interrupted with Ctrl-C.

use clap::clap_app;

use crate::cli;
use crate::harness::Harness;
use crate::logger;
use crate::role::Role;
use crate::shell::Shell;

pub fn cli_options() -> clap::App<'static, 'static> {
    let app = clap_app! { cleanup_testbed =>
        (about: "Kill all evaluation binaries on all machines of the testbed.")
        (@setting DisableVersion)
    };
    cli::testbed::add_cli_options(app)
}

pub fn run(sub_m: &clap::ArgMatches<'_>) -> Result<(), failure::Error> {
    let harness = Harness::from_matches(sub_m)?;
    cleanup(&harness)
}

/// Returns an error naming how many kills failed, after trying all of them.
pub fn cleanup<S: Shell>(harness: &Harness<S>) -> Result<(), failure::Error> {
    let testbed = &harness.testbed;
    let mut residuals = 0;

    for machine in &testbed.topology.machines {
        logger::prompt(&format!(
            "cleanup machine {} ({})...",
            machine.index, machine.public_ip
        ));

        for role in Role::ALL.iter().copied() {
            if let Err(err) = testbed.kill_component(machine.index, role.binary()) {
                logger::warn(&format!("{} on machine {}: {}", role, machine.index, err));
                residuals += 1;
            }
        }
    }

    if residuals > 0 {
        failure::bail!("{} binaries may still be running on the testbed", residuals);
    }

    logger::emphasize("cleanup testbed successfully");
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::harness::test::harness;
    use crate::shell::testing::{ScriptedShell, Target};
    use crate::shell::ShellOutput;

    #[test]
    fn kills_every_binary_everywhere() {
        let shell = ScriptedShell::new(|call| {
            if call.command.starts_with("ps -aux") && call.command.contains("'./edge'") {
                ShellOutput::ok("4242\n")
            } else {
                ShellOutput::ok("")
            }
        });
        let h = harness(shell, 0);
        cleanup(&h).unwrap();

        let listings = h.testbed.shell.matching("ps -aux");
        assert_eq!(listings.len(), 4 * Role::ALL.len());

        // The current machine is handled locally, the others over SSH.
        assert!(listings
            .iter()
            .filter(|c| c.target == Target::Local)
            .all(|c| c.command.contains("'alice'")));
        assert_eq!(
            listings.iter().filter(|c| c.target == Target::Local).count(),
            Role::ALL.len()
        );

        assert_eq!(h.testbed.shell.matching("kill -9 4242").len(), 4);
    }

    #[test]
    fn residuals_fail_the_cleanup() {
        let shell = ScriptedShell::new(|call| {
            if call.command.starts_with("ps -aux") && call.command.contains("'./cloud'") {
                ShellOutput::ok("77\n")
            } else if call.command.starts_with("kill -9") {
                ShellOutput::failed(1, "Operation not permitted")
            } else {
                ShellOutput::ok("")
            }
        });
        let h = harness(shell, 0);
        assert!(cleanup(&h).is_err());
    }
}
