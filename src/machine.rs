//! Figuring out which configured machine we are running on.

use crate::config::{Machine, Topology};
use crate::shell::Shell;

/// The addresses of the local network interfaces, as reported by `hostname -I`.
pub fn local_addresses<S: Shell>(shell: &S) -> Result<Vec<String>, failure::Error> {
    let out = shell.run("hostname -I", true)?;
    if !out.success() {
        failure::bail!(
            "failed to list local IP addresses (errmsg: {})",
            out.errstr()
        );
    }

    Ok(out.stdout.split_whitespace().map(str::to_owned).collect())
}

/// Returns the index of the first configured machine whose public IP is one of `addrs`.
pub fn identify(machines: &[Machine], addrs: &[String]) -> Result<usize, failure::Error> {
    machines
        .iter()
        .position(|m| addrs.iter().any(|a| *a == m.public_ip))
        .ok_or_else(|| {
            failure::format_err!(
                "current machine (local addresses: {}) is not in physical_machines",
                addrs.join(", ")
            )
        })
}

/// Returns the index of the machine the harness runs on.
pub fn current_machine_index<S: Shell>(
    shell: &S,
    topology: &Topology,
) -> Result<usize, failure::Error> {
    let addrs = local_addresses(shell)?;
    let idx = identify(&topology.machines, &addrs)?;
    log::debug!("current machine is {} ({})", idx, topology.machines[idx].public_ip);
    Ok(idx)
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::config::test::{store, FOUR_MACHINES};
    use crate::shell::testing::ScriptedShell;
    use crate::shell::ShellOutput;

    #[test]
    fn first_match_wins() {
        let mut machines = store(FOUR_MACHINES).topology().unwrap().machines;
        machines[3].public_ip = "10.0.0.2".into();

        let addrs = vec!["127.0.0.1".to_owned(), "10.0.0.2".to_owned()];
        assert_eq!(identify(&machines, &addrs).unwrap(), 1);
    }

    #[test]
    fn unknown_host_is_an_error() {
        let machines = store(FOUR_MACHINES).topology().unwrap().machines;
        assert!(identify(&machines, &["172.16.0.9".to_owned()]).is_err());
    }

    #[test]
    fn index_from_hostname_output() {
        let topology = store(FOUR_MACHINES).topology().unwrap();
        let shell = ScriptedShell::new(|_| ShellOutput::ok("192.168.0.3 10.0.0.3 \n"));
        assert_eq!(current_machine_index(&shell, &topology).unwrap(), 2);
        assert_eq!(shell.commands(), vec!["hostname -I"]);
    }
}
