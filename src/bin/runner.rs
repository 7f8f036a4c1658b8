//! This program runs the COVERED experiments and their helper routines on the testbed. Which
//! routine is chosen by passing different command line arguments. Certain routines require extra
//! arguments.

use covered_runner::adhoc::{self, Adhoc};
use covered_runner::*;

fn run() -> Result<(), failure::Error> {
    let mut app = clap::App::new("runner").about(
        "This program runs the COVERED experiments and their helper routines on the testbed. \
         Which routine is chosen by passing different command line arguments. Certain routines \
         require extra arguments.",
    );

    for kind in Adhoc::ALL.iter().copied() {
        app = app.subcommand(adhoc::cli_options(kind));
    }

    let matches = app
        .subcommand(load_dataset::cli_options())
        .subcommand(preprocess_traces::cli_options())
        .subcommand(characterize_traces::cli_options())
        .subcommand(walk_traces::cli_options())
        .subcommand(cleanup_testbed::cli_options())
        .subcommand(delay::cli_options())
        .subcommand(scrape::cli_options())
        .subcommand(pathprobe::probe_cli_options())
        .subcommand(pathprobe::replace_cli_options())
        .subcommand(pathprobe::restore_cli_options())
        .subcommand(exp_performance_existing::cli_options())
        .subcommand(exp_performance_skewness::cli_options())
        .subcommand(exp_performance_workloads::cli_options())
        .subcommand(exp_parameter_memory::cli_options())
        .subcommand(exp_parameter_datasetsize::cli_options())
        .subcommand(exp_parameter_stresstest_time::cli_options())
        .subcommand(exp_parameter_latency::cli_options())
        .subcommand(exp_parameter_covered::cli_options())
        .subcommand(exp_alicloud_stresstest::cli_options())
        .subcommand(exp_alicloud_warmup::cli_options())
        .subcommand(exp_simulation_cachescale::cli_options())
        .subcommand(exp_simulation_intercache_latency::cli_options())
        .setting(clap::AppSettings::SubcommandRequiredElseHelp)
        .setting(clap::AppSettings::DisableVersion)
        .get_matches();

    let (name, sub_m) = match matches.subcommand() {
        (name, Some(sub_m)) => (name, sub_m),
        _ => unreachable!(),
    };

    // Every log line is prefixed with the routine.
    logger::set_script(name);

    if let Some(kind) = Adhoc::from_subcommand(name) {
        return adhoc::run(kind, sub_m);
    }

    match name {
        "load_dataset" => load_dataset::run(sub_m),
        "preprocess_traces" => preprocess_traces::run(sub_m),
        "characterize_traces" => characterize_traces::run(sub_m),
        "walk_traces" => walk_traces::run(sub_m),
        "cleanup_testbed" => cleanup_testbed::run(sub_m),

        "gen_delay_matrix" => delay::run(sub_m),
        "scrape_results" => scrape::run(sub_m),

        "probe_path" => pathprobe::run_probe(sub_m),
        "replace_dir" => pathprobe::run_replace(sub_m),
        "restore_dir" => pathprobe::run_restore(sub_m),

        "exp_performance_existing" => exp_performance_existing::run(sub_m),
        "exp_performance_skewness" => exp_performance_skewness::run(sub_m),
        "exp_performance_workloads" => exp_performance_workloads::run(sub_m),
        "exp_parameter_memory" => exp_parameter_memory::run(sub_m),
        "exp_parameter_datasetsize" => exp_parameter_datasetsize::run(sub_m),
        "exp_parameter_stresstest_time" => exp_parameter_stresstest_time::run(sub_m),
        "exp_parameter_latency" => exp_parameter_latency::run(sub_m),
        "exp_parameter_covered" => exp_parameter_covered::run(sub_m),
        "exp_alicloud_stresstest" => exp_alicloud_stresstest::run(sub_m),
        "exp_alicloud_warmup" => exp_alicloud_warmup::run(sub_m),
        "exp_simulation_cachescale" => exp_simulation_cachescale::run(sub_m),
        "exp_simulation_intercache_latency" => exp_simulation_intercache_latency::run(sub_m),

        _ => {
            unreachable!();
        }
    }
}

fn main() {
    use console::style;

    env_logger::init();

    // Always get backtraces. The runner spends its time waiting on the testbed anyway.
    std::env::set_var("RUST_BACKTRACE", "1");

    // If an error occurred, try to print something helpful.
    if let Err(err) = run() {
        const MESSAGE: &str = r#"== ERROR ==================================================================================
`runner` encountered an error. The command log above may offer clues. If the error pertains to SSH,
you may be able to get useful information by setting the RUST_LOG=debug environment variable. The
components launched so far may still be running; `runner cleanup_testbed` kills them.
"#;

        println!("{}", style(MESSAGE).red().bold());

        // Errors from SSH commands
        if err.downcast_ref::<spurs::SshError>().is_some() {
            println!("An error occurred while attempting to run a command over SSH");
        }

        // Print error and backtrace
        println!(
            "`runner` encountered the following error:\n{}\n{}",
            err.as_fail(),
            err.backtrace(),
        );

        std::process::exit(101);
    }
}
