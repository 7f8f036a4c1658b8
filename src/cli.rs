//! Some routines for adding common CLI options in a consistent, less boilerplatey way.

use std::str::FromStr;

/// A `clap` validator accepting anything that parses as a `T`.
pub fn is<T>(s: String) -> Result<(), String>
where
    T: FromStr,
    T::Err: std::fmt::Debug,
{
    s.as_str()
        .parse::<T>()
        .map(|_| ())
        .map_err(|e| format!("{:?}", e))
}

/// Options shared by every routine that talks to the testbed.
pub mod testbed {
    use std::path::Path;
    use std::time::Duration;

    use clap::{App, Arg, ArgMatches};

    pub fn add_cli_options<'a, 'b>(app: App<'a, 'b>) -> App<'a, 'b> {
        app.arg(
            Arg::with_name("CONFIG")
                .long("config")
                .takes_value(true)
                .help(
                    "The configuration file. By default, config.json in the current directory \
                     or its closest ancestor that has one.",
                ),
        )
        .arg(
            Arg::with_name("DEADLINE")
                .long("deadline")
                .takes_value(true)
                .validator(super::is::<u64>)
                .help(
                    "Give up waiting for a completion marker after this many seconds. By \
                     default, wait forever.",
                ),
        )
    }

    /// Parse and return the values added by `add_cli_options`.
    pub fn parse_cli_options<'a>(sub_m: &'a ArgMatches<'a>) -> (Option<&'a Path>, Option<Duration>) {
        let config = sub_m.value_of("CONFIG").map(Path::new);
        let deadline = sub_m
            .value_of("DEADLINE")
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs);

        (config, deadline)
    }
}

/// Options of the experiment scripts.
pub mod matrix {
    use clap::{App, Arg, ArgMatches};

    pub fn add_cli_options<'a, 'b>(app: App<'a, 'b>) -> App<'a, 'b> {
        super::testbed::add_cli_options(app)
            .arg(
                Arg::with_name("ROUNDS")
                    .long("rounds")
                    .takes_value(true)
                    .validator(super::is::<usize>)
                    .help("The number of rounds (default: exp_round_number in the config)"),
            )
            .arg(
                Arg::with_name("CACHES")
                    .long("caches")
                    .takes_value(true)
                    .multiple(true)
                    .use_delimiter(true)
                    .help("The cache methods to evaluate, e.g. covered,shark+gdsf,lhd+"),
            )
    }

    /// Returns `(rounds, caches)`. `None` rounds means `exp_round_number`; the caches fall back
    /// to `default_caches`.
    pub fn parse_cli_options(
        sub_m: &ArgMatches<'_>,
        default_caches: &[&str],
    ) -> (Option<usize>, Vec<String>) {
        let rounds = sub_m
            .value_of("ROUNDS")
            .and_then(|s| s.parse::<usize>().ok());
        let caches = match sub_m.values_of("CACHES") {
            Some(values) => values.map(str::to_owned).collect(),
            None => default_caches.iter().map(|c| c.to_string()).collect(),
        };

        (rounds, caches)
    }
}

/// `--set key=value` options for one-off runs.
pub mod settings {
    use clap::{App, Arg, ArgMatches};

    use crate::cliutil::Settings;

    pub fn add_cli_options<'a, 'b>(app: App<'a, 'b>) -> App<'a, 'b> {
        super::testbed::add_cli_options(app)
            .arg(
                Arg::with_name("SET")
                    .long("set")
                    .takes_value(true)
                    .multiple(true)
                    .number_of_values(1)
                    .validator(validate_key_value)
                    .help("A setting passed to cliutil, e.g. --set capacity_mb=2048"),
            )
            .arg(
                Arg::with_name("LOGFILE")
                    .long("logfile")
                    .takes_value(true)
                    .help("The log file, relative to the project directory"),
            )
    }

    /// Parse and return the values added by `add_cli_options`.
    pub fn parse_cli_options<'a>(
        sub_m: &'a ArgMatches<'a>,
    ) -> Result<(Settings, Option<&'a str>), failure::Error> {
        let mut settings = Settings::default();
        if let Some(values) = sub_m.values_of("SET") {
            for kv in values {
                let (key, value) = parse_key_value(kv)?;
                settings.set(key, value)?;
            }
        }

        Ok((settings, sub_m.value_of("LOGFILE")))
    }

    fn validate_key_value(kv: String) -> Result<(), String> {
        parse_key_value(&kv).map(|_| ()).map_err(|e| e.to_string())
    }

    pub fn parse_key_value(kv: &str) -> Result<(&str, &str), failure::Error> {
        let mut split = kv.splitn(2, '=');
        match (split.next(), split.next()) {
            (Some(key), Some(value)) if !key.trim().is_empty() => Ok((key.trim(), value.trim())),
            _ => Err(failure::format_err!(
                "\"{}\" is not of the form key=value",
                kv
            )),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn app() -> clap::App<'static, 'static> {
        let app = clap::App::new("test").subcommand(matrix::add_cli_options(
            clap::SubCommand::with_name("exp"),
        ));
        app.subcommand(settings::add_cli_options(clap::SubCommand::with_name("one")))
    }

    #[test]
    fn validators() {
        assert!(is::<usize>("12".into()).is_ok());
        assert!(is::<usize>("-1".into()).is_err());
        assert!(is::<f64>("0.8".into()).is_ok());
    }

    #[test]
    fn matrix_options() {
        let m = app()
            .get_matches_from_safe(vec![
                "test", "exp", "--rounds", "3", "--caches", "covered,lhd+", "--deadline", "60",
            ])
            .unwrap();
        let sub_m = m.subcommand_matches("exp").unwrap();

        let (rounds, caches) = matrix::parse_cli_options(sub_m, &["shark"]);
        assert_eq!(rounds, Some(3));
        assert_eq!(caches, vec!["covered".to_owned(), "lhd+".to_owned()]);

        let (config, deadline) = testbed::parse_cli_options(sub_m);
        assert_eq!(config, None);
        assert_eq!(deadline, Some(std::time::Duration::from_secs(60)));
    }

    #[test]
    fn default_caches() {
        let m = app().get_matches_from_safe(vec!["test", "exp"]).unwrap();
        let sub_m = m.subcommand_matches("exp").unwrap();

        let (rounds, caches) = matrix::parse_cli_options(sub_m, &["covered", "gdsf+"]);
        assert_eq!(rounds, None);
        assert_eq!(caches, vec!["covered".to_owned(), "gdsf+".to_owned()]);
    }

    #[test]
    fn settings_options() {
        let m = app()
            .get_matches_from_safe(vec![
                "test",
                "one",
                "--set",
                "keycnt=1000000",
                "--set",
                "cache_name=covered",
                "--logfile",
                "tmp.out",
            ])
            .unwrap();
        let sub_m = m.subcommand_matches("one").unwrap();

        let (settings, logfile) = settings::parse_cli_options(sub_m).unwrap();
        assert_eq!(settings.keycnt, Some(1_000_000));
        assert_eq!(settings.cache_name.as_deref(), Some("covered"));
        assert_eq!(logfile, Some("tmp.out"));
    }

    #[test]
    fn malformed_set_is_rejected() {
        assert!(app()
            .get_matches_from_safe(vec!["test", "one", "--set", "keycnt"])
            .is_err());
        assert!(settings::parse_key_value("=3").is_err());
        assert_eq!(settings::parse_key_value("a=b=c").unwrap(), ("a", "b=c"));
    }

    #[test]
    fn unknown_setting_is_rejected() {
        let m = app()
            .get_matches_from_safe(vec!["test", "one", "--set", "dataset_loadercnt=2"])
            .unwrap();
        let sub_m = m.subcommand_matches("one").unwrap();
        assert!(settings::parse_cli_options(sub_m).is_err());
    }
}
