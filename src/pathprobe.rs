//! Helpers for install tooling: find a preferred install directory on `PATH`, and rewrite the
//! install root inside third-party configuration files.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use clap::clap_app;

use failure::ResultExt;

use crate::logger;

/// The first `PATH` element holding an entry whose name contains `target`; otherwise the first
/// element under `/usr/local` or `/usr`.
pub fn probe_path(target: &str, path_var: &OsStr) -> Result<PathBuf, failure::Error> {
    let dirs: Vec<PathBuf> = std::env::split_paths(path_var).collect();

    for dir in &dirs {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                log::debug!("skipping {}: {}", dir.display(), err);
                continue;
            }
        };

        let found = entries
            .filter_map(Result::ok)
            .any(|entry| entry.file_name().to_string_lossy().contains(target));
        if found {
            return Ok(dir.clone());
        }
    }

    for preferred in &["/usr/local", "/usr"] {
        if let Some(dir) = dirs
            .iter()
            .find(|dir| dir.to_string_lossy().contains(preferred))
        {
            return Ok(dir.clone());
        }
    }

    Err(failure::format_err!(
        "no directory in PATH holds {} or lies under /usr",
        target
    ))
}

/// Replace every `old` in `file` with `new`. A missing file is only a warning.
pub fn replace_dir(old: &str, new: &str, file: &Path) -> Result<(), failure::Error> {
    if !file.exists() {
        logger::warn(&format!("{} does not exist, skip replacing {}", file.display(), old));
        return Ok(());
    }

    let content =
        std::fs::read_to_string(file).with_context(|_| format!("reading {}", file.display()))?;
    std::fs::write(file, content.replace(old, new))
        .with_context(|_| format!("writing {}", file.display()))?;

    logger::prompt(&format!("replace {} with {} in {}", old, new, file.display()));
    Ok(())
}

/// Undo `replace_dir(old, new, file)`.
pub fn restore_dir(old: &str, new: &str, file: &Path) -> Result<(), failure::Error> {
    replace_dir(new, old, file)
}

pub fn probe_cli_options() -> clap::App<'static, 'static> {
    clap_app! { probe_path =>
        (about: "Print the preferred install directory on PATH for an executable.")
        (@setting ArgRequiredElseHelp)
        (@setting DisableVersion)
        (@arg TARGET: +required +takes_value "The executable name, e.g. cmake")
    }
}

pub fn replace_cli_options() -> clap::App<'static, 'static> {
    clap_app! { replace_dir =>
        (about: "Replace a directory prefix in files, in place.")
        (@setting ArgRequiredElseHelp)
        (@setting DisableVersion)
        (@arg OLD: +required +takes_value "The directory to replace")
        (@arg NEW: +required +takes_value "The replacement")
        (@arg FILES: +required +takes_value ... "The files to rewrite")
    }
}

pub fn restore_cli_options() -> clap::App<'static, 'static> {
    clap_app! { restore_dir =>
        (about: "Undo replace_dir with the same arguments.")
        (@setting ArgRequiredElseHelp)
        (@setting DisableVersion)
        (@arg OLD: +required +takes_value "The directory that was replaced")
        (@arg NEW: +required +takes_value "The replacement")
        (@arg FILES: +required +takes_value ... "The files to restore")
    }
}

pub fn run_probe(sub_m: &clap::ArgMatches<'_>) -> Result<(), failure::Error> {
    let target = sub_m.value_of("TARGET").unwrap();
    let path_var = std::env::var_os("PATH").unwrap_or_default();

    let dir = probe_path(target, &path_var)?;
    println!("{}", dir.display());
    Ok(())
}

pub fn run_replace(sub_m: &clap::ArgMatches<'_>) -> Result<(), failure::Error> {
    let old = sub_m.value_of("OLD").unwrap();
    let new = sub_m.value_of("NEW").unwrap();
    for file in sub_m.values_of("FILES").unwrap() {
        replace_dir(old, new, Path::new(file))?;
    }
    Ok(())
}

pub fn run_restore(sub_m: &clap::ArgMatches<'_>) -> Result<(), failure::Error> {
    let old = sub_m.value_of("OLD").unwrap();
    let new = sub_m.value_of("NEW").unwrap();
    for file in sub_m.values_of("FILES").unwrap() {
        restore_dir(old, new, Path::new(file))?;
    }
    Ok(())
}
