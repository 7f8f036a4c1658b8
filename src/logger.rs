//! Operator-facing console output.
//!
//! Every line is tagged with the name of the running routine, e.g. `[exp_parameter_memory]`, so
//! that output interleaved from several machines is still readable. Diagnostic tracing (shell
//! commands, SSH internals) goes through the `log` facade instead and is enabled with `RUST_LOG`.

use std::sync::OnceLock;

use console::style;

static SCRIPT: OnceLock<String> = OnceLock::new();

/// The severity of a console message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Dump,
    Prompt,
    Warn,
    Emphasize,
    Die,
}

impl Level {
    fn label(self) -> &'static str {
        match self {
            Level::Dump => "INFO",
            Level::Prompt => "PROMPT",
            Level::Warn => "WARN",
            Level::Emphasize => "NOTE",
            Level::Die => "ERROR",
        }
    }
}

/// Set the tag printed in front of every message. Only the first call has an effect.
pub fn set_script(name: &str) {
    let _ = SCRIPT.set(name.to_owned());
}

/// The tag printed in front of every message.
pub fn script() -> &'static str {
    SCRIPT.get().map(String::as_str).unwrap_or("runner")
}

/// Format one console line without colors.
pub fn format_line(level: Level, script: &str, msg: &str) -> String {
    format!(
        "{} {} [{}] {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        level.label(),
        script,
        msg
    )
}

fn emit(level: Level, msg: &str) {
    let line = format_line(level, script(), msg);
    match level {
        Level::Dump => println!("{}", line),
        Level::Prompt => println!("{}", style(line).cyan()),
        Level::Emphasize => println!("{}", style(line).green().bold()),
        Level::Warn => eprintln!("{}", style(line).yellow()),
        Level::Die => eprintln!("{}", style(line).red().bold()),
    }
}

/// Informational output with no emphasis.
pub fn dump(msg: &str) {
    emit(Level::Dump, msg);
}

/// A normal user-facing step.
pub fn prompt(msg: &str) {
    emit(Level::Prompt, msg);
}

/// A non-fatal anomaly.
pub fn warn(msg: &str) {
    emit(Level::Warn, msg);
}

/// A completion or a call to action.
pub fn emphasize(msg: &str) {
    emit(Level::Emphasize, msg);
}

/// Report a fatal error and terminate with a nonzero exit code.
pub fn die(msg: &str) -> ! {
    emit(Level::Die, msg);
    std::process::exit(1);
}

/// Report a fatal error but keep running, so that teardown can still happen.
pub fn die_no_exit(msg: &str) {
    emit(Level::Die, msg);
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn line_carries_level_and_script() {
        let line = format_line(Level::Warn, "exp_parameter_memory", "disk almost full");
        assert!(line.ends_with("WARN [exp_parameter_memory] disk almost full"));
    }

    #[test]
    fn default_script_tag() {
        // Tests never set the tag.
        assert_eq!(script(), "runner");
    }
}
