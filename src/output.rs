//! Console output helpers.
//!
//! User-facing messages go through these instead of bare println so the
//! prefix styling stays consistent; colors only when stdout is a TTY.

use owo_colors::{AnsiColors, OwoColorize};

fn emit(prefix: &str, color: AnsiColors, to_stderr: bool, msg: &str) {
    if atty::is(atty::Stream::Stdout) {
        let styled = prefix.color(color).bold().to_string();
        if to_stderr {
            eprintln!("{styled} {msg}");
        } else {
            println!("{styled} {msg}");
        }
    } else if to_stderr {
        eprintln!("{prefix} {msg}");
    } else {
        println!("{prefix} {msg}");
    }
}

pub fn print_info(msg: &str) {
    emit("info:", AnsiColors::Cyan, false, msg);
}

pub fn print_warn(msg: &str) {
    emit("warn:", AnsiColors::Yellow, true, msg);
}

pub fn print_error(msg: &str) {
    emit("error:", AnsiColors::Red, true, msg);
}

pub fn print_success(msg: &str) {
    emit("ok:", AnsiColors::Green, false, msg);
}

/// Plain user-facing line (no prefix) for primary outputs users may script
/// against, such as `info` results.
pub fn print_user(msg: &str) {
    println!("{msg}");
}
