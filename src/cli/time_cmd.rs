//! Time arithmetic CLI commands

use anyhow::Result;
use clap::Subcommand;

use super::output::Output;
use crate::domain::time::{
    add_times, calculate_end_time, compare_times, format_clock, format_duration,
    get_time_difference, is_valid_time_format, parse_time_strict, sum_durations, time_to_seconds,
};

#[derive(Subcommand)]
pub enum TimeCommands {
    /// Add two times (no wrap past 24 hours)
    Add {
        first: String,
        second: String,
    },

    /// Absolute difference between two times
    Diff {
        first: String,
        second: String,
    },

    /// End time of a cue from its start and run time
    End {
        start: String,
        run: String,
    },

    /// Check that a time is a valid 24-hour HH:MM:SS clock time
    Check {
        time: String,
    },

    /// Total of several durations
    Duration {
        #[arg(required = true)]
        times: Vec<String>,
    },
}

pub fn run(cmd: TimeCommands, output: &Output) -> Result<()> {
    match cmd {
        TimeCommands::Add { first, second } => {
            validate(&[first.as_str(), second.as_str()])?;
            let total = add_times(&first, &second)
                .ok_or_else(|| anyhow::anyhow!("Cannot add {} and {}", first, second))?;
            print_time(output, &total)
        }
        TimeCommands::Diff { first, second } => {
            validate(&[first.as_str(), second.as_str()])?;
            let diff = get_time_difference(&first, &second)
                .ok_or_else(|| anyhow::anyhow!("Cannot compare {} and {}", first, second))?;

            if output.is_json() {
                output.data(&serde_json::json!({
                    "time": diff,
                    "seconds": compare_times(&first, &second),
                }));
            } else {
                println!("{}", diff);
            }
            Ok(())
        }
        TimeCommands::End { start, run } => {
            validate(&[start.as_str(), run.as_str()])?;
            let end = calculate_end_time(&start, &run)
                .ok_or_else(|| anyhow::anyhow!("Cannot compute end time"))?;
            print_time(output, &end)
        }
        TimeCommands::Check { time } => {
            let valid = is_valid_time_format(&time);
            if output.is_json() {
                output.data(&serde_json::json!({ "time": &time, "valid": valid }));
            } else if valid {
                println!("{} is valid", time);
            }

            if !valid {
                parse_time_strict(&time)?;
            }
            Ok(())
        }
        TimeCommands::Duration { times } => {
            validate(&times.iter().map(String::as_str).collect::<Vec<_>>())?;
            let total = sum_durations(times.iter().map(String::as_str));

            if output.is_json() {
                output.data(&serde_json::json!({
                    "total": format_clock(total),
                    "seconds": total,
                }));
            } else {
                println!("{}", format_clock(total));
            }
            Ok(())
        }
    }
}

fn validate(times: &[&str]) -> Result<()> {
    for time in times {
        parse_time_strict(time)?;
    }
    Ok(())
}

fn print_time(output: &Output, time: &str) -> Result<()> {
    if output.is_json() {
        output.data(&serde_json::json!({
            "time": time,
            "seconds": time_to_seconds(time),
            "display": format_duration(time),
        }));
    } else {
        println!("{}", time);
    }
    Ok(())
}
