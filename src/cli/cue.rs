//! Cue CLI commands

use std::time::{Duration, Instant};

use anyhow::Result;
use clap::{Args, Subcommand};

use super::output::Output;
use super::show::{resolve_show, role_of, touch_show};
use crate::domain::time::format_clock;
use crate::domain::{parse_prefix, Cue, CueFields, CueStatus, Show};
use crate::sheet::{CueDraft, CueSheet, LiveSheet};
use crate::storage::{LocalStore, Project, Table};

/// Editable cue fields as command-line flags
#[derive(Args, Debug, Default)]
pub struct FieldArgs {
    /// Start time (HH:MM:SS)
    #[arg(long)]
    pub start: Option<String>,

    /// Run time (HH:MM:SS)
    #[arg(long)]
    pub run: Option<String>,

    /// What happens on stage
    #[arg(long)]
    pub activity: Option<String>,

    #[arg(long)]
    pub graphics: Option<String>,

    #[arg(long)]
    pub video: Option<String>,

    #[arg(long)]
    pub audio: Option<String>,

    #[arg(long)]
    pub lighting: Option<String>,

    #[arg(long)]
    pub notes: Option<String>,
}

impl From<FieldArgs> for CueFields {
    fn from(args: FieldArgs) -> Self {
        CueFields {
            start_time: args.start,
            run_time: args.run,
            activity: args.activity,
            graphics: args.graphics,
            video: args.video,
            audio: args.audio,
            lighting: args.lighting,
            notes: args.notes,
        }
    }
}

#[derive(Subcommand)]
pub enum CueCommands {
    /// Add a cue after the last one (or at the end of a section)
    ///
    /// Examples:
    ///   cueflow cue add Gala --activity "Doors open"
    ///   cueflow cue add Gala --prefix B --start 19:30:00 --run 00:05:00
    ///   cueflow cue add Gala --number A150
    Add {
        /// Show ID or name
        show: String,

        /// Section letter to append to
        #[arg(long, conflicts_with = "number")]
        prefix: Option<String>,

        /// Explicit cue number, e.g. A150
        #[arg(long)]
        number: Option<String>,

        #[command(flatten)]
        fields: FieldArgs,
    },

    /// Start a new section with its first cue (e.g. C101)
    Section {
        /// Show ID or name
        show: String,

        /// Section letter
        prefix: String,

        #[command(flatten)]
        fields: FieldArgs,
    },

    /// List a show's cues in order
    List {
        /// Show ID or name
        show: String,
    },

    /// Edit cue fields; pass an empty string to clear one
    Edit {
        /// Show ID or name
        show: String,

        /// Cue ID or number
        cue: String,

        #[command(flatten)]
        fields: FieldArgs,
    },

    /// Set a cue's status
    Status {
        /// Show ID or name
        show: String,

        /// Cue ID or number
        cue: String,

        /// upcoming, standby, active or completed
        status: CueStatus,
    },

    /// Move a cue to a position in the sheet
    Move {
        /// Show ID or name
        show: String,

        /// Cue ID or number
        cue: String,

        /// Position the cue should end up at (1 = first)
        #[arg(value_parser = clap::value_parser!(u64).range(1..))]
        position: u64,

        /// Refuse moves that would reuse an existing cue number
        #[arg(long)]
        strict: bool,
    },

    /// Delete a cue
    Rm {
        /// Show ID or name
        show: String,

        /// Cue ID or number
        cue: String,
    },

    /// Follow a show's cues as they change
    Watch {
        /// Show ID or name
        show: String,

        /// Stop after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
}

pub fn run(cmd: CueCommands, output: &Output) -> Result<()> {
    match cmd {
        CueCommands::Add {
            show,
            prefix,
            number,
            fields,
        } => add_cue(output, &show, prefix.as_deref(), number, fields.into()),
        CueCommands::Section {
            show,
            prefix,
            fields,
        } => start_section(output, &show, &prefix, fields.into()),
        CueCommands::List { show } => list_cues(output, &show),
        CueCommands::Edit { show, cue, fields } => edit_cue(output, &show, &cue, fields.into()),
        CueCommands::Status { show, cue, status } => set_status(output, &show, &cue, status),
        CueCommands::Move {
            show,
            cue,
            position,
            strict,
        } => move_cue(output, &show, &cue, position, strict),
        CueCommands::Rm { show, cue } => delete_cue(output, &show, &cue),
        CueCommands::Watch { show, timeout } => watch_cues(output, &show, timeout),
    }
}

/// Prints cues as a table
pub(super) fn print_sheet(cues: &[Cue]) {
    if cues.is_empty() {
        println!("No cues");
        return;
    }

    println!(
        "{:<6} {:<9} {:<9} {:<9} {:<10} ACTIVITY",
        "CUE", "START", "RUN", "END", "STATUS"
    );
    println!("{}", "-".repeat(72));

    for cue in cues {
        println!(
            "{:<6} {:<9} {:<9} {:<9} {:<10} {}",
            cue.cue_number,
            cue.start_time.as_deref().unwrap_or("-"),
            cue.run_time.as_deref().unwrap_or("-"),
            cue.end_time.as_deref().unwrap_or("-"),
            cue.status,
            cue.activity.as_deref().unwrap_or("")
        );
    }
}

fn print_cue(cue: &Cue) {
    println!("Cue: {} ({})", cue.cue_number, cue.id);
    println!("Status: {}", cue.status);

    let rows = [
        ("Start", &cue.start_time),
        ("Run", &cue.run_time),
        ("End", &cue.end_time),
        ("Activity", &cue.activity),
        ("Graphics", &cue.graphics),
        ("Video", &cue.video),
        ("Audio", &cue.audio),
        ("Lighting", &cue.lighting),
        ("Notes", &cue.notes),
    ];
    for (label, value) in rows {
        if let Some(value) = value {
            println!("{}: {}", label, value);
        }
    }
}

fn report(output: &Output, verb: &str, cue: &Cue) {
    if output.is_json() {
        output.data(cue);
    } else {
        output.success(&format!("{} cue {} ({})", verb, cue.cue_number, cue.id));
    }
}

/// Opens a show's sheet for reading
fn open_sheet(reference: &str) -> Result<(Project, Show, CueSheet<LocalStore>)> {
    let project = Project::open_current()?;
    let store = project.store();
    let show = resolve_show(&store, reference)?;
    let sheet = CueSheet::load(store, show.id.clone())?;
    Ok((project, show, sheet))
}

/// Opens a show's sheet after checking the acting user may edit it
fn open_sheet_for_edit(reference: &str) -> Result<(Project, Show, CueSheet<LocalStore>)> {
    let (project, show, sheet) = open_sheet(reference)?;
    let user = project.config().global.effective_user();

    match role_of(&project.store(), &show.id, &user)? {
        Some(role) if role.can_edit() => Ok((project, show, sheet)),
        Some(role) => anyhow::bail!("{} is a {} on {} and cannot edit cues", user, role, show.name),
        None => anyhow::bail!("{} is not on the team of {}", user, show.name),
    }
}

fn add_cue(
    output: &Output,
    show: &str,
    prefix: Option<&str>,
    number: Option<String>,
    fields: CueFields,
) -> Result<()> {
    let (project, show, mut sheet) = open_sheet_for_edit(show)?;

    let mut prefix = prefix.map(parse_prefix).transpose()?;
    if prefix.is_none() && number.is_none() && sheet.cues().is_empty() {
        prefix = project.config().project.cues.default_prefix()?;
        if let Some(p) = prefix {
            output.verbose_ctx("cue", &format!("Using default section {}", p));
        }
    }

    let cue = sheet.create_cue(CueDraft {
        prefix,
        cue_number: number,
        fields,
    })?;
    touch_show(&project.store(), &show.id)?;

    report(output, "Added", &cue);
    Ok(())
}

fn start_section(output: &Output, show: &str, prefix: &str, fields: CueFields) -> Result<()> {
    let (project, show, mut sheet) = open_sheet_for_edit(show)?;

    let cue = sheet.start_section(parse_prefix(prefix)?, fields)?;
    touch_show(&project.store(), &show.id)?;

    report(output, "Started section with", &cue);
    Ok(())
}

fn list_cues(output: &Output, show: &str) -> Result<()> {
    let (_, show, sheet) = open_sheet(show)?;

    if output.is_json() {
        output.data(&sheet.cues());
    } else {
        println!("{} ({})", show.name, show.id);
        println!();
        print_sheet(sheet.cues());
        if !sheet.cues().is_empty() {
            println!();
            println!("Total run time: {}", format_clock(sheet.total_run_time()));
        }
    }

    Ok(())
}

fn edit_cue(output: &Output, show: &str, cue: &str, fields: CueFields) -> Result<()> {
    if fields.is_empty() {
        anyhow::bail!("Nothing to change; pass at least one field flag");
    }

    let (project, show, mut sheet) = open_sheet_for_edit(show)?;
    let id = sheet.resolve(cue)?;

    let cue = sheet.update_cue(&id, fields)?;
    touch_show(&project.store(), &show.id)?;

    if output.is_json() {
        output.data(&cue);
    } else {
        print_cue(&cue);
    }
    Ok(())
}

fn set_status(output: &Output, show: &str, cue: &str, status: CueStatus) -> Result<()> {
    let (project, show, mut sheet) = open_sheet_for_edit(show)?;
    let id = sheet.resolve(cue)?;

    let cue = sheet.set_status(&id, status)?;
    touch_show(&project.store(), &show.id)?;

    if output.is_json() {
        output.data(&cue);
    } else {
        output.success(&format!("Cue {} is now {}", cue.cue_number, cue.status));
    }
    Ok(())
}

fn move_cue(output: &Output, show: &str, cue: &str, position: u64, strict: bool) -> Result<()> {
    let (project, show, mut sheet) = open_sheet_for_edit(show)?;
    let id = sheet.resolve(cue)?;
    let strict = strict || project.config().project.cues.strict_moves;

    let from = sheet.get(&id).map(|c| c.cue_number.clone()).unwrap_or_default();
    let index = usize::try_from(position - 1).unwrap_or(usize::MAX);
    output.verbose_ctx(
        "move",
        &format!("Moving {} to index {} (strict: {})", from, index, strict),
    );

    let cue = sheet.move_cue(&id, index, strict)?;
    touch_show(&project.store(), &show.id)?;

    if output.is_json() {
        output.data(&serde_json::json!({
            "id": cue.id.to_string(),
            "from": from,
            "cue_number": cue.cue_number,
            "position": sheet.position(&cue.id).map(|p| p + 1),
        }));
    } else if from == cue.cue_number {
        output.success(&format!("Cue {} is already in place", cue.cue_number));
    } else {
        output.success(&format!("Moved cue {} to {}", from, cue.cue_number));
    }
    Ok(())
}

fn delete_cue(output: &Output, show: &str, cue: &str) -> Result<()> {
    let (project, show, mut sheet) = open_sheet_for_edit(show)?;
    let id = sheet.resolve(cue)?;

    let cue = sheet.delete_cue(&id)?;
    touch_show(&project.store(), &show.id)?;

    if output.is_json() {
        output.data(&serde_json::json!({
            "id": cue.id.to_string(),
            "cue_number": cue.cue_number,
            "deleted": true,
        }));
    } else {
        output.success(&format!("Deleted cue {} ({})", cue.cue_number, cue.id));
    }
    Ok(())
}

fn print_snapshot(output: &Output, cues: &[Cue]) {
    if output.is_json() {
        output.data(&cues);
    } else {
        print_sheet(cues);
        println!();
    }
}

fn watch_cues(output: &Output, show: &str, timeout: Option<u64>) -> Result<()> {
    let project = Project::open_current()?;
    let store = project.store();
    let show = resolve_show(&store, show)?;

    let feed = project.feed()?;
    let subscription = feed.subscribe(Table::Cues, Some(show.id.clone()));
    let live = LiveSheet::start(store, show.id.clone(), subscription)?;

    if !output.is_json() {
        println!("Watching {} ({}), Ctrl-C to stop", show.name, show.id);
        println!();
    }
    print_snapshot(output, &live.snapshot());

    let deadline = timeout.map(|secs| Instant::now() + Duration::from_secs(secs));
    loop {
        let wait = match deadline {
            Some(deadline) => match deadline.checked_duration_since(Instant::now()) {
                Some(remaining) if !remaining.is_zero() => remaining,
                _ => break,
            },
            None => Duration::from_secs(3600),
        };

        if let Some(cues) = live.wait_for_update(wait) {
            print_snapshot(output, &cues);
        }
    }

    output.verbose_ctx("watch", "Watch timed out");
    Ok(())
}
