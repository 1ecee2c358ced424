//! Show CLI commands

use anyhow::Result;
use chrono::Utc;
use clap::Subcommand;

use super::output::Output;
use crate::domain::time::format_clock;
use crate::domain::{
    format_last_updated, search_shows, Cue, Permission, Role, Show, ShowId, ShowStats,
};
use crate::sheet::CueSheet;
use crate::storage::{LocalStore, Project, Store};

#[derive(Subcommand)]
pub enum ShowCommands {
    /// Create a show owned by the current user
    New {
        /// Show name
        name: String,
    },

    /// List shows, most recently updated first
    List,

    /// Find shows by name
    Search {
        /// Case-insensitive text to look for in show names
        term: String,
    },

    /// Dashboard statistics across all shows
    Stats,

    /// Rename a show
    Rename {
        /// Show ID or name
        show: String,

        /// New name
        name: String,
    },

    /// Delete a show with its cues and team
    Rm {
        /// Show ID or name
        show: String,
    },

    /// Show details and the run sheet
    Open {
        /// Show ID or name
        show: String,
    },
}

pub fn run(cmd: ShowCommands, output: &Output) -> Result<()> {
    match cmd {
        ShowCommands::New { name } => new_show(output, &name),
        ShowCommands::List => list_shows(output, ""),
        ShowCommands::Search { term } => list_shows(output, &term),
        ShowCommands::Stats => show_stats(output),
        ShowCommands::Rename { show, name } => rename_show(output, &show, &name),
        ShowCommands::Rm { show } => delete_show(output, &show),
        ShowCommands::Open { show } => open_show(output, &show),
    }
}

/// Finds a show by ID or by exact (case-insensitive) name
pub(super) fn resolve_show<S: Store>(store: &S, reference: &str) -> Result<Show> {
    if let Ok(id) = reference.parse::<ShowId>() {
        return store
            .get::<Show>(&id.to_string())?
            .ok_or_else(|| anyhow::anyhow!("Show not found: {}", id));
    }

    let mut matches = store.select::<Show>(|s| s.name.eq_ignore_ascii_case(reference))?;
    match matches.len() {
        0 => anyhow::bail!("Show not found: {}", reference),
        1 => Ok(matches.remove(0)),
        n => anyhow::bail!(
            "{} shows are named '{}'; use the show ID instead",
            n,
            reference
        ),
    }
}

/// Role of `user` on a show, if they are on its team
pub(super) fn role_of<S: Store>(store: &S, show_id: &ShowId, user: &str) -> Result<Option<Role>> {
    let user = user.to_lowercase();
    let members =
        store.select::<Permission>(|p| p.show_id == *show_id && p.user.to_lowercase() == user)?;
    Ok(members.first().map(|p| p.role))
}

/// Bumps a show's `updated_at` after its cues changed
pub(super) fn touch_show<S: Store>(store: &S, show_id: &ShowId) -> Result<()> {
    store.update::<Show>(&show_id.to_string(), Show::touch)?;
    Ok(())
}

fn new_show(output: &Output, name: &str) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("Show name cannot be empty");
    }

    let project = Project::open_current()?;
    let store = project.store();
    let user = project.config().global.effective_user();

    let show = Show::new(name, &user);
    store.insert(vec![show.clone()])?;
    store.insert(vec![Permission::new(show.id.clone(), &user, Role::Owner)])?;
    output.verbose_ctx("show", &format!("Recorded {} as owner of {}", user, show.id));

    if output.is_json() {
        output.data(&show);
    } else {
        output.success(&format!("Created show: {} - {}", show.id, show.name));
    }

    Ok(())
}

fn all_cues(store: &LocalStore) -> Result<Vec<Cue>> {
    store.select::<Cue>(|_| true)
}

fn list_shows(output: &Output, term: &str) -> Result<()> {
    let project = Project::open_current()?;
    let store = project.store();

    let shows = store.select::<Show>(|_| true)?;
    let cues = all_cues(&store)?;
    let found = search_shows(&shows, term);
    let now = Utc::now();

    if output.is_json() {
        let items: Vec<_> = found
            .iter()
            .map(|s| {
                serde_json::json!({
                    "id": s.id.to_string(),
                    "name": s.name,
                    "owner": s.owner,
                    "cues": cues.iter().filter(|c| c.show_id == s.id).count(),
                    "updated_at": s.updated_at,
                    "last_updated": format_last_updated(s.updated_at, now),
                })
            })
            .collect();
        output.data(&items);
    } else if found.is_empty() {
        if term.is_empty() {
            println!("No shows");
        } else {
            println!("No shows matching '{}'", term);
        }
    } else {
        println!("{:<12} {:<6} {:<16} NAME", "ID", "CUES", "UPDATED");
        println!("{}", "-".repeat(60));

        for show in found {
            let count = cues.iter().filter(|c| c.show_id == show.id).count();
            println!(
                "{:<12} {:<6} {:<16} {}",
                show.id,
                count,
                format_last_updated(show.updated_at, now),
                show.name
            );
        }
    }

    Ok(())
}

fn show_stats(output: &Output) -> Result<()> {
    let project = Project::open_current()?;
    let store = project.store();

    let shows = store.select::<Show>(|_| true)?;
    let cues = all_cues(&store)?;
    let stats = ShowStats::compute(&shows, &cues);

    if output.is_json() {
        output.data(&stats);
    } else {
        println!("Total shows: {}", stats.total_shows);
        println!("Active shows: {}", stats.active_shows);
        println!("Average show duration: {}", stats.avg_show_duration);
    }

    Ok(())
}

fn rename_show(output: &Output, reference: &str, name: &str) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("Show name cannot be empty");
    }

    let project = Project::open_current()?;
    let store = project.store();
    let user = project.config().global.effective_user();
    let show = resolve_show(&store, reference)?;

    match role_of(&store, &show.id, &user)? {
        Some(role) if role.can_manage_team() => {}
        _ => anyhow::bail!("{} cannot rename {}", user, show.name),
    }

    let show = store
        .update::<Show>(&show.id.to_string(), |s| s.rename(name))?
        .ok_or_else(|| anyhow::anyhow!("Show not found: {}", show.id))?;

    if output.is_json() {
        output.data(&show);
    } else {
        output.success(&format!("Renamed show {} to {}", show.id, show.name));
    }

    Ok(())
}

fn delete_show(output: &Output, reference: &str) -> Result<()> {
    let project = Project::open_current()?;
    let store = project.store();
    let user = project.config().global.effective_user();
    let show = resolve_show(&store, reference)?;

    if role_of(&store, &show.id, &user)? != Some(Role::Owner) {
        anyhow::bail!("Only the show owner can delete {}", show.name);
    }

    let cues = store.delete::<Cue>(|c| c.show_id == show.id)?;
    let members = store.delete::<Permission>(|p| p.show_id == show.id)?;
    store.delete::<Show>(|s| s.id == show.id)?;
    output.verbose_ctx(
        "show",
        &format!("Removed {} cues and {} team entries", cues.len(), members.len()),
    );

    if output.is_json() {
        output.data(&serde_json::json!({
            "id": show.id.to_string(),
            "deleted": true,
            "cues_deleted": cues.len(),
        }));
    } else {
        output.success(&format!("Deleted show: {} - {}", show.id, show.name));
    }

    Ok(())
}

fn open_show(output: &Output, reference: &str) -> Result<()> {
    let project = Project::open_current()?;
    let store = project.store();
    let show = resolve_show(&store, reference)?;
    let sheet = CueSheet::load(store, show.id.clone())?;

    if output.is_json() {
        output.data(&serde_json::json!({
            "show": show,
            "cues": sheet.cues(),
            "total_run_time": format_clock(sheet.total_run_time()),
        }));
        return Ok(());
    }

    println!("Show: {}", show.id);
    println!("Name: {}", show.name);
    println!("Owner: {}", show.owner);
    println!("Created: {}", show.created_at.format("%Y-%m-%d %H:%M"));
    println!(
        "Updated: {}",
        format_last_updated(show.updated_at, Utc::now())
    );
    println!("Total run time: {}", format_clock(sheet.total_run_time()));
    println!();
    super::cue::print_sheet(sheet.cues());

    Ok(())
}
