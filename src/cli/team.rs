//! Team CLI commands

use anyhow::Result;
use clap::Subcommand;

use super::output::Output;
use super::show::{resolve_show, role_of};
use crate::domain::{Permission, Role, Show};
use crate::storage::{LocalStore, Project, Record, Store};

#[derive(Subcommand)]
pub enum TeamCommands {
    /// List a show's team
    List {
        /// Show ID or name
        show: String,
    },

    /// Add a user (name or email) to a show's team
    Add {
        /// Show ID or name
        show: String,

        /// User name or email
        user: String,

        /// Role to grant (admin, member, viewer)
        #[arg(long, default_value = "member")]
        role: Role,
    },

    /// Change a member's role
    Role {
        /// Show ID or name
        show: String,

        /// User name or email
        user: String,

        /// New role (admin, member, viewer)
        role: Role,
    },

    /// Remove a member from a show's team
    Rm {
        /// Show ID or name
        show: String,

        /// User name or email
        user: String,
    },
}

pub fn run(cmd: TeamCommands, output: &Output) -> Result<()> {
    match cmd {
        TeamCommands::List { show } => list_team(output, &show),
        TeamCommands::Add { show, user, role } => add_member(output, &show, &user, role),
        TeamCommands::Role { show, user, role } => change_role(output, &show, &user, role),
        TeamCommands::Rm { show, user } => remove_member(output, &show, &user),
    }
}

/// Opens the show and checks that the acting user may manage its team
fn open_for_management(reference: &str) -> Result<(LocalStore, Show)> {
    let project = Project::open_current()?;
    let store = project.store();
    let user = project.config().global.effective_user();
    let show = resolve_show(&store, reference)?;

    match role_of(&store, &show.id, &user)? {
        Some(role) if role.can_manage_team() => Ok((store, show)),
        _ => anyhow::bail!("{} cannot manage the team of {}", user, show.name),
    }
}

fn reject_owner_role(role: Role) -> Result<()> {
    if role == Role::Owner {
        anyhow::bail!("A show has exactly one owner; grant admin instead");
    }
    Ok(())
}

fn list_team(output: &Output, reference: &str) -> Result<()> {
    let project = Project::open_current()?;
    let store = project.store();
    let show = resolve_show(&store, reference)?;

    let mut members = store.select::<Permission>(|p| p.show_id == show.id)?;
    members.sort_by(|a, b| a.role.cmp(&b.role).then_with(|| a.user.cmp(&b.user)));

    if output.is_json() {
        output.data(&members);
    } else if members.is_empty() {
        println!("No team members for {}", show.name);
    } else {
        println!("{:<8} USER", "ROLE");
        println!("{}", "-".repeat(40));
        for member in &members {
            println!("{:<8} {}", member.role, member.user);
        }
    }

    Ok(())
}

fn add_member(output: &Output, reference: &str, user: &str, role: Role) -> Result<()> {
    reject_owner_role(role)?;
    let user = user.trim();
    if user.is_empty() {
        anyhow::bail!("User cannot be empty");
    }

    let (store, show) = open_for_management(reference)?;
    let member = Permission::new(show.id.clone(), user, role);

    if store.get::<Permission>(&member.key())?.is_some() {
        anyhow::bail!("{} is already on the team of {}", user, show.name);
    }
    store.insert(vec![member.clone()])?;

    if output.is_json() {
        output.data(&member);
    } else {
        output.success(&format!("Added {} to {} as {}", user, show.name, role));
    }

    Ok(())
}

fn change_role(output: &Output, reference: &str, user: &str, role: Role) -> Result<()> {
    reject_owner_role(role)?;

    let (store, show) = open_for_management(reference)?;
    let key = Permission::new(show.id.clone(), user, role).key();

    let current = store
        .get::<Permission>(&key)?
        .ok_or_else(|| anyhow::anyhow!("{} is not on the team of {}", user, show.name))?;
    if current.role == Role::Owner {
        anyhow::bail!("The owner's role cannot be changed");
    }

    let member = store
        .update::<Permission>(&key, |p| p.role = role)?
        .ok_or_else(|| anyhow::anyhow!("{} is not on the team of {}", user, show.name))?;

    if output.is_json() {
        output.data(&member);
    } else {
        output.success(&format!("{} is now {} on {}", member.user, role, show.name));
    }

    Ok(())
}

fn remove_member(output: &Output, reference: &str, user: &str) -> Result<()> {
    let (store, show) = open_for_management(reference)?;
    let key = Permission::new(show.id.clone(), user, Role::default()).key();

    let current = store
        .get::<Permission>(&key)?
        .ok_or_else(|| anyhow::anyhow!("{} is not on the team of {}", user, show.name))?;
    if current.role == Role::Owner {
        anyhow::bail!("The show owner cannot be removed");
    }

    store.delete::<Permission>(|p| p.key() == key)?;

    if output.is_json() {
        output.data(&serde_json::json!({
            "show_id": show.id.to_string(),
            "user": current.user,
            "removed": true,
        }));
    } else {
        output.success(&format!("Removed {} from {}", current.user, show.name));
    }

    Ok(())
}
