use std::path::PathBuf;

use arcos::cli::{self, Cli, Commands, ConfigTarget, Session};
use arcos::confirm::{AssumeYes, Confirm, StdinConfirm};
use arcos::{Config, Profile, logging};
use clap::Parser;
use color_eyre::Result;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Set up error reporting with color-eyre
    color_eyre::install()?;

    let cli = Cli::parse();

    // --config wins over the profile's default location
    let (config, target) = match &cli.config {
        Some(path) => {
            let path = PathBuf::from(path);
            (Config::load_from_path(&path)?, ConfigTarget::Path(path))
        }
        None => {
            let profile = if cli.dev { Profile::Dev } else { Profile::Prod };
            (Config::load_with_profile(profile)?, ConfigTarget::Profile(profile))
        }
    };

    logging::init(config.log_filter.as_deref());

    let mut session = Session::open(config, target, cli.wallet)?;
    let confirm: &dyn Confirm = if cli.yes { &AssumeYes } else { &StdinConfirm };

    // Dispatch to appropriate command handler
    match cli.command.unwrap_or(Commands::Board { filter: None }) {
        Commands::Board { filter } => cli::handle_board(&session, filter).await?,
        Commands::AddTask {
            content,
            column,
            due,
            tags,
            assignee,
            bounty,
        } => cli::handle_add_task(&session, content, column, due, tags, assignee, bounty).await?,
        Commands::EditTask {
            id,
            content,
            due,
            assignee,
            bounty,
        } => cli::handle_edit_task(&session, id, content, due, assignee, bounty).await?,
        Commands::MoveTask { id, column } => cli::handle_move_task(&session, id, column).await?,
        Commands::Reorder { id, over } => cli::handle_reorder(&session, id, over).await?,
        Commands::Tag { id, tag } => cli::handle_tag(&session, id, tag).await?,
        Commands::Subtask {
            id,
            content,
            toggle,
            remove,
        } => cli::handle_subtask(&session, id, content, toggle, remove).await?,
        Commands::DeleteTask { id } => cli::handle_delete_task(&session, id, confirm).await?,
        Commands::Archive => cli::handle_archive(&session, confirm).await?,
        Commands::Templates { category } => cli::handle_templates(category),
        Commands::ApplyTemplate { title } => cli::handle_apply_template(&session, title).await?,
        Commands::Export { path } => cli::handle_export(&session, path).await?,
        Commands::Import { path } => cli::handle_import(&session, &path).await?,
        Commands::AddNote {
            title,
            content,
            tags,
            encrypted,
        } => cli::handle_add_note(&session, title, content, tags, encrypted).await?,
        Commands::Notes { filter, encrypted } => cli::handle_notes(&session, filter, encrypted).await?,
        Commands::ShowNote { id, encrypted } => cli::handle_show_note(&session, id, encrypted).await?,
        Commands::DeleteNote { id, encrypted } => {
            cli::handle_delete_note(&session, id, encrypted, confirm).await?
        }
        Commands::Anchor { id, encrypted } => cli::handle_anchor(&session, id, encrypted).await?,
        Commands::SetPassword => cli::handle_set_password(&session).await?,
        Commands::Workspaces => cli::handle_workspaces(&session),
        Commands::NewWorkspace { name, template } => {
            cli::handle_new_workspace(&mut session, name, template).await?
        }
        Commands::UseWorkspace { workspace } => cli::handle_use_workspace(&mut session, workspace)?,
        Commands::Profile => cli::handle_profile(&session).await?,
        Commands::SetProfile { nickname, job_title, age } => {
            cli::handle_set_profile(&session, nickname, job_title, age).await?
        }
        Commands::History => cli::handle_history(&session).await?,
        Commands::Focus { minutes, reason } => cli::handle_focus(&session, minutes, reason).await?,
    }

    Ok(())
}
