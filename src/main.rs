use clap::Parser;
use color_eyre::Result;
use std::io::{self, Write};
use std::sync::Arc;
use taskflow::clock::{Clock, SystemClock};
use taskflow::cli::{self, AddArgs, Cli, Commands, EditArgs, ListArgs};
use taskflow::controller::TaskListController;
use taskflow::logging::{self, LOG_FILE_NAME, LogTarget};
use taskflow::service::TaskService;
use taskflow::tui::{App, Route};
use taskflow::utils::{self, expand_path};
use taskflow::{Config, Profile};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    // --dev keeps a separate config and database
    let profile = if cli.dev { Profile::Dev } else { Profile::Prod };

    let mut config = match cli.config.as_deref() {
        Some(path) => Config::load_from_path(&expand_path(path), profile)?,
        None => Config::load_with_profile(profile)?,
    };
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }

    let command = cli.command.unwrap_or(Commands::Tui { route: "/".to_string() });

    let target = match command {
        Commands::Tui { .. } => LogTarget::File(
            utils::get_data_dir(profile)
                .unwrap_or_else(std::env::temp_dir)
                .join(LOG_FILE_NAME),
        ),
        _ => LogTarget::Stderr,
    };
    logging::init_tracing(&logging::level_for(&config.log_level, cli.verbose), target)?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let client = cli::build_client(&config, clock.clone())?;
    let service = Arc::new(TaskService::new(client, config.remote.table.clone(), clock));
    tracing::debug!(backend = %service.backend_label(), "service ready");

    let signed_in = cli::is_signed_in(&config);
    if !signed_in && !matches!(command, Commands::Tui { .. }) {
        return Err(cli::CliError::SignedOut.into());
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match command {
        Commands::Tui { route } => {
            drop(out);
            let controller = TaskListController::new(service);
            let mut app = App::new(config, controller, tokio::runtime::Handle::current(), Route::from_path(&route));
            app.start(signed_in);
            // The event loop blocks on terminal input
            tokio::task::spawn_blocking(move || taskflow::tui::run_event_loop(app)).await??;
            return Ok(());
        }
        Commands::Add { title, description, priority, status, due, tags } => {
            let args = AddArgs { title, description, priority, status, due, tags };
            cli::handle_add(&service, args, &mut out).await?;
        }
        Commands::List { filter, search, status, priority, limit } => {
            let args = ListArgs { filter, search, status, priority, limit };
            cli::handle_list(&service, args, &mut out).await?;
        }
        Commands::Show { id } => cli::handle_show(&service, &id, &mut out).await?,
        Commands::Edit { id, title, description, priority, status, due, clear_due, tags } => {
            let args = EditArgs { title, description, priority, status, due, clear_due, tags };
            cli::handle_edit(&service, &id, args, &mut out).await?;
        }
        Commands::Toggle { id } => cli::handle_toggle(&service, &id, &mut out).await?,
        Commands::Delete { id, yes } => {
            let confirmed = yes
                || cli::prompt_confirm(&format!("Delete task {}?", id), &mut io::stdin().lock(), &mut out)?;
            cli::handle_delete(&service, &id, confirmed, &mut out).await?;
        }
        Commands::Stats => cli::handle_stats(&service, &mut out).await?,
    }

    out.flush()?;
    Ok(())
}
