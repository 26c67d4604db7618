mod app;
mod commands;
mod config;
mod effects;
mod logging;

use anyhow::Result;
use chatscope_engine::EngineHandle;
use engine_logging::engine_info;

use crate::cli::{Cli, Command};
use config::AppConfig;

pub(crate) fn run(cli: Cli) -> Result<()> {
    let loaded = AppConfig::load(cli.config.as_deref());
    logging::initialize(&loaded);
    let config = loaded
        .config
        .with_overrides(|name| std::env::var(name).ok(), cli.base_url.as_deref());
    engine_info!("Using backend {}", config.base_url);

    let connect = || EngineHandle::new(config.backend_settings(cli.session.clone()));
    match &cli.command {
        Command::Run(args) => commands::run_workflow(&config, cli.session.clone(), args),
        Command::Status { task_id, analysis } => {
            commands::show_status(&connect()?, task_id, *analysis)
        }
        Command::Cancel { task_id } => commands::cancel_task(&connect()?, task_id),
        Command::Tasks => commands::list_tasks(&connect()?),
        Command::Fetch { kind, out } => {
            let out_dir = out.clone().unwrap_or_else(|| config.output_dir.clone());
            commands::fetch_data(&connect()?, (*kind).into(), &out_dir)
        }
        Command::Clear => commands::clear_session(&connect()?),
        Command::Search(args) => commands::search(&connect()?, args.query()),
        Command::Inspect { file, kind } => commands::inspect(file, kind.map(Into::into)),
    }
}
