use anyhow::Result;

use crate::{
    cli::{Cli, Command},
    session::ClientSession,
    shell::{self, PrintNotifier, StdConsole},
    usecases::bootstrap,
};

pub fn run(cli: Cli) -> Result<()> {
    match cli.command_or_default() {
        Command::Run => {
            let context = bootstrap::bootstrap(cli.config.as_deref())?;
            tracing::info!(
                sandbox_users = context.config.sandbox.users.len(),
                freshness_window_ms = context.config.notifications.freshness_window_ms,
                "starting interactive shell"
            );

            let mut session = ClientSession::new(
                context.backend.clone(),
                context.backend.auth_gateway(),
                PrintNotifier,
                context.config.notifications.freshness_window_ms,
            );
            let mut console = StdConsole;
            shell::start(&mut console, &mut session)?;
        }
    }

    Ok(())
}
