use relay_core::config::SessionStoreKind;
use relay_db::{connect_with_settings, migrations};

use crate::commands::{current_thread_runtime, load_config, CommandResult};

const COMMAND: &str = "migrate";

pub fn run() -> CommandResult {
    let config = match load_config(COMMAND) {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    if config.session.store == SessionStoreKind::Memory {
        return CommandResult::success(COMMAND, "session store is in-memory; no migrations to apply");
    }

    let runtime = match current_thread_runtime(COMMAND) {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let applied = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| CommandResult::failure(COMMAND, "db_connectivity", error.to_string(), 4))?;

        let result = migrations::run_pending(&pool).await;
        pool.close().await;
        result.map_err(|error| CommandResult::failure(COMMAND, "migration", error.to_string(), 5))?;

        let known = migrations::MIGRATOR
            .iter()
            .filter(|migration| migration.migration_type.is_up_migration())
            .count();
        Ok::<usize, CommandResult>(known)
    });

    match applied {
        Ok(known) => CommandResult::success(
            COMMAND,
            format!("applied pending migrations ({known} known) to {}", config.database.url),
        ),
        Err(failure) => failure,
    }
}
