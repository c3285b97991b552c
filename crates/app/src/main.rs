use std::sync::Arc;
use std::time::Duration;

use assistant::{Coordinator, CoordinatorConfig, Extractor, GeminiClient};
use engine::Currency;
use migration::{Migrator, MigratorTrait};
use settings::Database;

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "bilancino={level},telegram_bot={level},assistant={level},engine={level}",
            level = settings.app.level
        ))
        .init();

    let db = parse_database(&settings.database).await?;
    let engine = Arc::new(engine::Engine::builder().database(db).build().await?);

    let default_currency = match settings.assistant.default_currency.as_deref() {
        Some(code) => Currency::try_from(code)?,
        None => Currency::default(),
    };
    let timezone = match settings.assistant.timezone.as_deref() {
        Some(tz) => tz
            .parse::<chrono_tz::Tz>()
            .map_err(|err| format!("invalid timezone: {err}"))?,
        None => chrono_tz::Asia::Shanghai,
    };

    let client = GeminiClient::new(
        &settings.assistant.api_key,
        settings
            .assistant
            .model
            .as_deref()
            .unwrap_or(assistant::DEFAULT_MODEL),
        settings
            .assistant
            .base_url
            .as_deref()
            .unwrap_or(assistant::DEFAULT_BASE_URL),
        settings
            .assistant
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(assistant::DEFAULT_TIMEOUT),
    )?;

    let coordinator = Arc::new(Coordinator::new(
        engine,
        Extractor::new(client),
        CoordinatorConfig {
            allowed_user_id: settings.telegram.allowed_user_id,
            default_currency,
            timezone,
        },
    ));

    let mut tasks = tokio::task::JoinSet::new();
    tasks.spawn(async move {
        match telegram_bot::Bot::builder()
            .token(&settings.telegram.token)
            .coordinator(coordinator)
            .build()
        {
            Ok(bot) => bot.run().await,
            Err(err) => tracing::error!("failed to initialize telegram bot: {err}"),
        }
    });

    while tasks.join_next().await.is_some() {
        tasks.shutdown().await;
    }

    Ok(())
}

async fn parse_database(
    config: &Database,
) -> Result<sea_orm::DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let url = match config {
        Database::Memory => String::from("sqlite::memory:"),
        Database::Sqlite(path) => format!("sqlite:{}?mode=rwc", path),
    };

    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}
