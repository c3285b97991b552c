use assistant::{ImagePayload, Inbound, Outcome};
use teloxide::{
    net::Download,
    prelude::*,
    types::{ChatAction, InputFile},
};

use crate::{ConfigParameters, export, ui};

pub(crate) async fn handle_message(
    bot: Bot,
    msg: Message,
    cfg: ConfigParameters,
) -> ResponseResult<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let user_id = from.id.0;
    let chat_id = msg.chat.id;

    if let Some(text) = msg.text()
        && let Some(cmd) = parse_command(text)
    {
        // Unauthorized users are ignored silently, commands included.
        if !cfg.coordinator.authorized(user_id) {
            tracing::warn!(user_id, "ignoring command from unauthorized user");
            return Ok(());
        }
        match cmd {
            Command::Start => {
                bot.send_message(chat_id, welcome_text()).await?;
            }
            Command::Help => {
                bot.send_message(chat_id, help_text()).await?;
            }
            Command::Report => {
                let _ = bot.send_chat_action(chat_id, ChatAction::Typing).await;
                match cfg.coordinator.report(user_id).await {
                    Ok(outcome) => {
                        let reply = ui::render_outcome(&outcome);
                        if !reply.is_empty() {
                            bot.send_message(chat_id, reply).await?;
                        }
                    }
                    Err(err) => {
                        bot.send_message(chat_id, ui::render_error(&err)).await?;
                    }
                }
            }
            Command::Export => {
                send_export(&bot, chat_id, user_id, &cfg).await?;
            }
        }
        return Ok(());
    }

    let image = download_photo(&bot, &msg).await?;
    let text = msg
        .text()
        .or_else(|| msg.caption())
        .map(|t| t.to_string());
    if text.is_none() && image.is_none() {
        return Ok(());
    }

    // Non-intrusive progress signal while extraction runs.
    let _ = bot.send_chat_action(chat_id, ChatAction::Typing).await;

    match cfg
        .coordinator
        .handle(Inbound {
            user_id,
            text,
            image,
        })
        .await
    {
        Ok(Outcome::Unauthorized) => {}
        Ok(outcome) => {
            let reply = ui::render_outcome(&outcome);
            if !reply.is_empty() {
                bot.send_message(chat_id, reply).await?;
            }
        }
        Err(err) => {
            bot.send_message(chat_id, ui::render_error(&err)).await?;
        }
    }

    Ok(())
}

async fn send_export(
    bot: &Bot,
    chat_id: ChatId,
    user_id: u64,
    cfg: &ConfigParameters,
) -> ResponseResult<()> {
    match cfg.coordinator.month_records(user_id).await {
        Ok(None) => {}
        Ok(Some((period, records))) => {
            if records.is_empty() {
                bot.send_message(chat_id, "No records this month yet.")
                    .await?;
                return Ok(());
            }
            match export::records_csv(&records) {
                Ok(bytes) => {
                    let filename = format!("ledger-{}.csv", period.start.format("%Y-%m"));
                    bot.send_document(chat_id, InputFile::memory(bytes).file_name(filename))
                        .await?;
                }
                Err(err) => {
                    tracing::error!(error = %err, "csv export failed");
                    bot.send_message(chat_id, "Export failed, try again later.")
                        .await?;
                }
            }
        }
        Err(err) => {
            bot.send_message(chat_id, ui::render_error(&err)).await?;
        }
    }
    Ok(())
}

async fn download_photo(bot: &Bot, msg: &Message) -> ResponseResult<Option<ImagePayload>> {
    let Some(photos) = msg.photo() else {
        return Ok(None);
    };
    // Telegram sends several sizes; take the largest for legible receipts.
    let Some(photo) = photos.iter().max_by_key(|p| p.width * p.height) else {
        return Ok(None);
    };

    let file = bot.get_file(photo.file.id.clone()).await?;
    let mut data = Vec::new();
    if let Err(err) = bot.download_file(&file.path, &mut data).await {
        tracing::warn!(error = %err, "photo download failed");
        return Ok(None);
    }

    Ok(Some(ImagePayload {
        mime_type: "image/jpeg".to_string(),
        data,
    }))
}

#[derive(Debug, Clone, Copy)]
enum Command {
    Start,
    Help,
    Report,
    Export,
}

fn parse_command(text: &str) -> Option<Command> {
    let trimmed = text.trim();
    if !trimmed.starts_with('/') {
        return None;
    }
    let cmd = trimmed.split_whitespace().next().unwrap_or("");

    match cmd {
        "/start" => Some(Command::Start),
        "/help" => Some(Command::Help),
        "/report" => Some(Command::Report),
        "/export" => Some(Command::Export),
        _ => None,
    }
}

fn welcome_text() -> &'static str {
    "Hi! I'm your personal finance assistant.\n\nSend me any expense, income or receipt photo and I'll track it:\n\nlunch 20\nsalary 3000 yesterday\n(photo of a receipt)\n\nAsk \"how much did I spend on food?\" or use /report for the monthly analysis."
}

fn help_text() -> &'static str {
    "Commands:\n/start - welcome message\n/report - monthly summary, 50/30/20 check and forecast\n/export - this month's records as CSV\n/help - this message\n\nAnything else is interpreted directly: expenses, income, balances, receipt photos, questions, or \"delete the taxi expense\"."
}
