use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

use sprout::ai::{AiClient, ConversationNamer, MessagePipeline};
use sprout::auth::{AuthService, BackendClient, TokenStore};
use sprout::chat::{ChatSessionController, SendOutcome, SidebarSelectionController};
use sprout::config::AppConfig;
use sprout::models::Role;
use sprout::services::ConversationRepository;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = AppConfig::from_env();

    let store_path: std::path::PathBuf = std::env::var("SPROUT_AUTH_PATH")
        .map(Into::into)
        .unwrap_or_else(|_| TokenStore::default_path());
    let store = TokenStore::open(store_path).await;

    let backend = BackendClient::new(
        config.backend_base_url.clone(),
        store,
        config.request_timeout(),
    );
    let auth = AuthService::new(backend.clone());

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut out = tokio::io::stdout();

    let session_info = auth.session().await;
    if !session_info.is_authenticated {
        out.write_all(b"email: ").await?;
        out.flush().await?;
        let email = input.next_line().await?.unwrap_or_default();
        out.write_all(b"password: ").await?;
        out.flush().await?;
        let password = input.next_line().await?.unwrap_or_default();
        auth.login(email.trim(), password.trim())
            .await
            .context("Login failed")?;
    }
    if let Some(user) = auth.session().await.user {
        println!("Signed in as {}", user.name);
    }

    let generator = Arc::new(
        AiClient::new(
            &config.ai_endpoint,
            &config.ai_api_key,
            config.request_timeout(),
        )
        .context("Invalid AI endpoint")?,
    );
    let repository = ConversationRepository::new(backend.clone());

    let mut session = ChatSessionController::new(
        MessagePipeline::new(generator.clone()),
        ConversationNamer::new(generator),
        repository.clone(),
        config.message_limit,
    );
    let mut sidebar =
        SidebarSelectionController::new(repository, config.long_press_threshold());

    session.start().await;
    print_last_reply(&session);
    println!("Commands: /new /list /hold <n> /tap <n> /all /delete /logout /quit");

    while let Some(line) = input.next_line().await? {
        let line = line.trim().to_string();
        match line.split_whitespace().collect::<Vec<_>>().as_slice() {
            [] => continue,
            ["/quit"] => break,
            ["/logout"] => {
                auth.logout().await;
                println!("Signed out.");
                break;
            }
            ["/new"] => {
                session.new_conversation().await;
                print_last_reply(&session);
            }
            ["/list"] => match sidebar.refresh().await {
                Ok(()) => {
                    for (i, conversation) in sidebar.conversations().iter().enumerate() {
                        let mark = if sidebar.selected().contains(&conversation.id) {
                            "*"
                        } else {
                            " "
                        };
                        println!(
                            "{mark}{:>2}. {} {}",
                            i + 1,
                            conversation.icon,
                            conversation.title
                        );
                    }
                }
                Err(e) => println!("Could not load conversations: {e}"),
            },
            ["/hold", n] => {
                if let Some(id) = nth_id(&sidebar, n) {
                    // A held row: press now, release after the threshold.
                    sidebar.press_started(&id);
                    tokio::time::sleep(config.long_press_threshold()).await;
                    sidebar.press_finished(&id);
                    println!("{} selected", sidebar.selected().len());
                }
            }
            ["/tap", n] => {
                if let Some(id) = nth_id(&sidebar, n) {
                    sidebar.press_started(&id);
                    if let Some(open_id) = sidebar.press_finished(&id) {
                        session.open_conversation(open_id);
                        println!("Opened conversation.");
                    } else {
                        println!("{} selected", sidebar.selected().len());
                    }
                }
            }
            ["/all"] => {
                sidebar.select_all();
                println!("{} selected", sidebar.selected().len());
            }
            ["/delete"] => match sidebar.delete_selected(session.active_conversation_id()).await {
                Ok(active_deleted) => {
                    println!("Deleted.");
                    if active_deleted {
                        session.new_conversation().await;
                        print_last_reply(&session);
                    }
                }
                Err(e) => println!("Delete failed: {e}"),
            },
            _ => match session.send(&line, None).await {
                SendOutcome::Replied => print_last_reply(&session),
                SendOutcome::LimitReached => {
                    println!("Message limit reached for this session. Start a /new conversation.")
                }
                SendOutcome::Rejected => {}
                SendOutcome::Superseded => {}
            },
        }
    }

    Ok(())
}

fn print_last_reply(session: &ChatSessionController) {
    if let Some(message) = session
        .messages()
        .iter()
        .rev()
        .find(|m| m.role == Role::Assistant)
    {
        println!("sprout: {}", message.text);
    }
}

fn nth_id(sidebar: &SidebarSelectionController, n: &str) -> Option<String> {
    let index: usize = n.parse().ok()?;
    let conversation = sidebar.conversations().get(index.checked_sub(1)?)?;
    Some(conversation.id.clone())
}
