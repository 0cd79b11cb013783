use std::sync::Arc;

use relay_agent::llm::{LanguageOracle, OpenAiCompatibleOracle};
use relay_agent::prompts::SystemClock;
use relay_agent::tools::{InMemoryCalendar, InMemorySpreadsheet};
use relay_agent::{AgentRuntime, RuntimeDeps, RuntimeSettings};
use relay_core::config::AppConfig;
use relay_core::domain::session::ConversationId;
use relay_db::InMemorySessionRepository;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::commands::{current_thread_runtime, load_config, CommandResult, EXIT_SETUP};

const COMMAND: &str = "chat";
pub const LOCAL_IDENTITY: &str = "local";
const EXIT_WORDS: &[&str] = &["exit", "quit", ":q"];

pub fn run() -> CommandResult {
    let config = match load_config(COMMAND) {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let oracle = match OpenAiCompatibleOracle::from_config(&config.llm) {
        Ok(oracle) => oracle,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "oracle_setup",
                format!("failed to build oracle client: {error}"),
                EXIT_SETUP,
            );
        }
    };

    let runtime = match current_thread_runtime(COMMAND) {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let agent = local_runtime(Arc::new(oracle), &config);
    let session = runtime.block_on(async {
        let mut stdout = tokio::io::stdout();
        converse(&agent, BufReader::new(tokio::io::stdin()), &mut stdout).await
    });

    match session {
        Ok(turns) => CommandResult::success(COMMAND, format!("session ended after {turns} turn(s)")),
        Err(error) => CommandResult::failure(COMMAND, "chat_session", error.to_string(), 4),
    }
}

pub fn local_runtime(oracle: Arc<dyn LanguageOracle>, config: &AppConfig) -> AgentRuntime {
    AgentRuntime::new(
        RuntimeDeps {
            oracle,
            calendar: Arc::new(InMemoryCalendar::default()),
            sheets: Arc::new(InMemorySpreadsheet::default()),
            sessions: Arc::new(InMemorySessionRepository::default()),
            clock: Arc::new(SystemClock),
        },
        RuntimeSettings::from_config(config),
    )
}

/// Reads utterances line by line until EOF or an exit word, writing each reply.
/// Returns the number of handled turns.
pub async fn converse<R, W>(runtime: &AgentRuntime, input: R, output: &mut W) -> anyhow::Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let conversation_id = ConversationId(LOCAL_IDENTITY.to_string());
    let mut lines = input.lines();
    let mut turns = 0usize;

    prompt(output).await?;
    while let Some(line) = lines.next_line().await? {
        let utterance = line.trim();
        if EXIT_WORDS.contains(&utterance.to_lowercase().as_str()) {
            break;
        }
        if !utterance.is_empty() {
            turns += 1;
            let correlation_id = format!("chat-{turns}");
            let reply =
                runtime.handle_message(&conversation_id, utterance, &correlation_id).await?;
            output.write_all(format!("{reply}\n").as_bytes()).await?;
        }
        prompt(output).await?;
    }
    output.write_all(b"\n").await?;
    output.flush().await?;

    Ok(turns)
}

async fn prompt<W: AsyncWrite + Unpin>(output: &mut W) -> std::io::Result<()> {
    output.write_all(b"> ").await?;
    output.flush().await
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::Arc;

    use relay_agent::llm::ScriptedOracle;
    use relay_core::config::AppConfig;

    use super::{converse, local_runtime};

    #[tokio::test]
    async fn replies_are_written_per_line_until_exit() {
        let oracle = Arc::new(ScriptedOracle::new([
            r#"{"action":"other"}"#,
            r#"{"action":"other"}"#,
            "Hi there",
        ]));
        let runtime = local_runtime(oracle.clone(), &AppConfig::default());
        let mut output = Vec::new();

        let turns = converse(
            &runtime,
            Cursor::new("hola\n\nconfigurar estilo: pirata\nexit\nnever read\n"),
            &mut output,
        )
        .await
        .expect("chat session");

        let transcript = String::from_utf8(output).expect("utf8");
        assert_eq!(turns, 2);
        assert!(transcript.contains("Hi there\n"), "{transcript}");
        assert!(transcript.contains("Style updated to: pirata\n"), "{transcript}");
        assert_eq!(oracle.request_count().await, 3);
    }
}
