//! Line console: each stdin line `<event> [json]` is dispatched as a
//! command and the reply is printed.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

use corekit_runtime::prelude::*;

use super::dispatcher::Dispatcher;

#[derive(Debug, Clone, Deserialize)]
struct ReplSettings {
    #[serde(default)]
    enabled: bool,
    #[serde(default = "default_prompt")]
    prompt: String,
}

fn default_prompt() -> String {
    "corekit> ".to_string()
}

/// The registered console.
#[derive(Debug)]
pub struct Repl {
    settings: ReplSettings,
    dispatcher: Arc<Dispatcher>,
}

impl Repl {
    /// Whether stdin is being read.
    pub fn enabled(&self) -> bool {
        self.settings.enabled
    }

    /// Splits a console line into an event type and its data.
    pub fn parse_line(line: &str) -> AppResult<Option<(String, Value)>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (event, rest) = match line.split_once(char::is_whitespace) {
            Some((event, rest)) => (event, rest.trim()),
            None => (line, ""),
        };
        let data = if rest.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(rest)
                .map_err(|e| AppError::command(format!("Invalid JSON for \"{event}\": {e}")))?
        };
        Ok(Some((event.to_string(), data)))
    }

    /// Dispatches one console line. Returns whether a command listened.
    pub fn evaluate(&self, line: &str) -> AppResult<bool> {
        let Some((event_type, data)) = Self::parse_line(line)? else {
            return Ok(false);
        };
        if !self.dispatcher.has_command(&event_type) {
            return Err(AppError::command(format!("Unknown command \"{event_type}\"")));
        }

        let responder = Responder::new(|reply| println!("{}", reply.to_value()));
        let event = CommandEvent::new(data).with_responder(responder);
        Ok(self.dispatcher.dispatch(&event_type, event) > 0)
    }

    fn spawn_reader(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            let mut stdout = tokio::io::stdout();
            loop {
                if let Err(e) = write_prompt(&mut stdout, &self.settings.prompt).await {
                    debug!(error = %e, "Console prompt not written");
                }
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if let Err(e) = self.evaluate(&line) {
                            warn!(error = %e, "Console command rejected");
                        }
                    }
                    Ok(None) => {
                        debug!("Console input closed");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "Console read failed");
                        break;
                    }
                }
            }
        });
    }
}

impl Module for Repl {}

async fn write_prompt<W>(out: &mut W, prompt: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    out.write_all(prompt.as_bytes()).await?;
    out.flush().await
}

/// Builds the [`Repl`] once the dispatcher is available.
pub struct ReplInit;

#[async_trait]
impl Initializable for ReplInit {
    async fn init(
        &self,
        context: Arc<Application>,
        config: ModuleConfig,
    ) -> AppResult<Option<ModuleInstance>> {
        let settings: ReplSettings = config.parse()?;
        let dispatcher = context
            .solve_dependencies(&config.moduleid, &["dispatcher"])
            .await?
            .into_iter()
            .next()
            .and_then(|instance| instance.downcast::<Dispatcher>())
            .ok_or_else(|| AppError::module("\"dispatcher\" is not the dispatcher module"))?;

        let repl = Arc::new(Repl {
            settings,
            dispatcher,
        });
        if repl.enabled() {
            repl.clone().spawn_reader();
        }
        Ok(Some(ModuleInstance::from_arc(repl)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_line() {
        assert_eq!(
            Repl::parse_line("  user.create {\"name\": \"ada\"} ").unwrap(),
            Some(("user.create".to_string(), json!({"name": "ada"})))
        );
        assert_eq!(
            Repl::parse_line("status").unwrap(),
            Some(("status".to_string(), Value::Null))
        );
        assert_eq!(Repl::parse_line("   ").unwrap(), None);
        assert!(Repl::parse_line("status {oops").is_err());
    }

    #[tokio::test]
    async fn test_prompt_is_written_without_newline() {
        let settings: ReplSettings = serde_json::from_value(json!({ "enabled": true })).unwrap();
        let mut out = Vec::new();
        write_prompt(&mut out, &settings.prompt).await.unwrap();
        write_prompt(&mut out, "> ").await.unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "corekit> > ");
    }
}
