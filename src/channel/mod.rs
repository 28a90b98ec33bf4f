// Messaging-channel plumbing
//
// The real channel connection lives outside this crate; it feeds raw
// messages into an mpsc pair and drains acknowledgements from another.
// A line-oriented stdin adapter is included for driving the engine
// locally.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::commands::CommandDispatcher;
use crate::error::ParseError;
use crate::orchestrator::Orchestrator;
use crate::parser::SignalParser;

/// One inbound channel message. `reply_to` carries the signal id the
/// message replies to, already resolved by the channel collaborator.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub text: String,
    pub reply_to: Option<Uuid>,
}

/// Spawn a task that turns stdin lines into inbound messages.
///
/// Replies use the form `reply:<signal-id> <text>`; everything else is
/// treated as a fresh channel message.
pub fn stdin_source(buffer: usize) -> mpsc::Receiver<InboundMessage> {
    let (tx, rx) = mpsc::channel(buffer);

    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let message = parse_line(&line);
                    if tx.send(message).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break, // EOF
                Err(e) => {
                    tracing::error!("stdin read error: {}", e);
                    break;
                }
            }
        }
        tracing::info!("stdin source finished");
    });

    rx
}

fn parse_line(line: &str) -> InboundMessage {
    if let Some(rest) = line.strip_prefix("reply:") {
        let mut parts = rest.splitn(2, ' ');
        let id_part = parts.next().unwrap_or_default();
        let text = parts.next().unwrap_or_default().to_string();
        if let Ok(signal_id) = Uuid::parse_str(id_part) {
            return InboundMessage { text, reply_to: Some(signal_id) };
        }
    }
    // literal \n sequences let multi-line signals arrive as one stdin line
    InboundMessage { text: line.replace("\\n", "\n"), reply_to: None }
}

/// Spawn a task that prints acknowledgements (the stdin adapter's stand-in
/// for posting back to the channel).
pub fn ack_printer(mut ack_rx: mpsc::Receiver<String>) {
    tokio::spawn(async move {
        while let Some(ack) = ack_rx.recv().await {
            tracing::info!("[ack] {}", ack);
        }
    });
}

/// React to inbound messages until the channel closes: new messages go
/// through the parser to the orchestrator, replies to the dispatcher.
pub async fn ingestion_loop(
    mut rx: mpsc::Receiver<InboundMessage>,
    parser: SignalParser,
    orchestrator: Arc<Orchestrator>,
    dispatcher: CommandDispatcher,
    ack_tx: mpsc::Sender<String>,
) {
    tracing::info!("Signal ingestion loop starting");

    while let Some(message) = rx.recv().await {
        if message.text.is_empty() {
            continue;
        }

        let preview: String = message.text.replace('\n', " ").chars().take(100).collect();
        tracing::info!("New message: {}", preview);

        if let Some(signal_id) = message.reply_to {
            dispatcher.dispatch(signal_id, &message.text).await;
            continue;
        }

        match parser.parse(&message.text) {
            Ok(signal) => {
                let short_id = signal.short_id();
                match orchestrator.on_new_signal(signal).await {
                    Ok(placed) => {
                        let ack = format!("signal {}: {} orders placed", short_id, placed);
                        if ack_tx.send(ack).await.is_err() {
                            tracing::debug!("Acknowledgement channel closed");
                        }
                    }
                    Err(e) => {
                        tracing::error!("Failed to process signal {}: {}", short_id, e);
                    }
                }
            }
            Err(ParseError::NotASignal) => {
                tracing::debug!("Not a trading signal, ignoring");
            }
            Err(e) => {
                tracing::warn!("Discarding malformed signal: {}", e);
            }
        }
    }

    tracing::info!("Signal ingestion loop finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{PaperPlatform, ServerClock};
    use crate::config::ExpiryPolicy;
    use crate::decision::Tolerance;
    use crate::symbols::SymbolMapper;
    use std::collections::HashMap;

    #[test]
    fn test_parse_line_plain_message() {
        let message = parse_line("buy 3600 tp sl");
        assert!(message.reply_to.is_none());
        assert_eq!(message.text, "buy 3600 tp sl");
    }

    #[test]
    fn test_parse_line_unescapes_newlines() {
        let message = parse_line("buy 3600\\nSL 3592");
        assert_eq!(message.text, "buy 3600\nSL 3592");
    }

    #[test]
    fn test_parse_line_reply() {
        let id = Uuid::new_v4();
        let message = parse_line(&format!("reply:{} close all", id));
        assert_eq!(message.reply_to, Some(id));
        assert_eq!(message.text, "close all");
    }

    #[test]
    fn test_parse_line_bad_reply_id_falls_back_to_message() {
        let message = parse_line("reply:not-a-uuid close all");
        assert!(message.reply_to.is_none());
    }

    #[tokio::test]
    async fn test_ingestion_places_orders_and_acks() {
        let platform = Arc::new(PaperPlatform::new());
        platform.set_price("XAUUSD", 3600.3);
        let orchestrator = Arc::new(Orchestrator::new(
            platform.clone(),
            Arc::new(ServerClock::new()),
            SymbolMapper::new(HashMap::new()),
            "TestBroker".to_string(),
            Tolerance::Fixed(0.7),
            ExpiryPolicy::fixed(720),
        ));
        let parser = SignalParser::new(&["GOLD".to_string()], (3500.0, 3900.0));

        let (msg_tx, msg_rx) = mpsc::channel(4);
        let (ack_tx, mut ack_rx) = mpsc::channel(4);
        let dispatcher = CommandDispatcher::new(orchestrator.clone(), ack_tx.clone());

        msg_tx
            .send(InboundMessage {
                text: "buy 3600 now\ntp\nSL 3592".to_string(),
                reply_to: None,
            })
            .await
            .unwrap();
        msg_tx
            .send(InboundMessage { text: "great call!".to_string(), reply_to: None })
            .await
            .unwrap();
        drop(msg_tx);

        ingestion_loop(msg_rx, parser, orchestrator.clone(), dispatcher, ack_tx).await;

        // ICM layout: three fixed-offset targets
        assert_eq!(platform.placed_orders().len(), 3);
        assert_eq!(orchestrator.book().len().await, 1);

        let ack = ack_rx.recv().await.unwrap();
        assert!(ack.contains("3 orders placed"));
    }
}
