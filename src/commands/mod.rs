// Reply-command dispatch
//
// Replies to a signal message drive its order group: close everything,
// force break-even, or bank the first target. Anything else is ignored.

use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::orchestrator::Orchestrator;

/// Recognized reply commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAction {
    CloseSignal,
    ForceBreakEven,
    CloseFirstTarget,
}

const CLOSE_ALL_PHRASES: [&str; 3] = ["close all", "close full", "exit all"];
const BREAK_EVEN_PHRASES: [&str; 3] = ["breakeven", "break even", "sl to entry"];
const FIRST_TARGET_PHRASE: &str = "tp1";

/// Map reply text to an action. Case-insensitive keyword matching;
/// unrecognized text yields `None`.
pub fn parse_command(text: &str) -> Option<CommandAction> {
    let lower = text.to_lowercase();

    if CLOSE_ALL_PHRASES.iter().any(|p| lower.contains(p)) {
        return Some(CommandAction::CloseSignal);
    }
    if BREAK_EVEN_PHRASES.iter().any(|p| lower.contains(p)) {
        return Some(CommandAction::ForceBreakEven);
    }
    if lower.contains(FIRST_TARGET_PHRASE) {
        return Some(CommandAction::CloseFirstTarget);
    }
    None
}

pub struct CommandDispatcher {
    orchestrator: Arc<Orchestrator>,
    ack_tx: mpsc::Sender<String>,
}

impl CommandDispatcher {
    pub fn new(orchestrator: Arc<Orchestrator>, ack_tx: mpsc::Sender<String>) -> Self {
        Self { orchestrator, ack_tx }
    }

    /// Execute the command a reply carries against its signal's orders.
    ///
    /// The signal id arrives already resolved from message threading.
    /// Returns the recognized action, if any.
    pub async fn dispatch(&self, signal_id: Uuid, text: &str) -> Option<CommandAction> {
        let action = parse_command(text)?;

        let affected = match action {
            CommandAction::CloseSignal => self.orchestrator.close_signal(signal_id).await,
            CommandAction::ForceBreakEven => {
                self.orchestrator.force_break_even(signal_id).await
            }
            CommandAction::CloseFirstTarget => {
                self.orchestrator.close_target(signal_id, 1).await
            }
        };

        tracing::info!(
            "Command {:?} on signal {}: {} orders affected",
            action,
            signal_id,
            affected
        );
        let ack = format!("{:?}: {} orders affected", action, affected);
        if self.ack_tx.send(ack).await.is_err() {
            tracing::debug!("Acknowledgement channel closed");
        }

        Some(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{PaperPlatform, ServerClock};
    use crate::config::ExpiryPolicy;
    use crate::decision::Tolerance;
    use crate::models::{Direction, Signal, SourceFormat, Target, TargetPrice};
    use crate::symbols::SymbolMapper;
    use chrono::Utc;
    use std::collections::HashMap;

    #[test]
    fn test_parse_close_all_phrases() {
        assert_eq!(parse_command("Close ALL"), Some(CommandAction::CloseSignal));
        assert_eq!(parse_command("please close full now"), Some(CommandAction::CloseSignal));
        assert_eq!(parse_command("exit all"), Some(CommandAction::CloseSignal));
    }

    #[test]
    fn test_parse_break_even_phrases() {
        assert_eq!(parse_command("BreakEven"), Some(CommandAction::ForceBreakEven));
        assert_eq!(parse_command("move to break even"), Some(CommandAction::ForceBreakEven));
        assert_eq!(parse_command("SL to entry"), Some(CommandAction::ForceBreakEven));
    }

    #[test]
    fn test_parse_first_target_phrases() {
        assert_eq!(parse_command("take TP1"), Some(CommandAction::CloseFirstTarget));
        assert_eq!(parse_command("secure tp1 here"), Some(CommandAction::CloseFirstTarget));
    }

    #[test]
    fn test_unrecognized_text_is_ignored() {
        assert_eq!(parse_command("nice trade"), None);
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("tp 2 soon"), None);
    }

    fn buy_signal() -> Signal {
        Signal {
            id: Uuid::new_v4(),
            source_format: SourceFormat::Default,
            symbol: "XAUUSD".to_string(),
            direction: Direction::Buy,
            entry_price: 3600.0,
            stop_loss: 3592.0,
            targets: vec![
                Target { index: 1, value: TargetPrice::Level(3602.0) },
                Target { index: 2, value: TargetPrice::Open },
            ],
            received_at: Utc::now(),
        }
    }

    async fn setup() -> (Arc<PaperPlatform>, Arc<Orchestrator>, CommandDispatcher, mpsc::Receiver<String>) {
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
        let (ack_tx, ack_rx) = mpsc::channel(8);
        let dispatcher = CommandDispatcher::new(orchestrator.clone(), ack_tx);
        (platform, orchestrator, dispatcher, ack_rx)
    }

    #[tokio::test]
    async fn test_dispatch_close_all() {
        let (platform, orchestrator, dispatcher, mut ack_rx) = setup().await;
        let signal = buy_signal();
        let id = signal.id;
        orchestrator.on_new_signal(signal).await.unwrap();

        let action = dispatcher.dispatch(id, "close all").await;
        assert_eq!(action, Some(CommandAction::CloseSignal));
        assert_eq!(platform.cancellations().len(), 2);

        let ack = ack_rx.recv().await.unwrap();
        assert!(ack.contains("2 orders affected"));
    }

    #[tokio::test]
    async fn test_dispatch_break_even_twice_modifies_once() {
        let (platform, orchestrator, dispatcher, _ack_rx) = setup().await;
        let signal = buy_signal();
        let id = signal.id;
        orchestrator.on_new_signal(signal).await.unwrap();

        dispatcher.dispatch(id, "break even please").await;
        dispatcher.dispatch(id, "break even please").await;

        assert_eq!(platform.stop_modifications().len(), 2);
    }

    #[tokio::test]
    async fn test_dispatch_unrecognized_takes_no_action() {
        let (platform, orchestrator, dispatcher, _ack_rx) = setup().await;
        let signal = buy_signal();
        let id = signal.id;
        orchestrator.on_new_signal(signal).await.unwrap();

        assert_eq!(dispatcher.dispatch(id, "looking good!").await, None);
        assert!(platform.cancellations().is_empty());
        assert!(platform.stop_modifications().is_empty());
    }
}
