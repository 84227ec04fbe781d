//! The per-message dispatch pipeline.
//!
//! ```text
//! Received -> Parsed -> Resolved -> Authorized -> Executed -> Progressed -> Notified
//!                |          |            |             |            |
//!             ignored    unknown      denied        failed     persistence
//!             prompted   command                    refused    unavailable
//! ```
//!
//! Each stage awaits its collaborators before the next one starts. The
//! dispatcher holds no per-message state, so any number of messages may be
//! dispatched concurrently.

use crate::context::{self, InvocationContext, ParsedMessage};
use crate::error::{CommandError, DispatchError, Stage};
use crate::gate::{Gate, Verdict};
use crate::message::IncomingMessage;
use crate::progression::{Progress, ProgressionEngine};
use crate::registry::{Registry, RegistryHandle};
use crate::traits::{DispatchObserver, Messenger, RankNotifier};
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, Span, debug, error, field, info, info_span, warn};
use uuid::Uuid;

/// Shown to the invoker when a command breaks or persistence is down.
pub const GENERIC_FAILURE: &str = "⚠️ Something went wrong while running this command. Please try again later.";

/// A command that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub command: String,
    pub progress: Progress,
    /// A rank change was handed to the notifier and it succeeded.
    pub notified: bool,
}

/// Non-error terminal states of one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    /// Not a command; logged only.
    Ignored,
    /// Bare prefix; the user was asked to type a command.
    Prompted,
    Completed(Completion),
}

/// Routes incoming messages through parse, lookup, gate, execution and
/// progression.
pub struct Dispatcher {
    prefix: String,
    registry: RegistryHandle,
    gate: Gate,
    progression: Arc<ProgressionEngine>,
    messenger: Arc<dyn Messenger>,
    notifier: Option<Arc<dyn RankNotifier>>,
    observer: Option<Arc<dyn DispatchObserver>>,
}

impl Dispatcher {
    pub fn new(
        prefix: impl Into<String>,
        registry: impl Into<RegistryHandle>,
        gate: Gate,
        progression: Arc<ProgressionEngine>,
        messenger: Arc<dyn Messenger>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            registry: registry.into(),
            gate,
            progression,
            messenger,
            notifier: None,
            observer: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn RankNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn DispatchObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Snapshot of the current registry.
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.snapshot()
    }

    /// Handle sharing this dispatcher's registry.
    pub fn registry_handle(&self) -> RegistryHandle {
        self.registry.clone()
    }

    /// Swap in a freshly built registry. In-flight dispatches keep the
    /// snapshot they started with.
    pub fn reload_registry(&self, registry: Registry) {
        info!(commands = registry.len(), "Reloading command registry");
        self.registry.replace(registry);
    }

    /// Run one message through the pipeline.
    pub async fn dispatch(&self, msg: &IncomingMessage) -> Result<Dispatched, DispatchError> {
        let span = info_span!(
            "dispatch",
            invocation = %Uuid::new_v4(),
            user = msg.sender.id,
            chat = msg.chat.id,
            command = field::Empty,
        );
        self.dispatch_inner(msg).instrument(span).await
    }

    async fn dispatch_inner(&self, msg: &IncomingMessage) -> Result<Dispatched, DispatchError> {
        let ctx = match context::parse(&msg.text, &self.prefix) {
            ParsedMessage::NotCommand => {
                info!(
                    from = msg.sender.display_name(),
                    chat = msg.chat.log_name(),
                    "[MSG]"
                );
                self.observe(|o| o.message_received("text"));
                return Ok(Dispatched::Ignored);
            }
            ParsedMessage::PrefixOnly => {
                self.observe(|o| o.message_received("prompt"));
                self.reply(msg, &format!("Please enter a command starting with {}.", self.prefix))
                    .await;
                return Ok(Dispatched::Prompted);
            }
            ParsedMessage::Command(ctx) => ctx,
        };

        Span::current().record("command", ctx.command_name.as_str());
        info!(
            command = %ctx.command_name,
            from = msg.sender.display_name(),
            chat = msg.chat.log_name(),
            "[CMD]"
        );
        self.observe(|o| o.message_received("command"));

        let started = Instant::now();
        let result = self.run_command(msg, ctx).await;

        let command = match &result {
            Ok(Dispatched::Completed(c)) => c.command.as_str(),
            Err(e) => e.command(),
            Ok(_) => "",
        };
        let elapsed = started.elapsed();
        self.observe(|o| o.command_finished(command, elapsed, result.as_ref().err()));

        result
    }

    async fn run_command(
        &self,
        msg: &IncomingMessage,
        ctx: InvocationContext,
    ) -> Result<Dispatched, DispatchError> {
        // Resolved
        let registry = self.registry();
        let Some(command) = registry.resolve(&ctx.command_name) else {
            debug!(command = %ctx.command_name, "Unknown command");
            self.reply(
                msg,
                &format!(
                    "❌ Unknown command! Use {}help to see all available commands.",
                    self.prefix
                ),
            )
            .await;
            return Err(DispatchError::UnknownCommand(ctx.command_name));
        };
        let descriptor = &command.descriptor;
        let name = descriptor.name.clone();

        // Authorized
        match self.gate.authorize(descriptor, msg).await {
            Ok(Verdict::Allow) => {}
            Ok(Verdict::Deny(reason)) => {
                debug!(command = %name, reason = reason.error_code(), "Denied by gate");
                self.reply(msg, &reason.user_message()).await;
                return Err(DispatchError::GateDenied {
                    command: name,
                    reason,
                });
            }
            Err(source) => {
                error!(command = %name, error = %source, "Authorization lookup failed");
                self.reply(msg, GENERIC_FAILURE).await;
                return Err(DispatchError::PersistenceUnavailable {
                    command: name,
                    stage: Stage::Resolved,
                    source,
                });
            }
        }

        // Executed
        let outcome = AssertUnwindSafe(command.handler.execute(msg, &ctx))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(CommandError::Denied(reason))) => {
                debug!(command = %name, reason = %reason, "Command refused");
                self.reply(msg, &reason).await;
                return Err(DispatchError::CommandRefused {
                    command: name,
                    reason,
                });
            }
            Ok(Err(CommandError::Failed(cause))) => {
                error!(command = %name, cause = %cause, "Command failed");
                self.reply(msg, GENERIC_FAILURE).await;
                return Err(DispatchError::ExecutionFailed {
                    command: name,
                    cause,
                });
            }
            Err(panic) => {
                let cause = panic_message(panic.as_ref());
                error!(command = %name, cause = %cause, "Command panicked");
                self.reply(msg, GENERIC_FAILURE).await;
                return Err(DispatchError::ExecutionFailed {
                    command: name,
                    cause,
                });
            }
        }

        command.record_use();

        // Progressed
        let progress = match self
            .progression
            .award_xp(msg.sender.id, descriptor.xp_reward)
            .await
        {
            Ok(progress) => progress,
            Err(source) => {
                error!(
                    command = %name,
                    user = msg.sender.id,
                    xp = descriptor.xp_reward,
                    error = %source,
                    "XP award not recorded"
                );
                return Err(DispatchError::PersistenceUnavailable {
                    command: name,
                    stage: Stage::Executed,
                    source,
                });
            }
        };
        if progress.awarded > 0 {
            self.observe(|o| o.xp_awarded(progress.awarded));
        }

        // Notified
        let mut notified = false;
        if let Some(change) = &progress.change {
            info!(
                user = msg.sender.id,
                from = change.previous.name,
                to = change.tier().name,
                "Rank changed"
            );
            self.observe(|o| o.rank_changed(change));
            if let Some(notifier) = &self.notifier {
                match notifier.rank_changed(msg, change).await {
                    Ok(()) => notified = true,
                    Err(e) => warn!(user = msg.sender.id, error = %e, "Rank-up notification dropped"),
                }
            }
        }

        Ok(Dispatched::Completed(Completion {
            command: name,
            progress,
            notified,
        }))
    }

    /// Reply to `msg`; delivery failures are logged, never propagated.
    async fn reply(&self, msg: &IncomingMessage, text: &str) {
        if let Err(e) = self.messenger.send_text(msg.reply_target(), text).await {
            warn!(chat = msg.chat.id, error = %e, "Failed to send reply");
        }
    }

    fn observe(&self, f: impl FnOnce(&dyn DispatchObserver)) {
        if let Some(observer) = &self.observer {
            f(observer.as_ref());
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::CommandDescriptor;
    use crate::error::StoreError;
    use crate::gate::DenyReason;
    use crate::message::{Chat, UserRef};
    use crate::progression::RetryPolicy;
    use crate::rank::RankTable;
    use crate::store::MemoryStore;
    use crate::testing::{FlakyStore, FnCommand, NoopCommand, RecordingMessenger, RecordingNotifier, StaticRoles};
    use crate::traits::Store;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    const OWNER: i64 = 1;
    const ALICE: i64 = 2;

    struct Harness {
        dispatcher: Dispatcher,
        messenger: Arc<RecordingMessenger>,
        notifier: Arc<RecordingNotifier>,
    }

    fn harness(store: Arc<dyn Store>, registry: Registry) -> Harness {
        let messenger = Arc::new(RecordingMessenger::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let gate = Gate::new(store.clone(), Arc::new(StaticRoles::new()), [OWNER]);
        let progression = Arc::new(
            ProgressionEngine::new(store, RankTable::standard())
                .with_retry(RetryPolicy::new(2, Duration::from_millis(1))),
        );
        let dispatcher = Dispatcher::new("/", registry, gate, progression, messenger.clone())
            .with_notifier(notifier.clone());
        Harness {
            dispatcher,
            messenger,
            notifier,
        }
    }

    fn registry_with(descriptor: CommandDescriptor, command: Arc<dyn crate::traits::Command>) -> Registry {
        let mut registry = Registry::new();
        registry.register(descriptor, command).unwrap();
        registry
    }

    fn private(text: &str) -> IncomingMessage {
        IncomingMessage::new(10, Chat::private(ALICE), UserRef::new(ALICE).with_username("alice"), text)
    }

    #[tokio::test]
    async fn test_plain_text_ignored() {
        let h = harness(Arc::new(MemoryStore::new()), Registry::new());
        let result = h.dispatcher.dispatch(&private("hello there")).await.unwrap();
        assert_eq!(result, Dispatched::Ignored);
        assert!(h.messenger.sent().is_empty());
    }

    #[tokio::test]
    async fn test_prefix_only_prompts() {
        let h = harness(Arc::new(MemoryStore::new()), Registry::new());
        let result = h.dispatcher.dispatch(&private("/")).await.unwrap();
        assert_eq!(result, Dispatched::Prompted);
        assert_eq!(
            h.messenger.last_body().unwrap(),
            "Please enter a command starting with /."
        );
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let h = harness(Arc::new(MemoryStore::new()), Registry::new());
        let err = h.dispatcher.dispatch(&private("/nope")).await.unwrap_err();
        assert_eq!(err, DispatchError::UnknownCommand("nope".into()));
        assert!(h.messenger.last_body().unwrap().contains("/help"));
    }

    #[tokio::test]
    async fn test_completed_command_awards_xp() {
        let store = Arc::new(MemoryStore::new());
        let registry = registry_with(
            CommandDescriptor::new("hi", "general").alias("hello").xp(4),
            Arc::new(NoopCommand),
        );
        let h = harness(store.clone(), registry);

        let result = h.dispatcher.dispatch(&private("/HELLO")).await.unwrap();
        let Dispatched::Completed(completion) = result else {
            panic!("expected completion");
        };
        assert_eq!(completion.command, "hi");
        assert_eq!(completion.progress.total(), 4);
        assert_eq!(store.get_user(ALICE).await.unwrap().xp, 4);
        assert_eq!(h.dispatcher.registry().command_stats(), vec![("hi", 1)]);
    }

    #[tokio::test]
    async fn test_gate_denial_awards_nothing() {
        let store = Arc::new(MemoryStore::new());
        store.set_user_ban(ALICE, true, Some("spam")).await.unwrap();
        let command = Arc::new(FnCommand::new(|_, _| async { Ok(()) }));
        let registry = registry_with(CommandDescriptor::new("hi", "general").xp(4), command.clone());
        let h = harness(store.clone(), registry);

        let err = h.dispatcher.dispatch(&private("/hi")).await.unwrap_err();
        assert!(matches!(err, DispatchError::GateDenied { reason: DenyReason::Banned { .. }, .. }));
        assert!(err.is_expected());
        assert_eq!(command.calls(), 0);
        assert_eq!(store.get_user(ALICE).await.unwrap().xp, 0);
        assert!(h.messenger.last_body().unwrap().starts_with("🚫 Oops! You're banned"));
    }

    #[tokio::test]
    async fn test_command_refusal_is_shown_and_not_rewarded() {
        let store = Arc::new(MemoryStore::new());
        let registry = registry_with(
            CommandDescriptor::new("promote", "chat").xp(3),
            Arc::new(FnCommand::denying("Cannot promote yourself.")),
        );
        let h = harness(store.clone(), registry);

        let err = h.dispatcher.dispatch(&private("/promote")).await.unwrap_err();
        assert_eq!(err.error_code(), "command_refused");
        assert_eq!(h.messenger.last_body().unwrap(), "Cannot promote yourself.");
        assert_eq!(store.get_user(ALICE).await.unwrap().xp, 0);
    }

    #[tokio::test]
    async fn test_failure_is_generic_to_user() {
        let store = Arc::new(MemoryStore::new());
        let registry = registry_with(
            CommandDescriptor::new("rank", "general").xp(3),
            Arc::new(FnCommand::failing("card service timed out")),
        );
        let h = harness(store.clone(), registry);

        let err = h.dispatcher.dispatch(&private("/rank")).await.unwrap_err();
        assert!(matches!(err, DispatchError::ExecutionFailed { ref cause, .. } if cause.contains("timed out")));
        assert_eq!(h.messenger.last_body().unwrap(), GENERIC_FAILURE);
        assert_eq!(store.get_user(ALICE).await.unwrap().xp, 0);
    }

    #[tokio::test]
    async fn test_usage_counts_only_completed_invocations() {
        let store = Arc::new(MemoryStore::new());
        store.set_user_ban(OWNER, true, None).await.unwrap();
        let mut registry = Registry::new();
        registry
            .register(CommandDescriptor::new("hi", "general"), Arc::new(NoopCommand))
            .unwrap();
        registry
            .register(
                CommandDescriptor::new("promote", "chat"),
                Arc::new(FnCommand::denying("Cannot promote yourself.")),
            )
            .unwrap();
        registry
            .register(
                CommandDescriptor::new("rank", "general"),
                Arc::new(FnCommand::failing("card service timed out")),
            )
            .unwrap();
        let h = harness(store, registry);

        let banned = IncomingMessage::new(11, Chat::private(OWNER), UserRef::new(OWNER), "/hi");
        h.dispatcher.dispatch(&banned).await.unwrap_err();
        h.dispatcher.dispatch(&private("/promote")).await.unwrap_err();
        h.dispatcher.dispatch(&private("/rank")).await.unwrap_err();
        assert!(h.dispatcher.registry().command_stats().is_empty());

        h.dispatcher.dispatch(&private("/hi")).await.unwrap();
        h.dispatcher.dispatch(&private("/hi")).await.unwrap();
        assert_eq!(h.dispatcher.registry().command_stats(), vec![("hi", 2)]);
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let registry = registry_with(
            CommandDescriptor::new("boom", "general"),
            Arc::new(FnCommand::new(|_, _| async { panic!("kaboom") })),
        );
        let h = harness(Arc::new(MemoryStore::new()), registry);

        let err = h.dispatcher.dispatch(&private("/boom")).await.unwrap_err();
        assert!(matches!(err, DispatchError::ExecutionFailed { ref cause, .. } if cause == "kaboom"));
        assert_eq!(h.messenger.last_body().unwrap(), GENERIC_FAILURE);
    }

    #[tokio::test]
    async fn test_rank_change_notifies() {
        let store = Arc::new(MemoryStore::new());
        store.set_user_xp(ALICE, 999).await.unwrap();
        let registry = registry_with(CommandDescriptor::new("hi", "general").xp(1), Arc::new(NoopCommand));
        let h = harness(store, registry);

        let Dispatched::Completed(completion) = h.dispatcher.dispatch(&private("/hi")).await.unwrap() else {
            panic!("expected completion");
        };
        assert!(completion.notified);
        let changes = h.notifier.changes();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].tier().name, "Apprentice");
    }

    #[tokio::test]
    async fn test_level_up_without_tier_change_does_not_notify() {
        let store = Arc::new(MemoryStore::new());
        store.set_user_xp(ALICE, 45).await.unwrap();
        let registry = registry_with(CommandDescriptor::new("work", "general").xp(10), Arc::new(NoopCommand));
        let h = harness(store, registry);

        let Dispatched::Completed(completion) = h.dispatcher.dispatch(&private("/work")).await.unwrap() else {
            panic!("expected completion");
        };
        assert_eq!(completion.progress.total(), 55);
        assert!(completion.progress.level_changed());
        assert!(!completion.notified);
        assert!(h.notifier.changes().is_empty());
    }

    #[tokio::test]
    async fn test_failed_notification_keeps_xp() {
        let store = Arc::new(MemoryStore::new());
        store.set_user_xp(ALICE, 999).await.unwrap();
        let registry = registry_with(CommandDescriptor::new("hi", "general").xp(1), Arc::new(NoopCommand));
        let mut h = harness(store.clone(), registry);
        h.dispatcher = h.dispatcher.with_notifier(Arc::new(RecordingNotifier::failing()));

        let Dispatched::Completed(completion) = h.dispatcher.dispatch(&private("/hi")).await.unwrap() else {
            panic!("expected completion");
        };
        assert!(!completion.notified);
        assert_eq!(store.get_user(ALICE).await.unwrap().xp, 1_000);
    }

    #[tokio::test]
    async fn test_award_outage_surfaces_without_double_reply() {
        let store = Arc::new(FlakyStore::new(MemoryStore::new()).fail_writes(5));
        let registry = registry_with(CommandDescriptor::new("hi", "general").xp(2), Arc::new(NoopCommand));
        let h = harness(store, registry);

        let err = h.dispatcher.dispatch(&private("/hi")).await.unwrap_err();
        assert!(matches!(
            err,
            DispatchError::PersistenceUnavailable { stage: Stage::Executed, source: StoreError::Unavailable(_), .. }
        ));
        assert!(h.messenger.sent().is_empty());
    }

    #[tokio::test]
    async fn test_gate_outage_sends_generic_notice() {
        let store = Arc::new(FlakyStore::new(MemoryStore::new()).fail_reads(1));
        let registry = registry_with(CommandDescriptor::new("hi", "general"), Arc::new(NoopCommand));
        let h = harness(store, registry);

        let err = h.dispatcher.dispatch(&private("/hi")).await.unwrap_err();
        assert!(matches!(err, DispatchError::PersistenceUnavailable { stage: Stage::Resolved, .. }));
        assert_eq!(h.messenger.last_body().unwrap(), GENERIC_FAILURE);
    }

    #[tokio::test]
    async fn test_reload_swaps_registry() {
        let h = harness(Arc::new(MemoryStore::new()), Registry::new());
        assert!(h.dispatcher.dispatch(&private("/hi")).await.is_err());

        h.dispatcher.reload_registry(registry_with(CommandDescriptor::new("hi", "general"), Arc::new(NoopCommand)));
        assert!(h.dispatcher.dispatch(&private("/hi")).await.is_ok());
    }

    #[tokio::test]
    async fn test_reload_visible_through_shared_handle() {
        let h = harness(Arc::new(MemoryStore::new()), Registry::new());
        let handle = h.dispatcher.registry_handle();

        h.dispatcher.reload_registry(registry_with(CommandDescriptor::new("hi", "general"), Arc::new(NoopCommand)));
        assert!(handle.snapshot().resolve("hi").is_some());

        handle.replace(Registry::new());
        assert!(h.dispatcher.dispatch(&private("/hi")).await.is_err());
    }

    #[derive(Default)]
    struct CountingObserver {
        commands: AtomicU64,
        errors: AtomicU64,
        xp: AtomicU64,
    }

    impl DispatchObserver for CountingObserver {
        fn command_finished(&self, _command: &str, _elapsed: Duration, error: Option<&DispatchError>) {
            self.commands.fetch_add(1, Ordering::SeqCst);
            if error.is_some() {
                self.errors.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn xp_awarded(&self, amount: u64) {
            self.xp.fetch_add(amount, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_observer_sees_outcomes() {
        let registry = registry_with(CommandDescriptor::new("hi", "general").xp(2), Arc::new(NoopCommand));
        let observer = Arc::new(CountingObserver::default());
        let mut h = harness(Arc::new(MemoryStore::new()), registry);
        h.dispatcher = h.dispatcher.with_observer(observer.clone());

        h.dispatcher.dispatch(&private("/hi")).await.unwrap();
        h.dispatcher.dispatch(&private("/hi")).await.unwrap();
        h.dispatcher.dispatch(&private("/missing")).await.unwrap_err();
        h.dispatcher.dispatch(&private("just chatting")).await.unwrap();

        assert_eq!(observer.commands.load(Ordering::SeqCst), 3);
        assert_eq!(observer.errors.load(Ordering::SeqCst), 1);
        assert_eq!(observer.xp.load(Ordering::SeqCst), 4);
    }
}
