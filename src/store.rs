//! The chat store: the message thread and the waiting flag.
//!
//! The store is the single writer of the thread.  It is shared behind an
//! `Arc` so a view can observe the waiting flag while an exchange is in
//! flight.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use crate::error::Error;
use crate::observability::{
    STORE_EXCHANGE_DURATION, STORE_MALFORMED_REPLIES, STORE_REJECTED_BUSY, STORE_REJECTED_EMPTY,
    STORE_SEND_FAILURES, STORE_SENDS,
};
use crate::service::ChatService;
use crate::types::Message;

/// The assistant message appended when an exchange fails.
pub const ERROR_MESSAGE: &str = "Sorry, I encountered an error. Please try again.";

/// Why a send was refused before anything was appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The text was empty after trimming.
    Empty,
    /// Another exchange is still in flight.
    Busy,
}

/// The result of [`ChatStore::send_message`].
#[derive(Debug, Clone)]
pub enum SendOutcome {
    /// The backend answered; the reply is the last message of the thread.
    Replied,
    /// The exchange failed; the error notice is the last message of the thread.
    Failed(Error),
    /// Nothing was sent and the thread is unchanged.
    Rejected(Rejection),
}

impl SendOutcome {
    /// Returns true if the send reached the service, whatever its result.
    pub fn was_sent(&self) -> bool {
        !matches!(self, SendOutcome::Rejected(_))
    }
}

/// Shared handle to a store's waiting flag.
///
/// Cloning the handle shares the flag; it is how views observe whether an
/// exchange is in flight.
#[derive(Debug, Clone, Default)]
pub struct WaitingFlag {
    inner: Arc<AtomicBool>,
}

impl WaitingFlag {
    /// Returns true while an exchange is in flight.
    pub fn is_set(&self) -> bool {
        self.inner.load(Ordering::Acquire)
    }

    /// Claim the flag, or return `None` if it is already held.
    fn try_acquire(&self) -> Option<InFlight> {
        self.inner
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight { flag: self.clone() })
    }
}

/// The in-flight token.  Dropping it clears the waiting flag.
#[derive(Debug)]
struct InFlight {
    flag: WaitingFlag,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.flag.inner.store(false, Ordering::Release);
    }
}

/// Owns the thread and the waiting flag for one chat view.
pub struct ChatStore<S: ChatService> {
    service: S,
    thread: Mutex<Vec<Message>>,
    waiting: WaitingFlag,
    provider: Mutex<Option<String>>,
}

impl<S: ChatService> ChatStore<S> {
    /// Creates an empty store backed by `service`.
    pub fn new(service: S) -> Self {
        Self {
            service,
            thread: Mutex::new(Vec::new()),
            waiting: WaitingFlag::default(),
            provider: Mutex::new(None),
        }
    }

    /// Sets the provider requested on subsequent sends.
    pub fn with_provider(self, provider: Option<String>) -> Self {
        *lock(&self.provider) = provider;
        self
    }

    /// Sends `text` and appends the outcome to the thread.
    ///
    /// The user message is appended, and the waiting flag raised, before the
    /// service is called.  Failures are never returned as errors: they append
    /// [`ERROR_MESSAGE`] and are reported through [`SendOutcome::Failed`].
    /// Blank text and sends made while another exchange is in flight are
    /// rejected without touching the thread.
    pub async fn send_message(&self, text: &str) -> SendOutcome {
        match self.begin(text) {
            Ok(exchange) => exchange.complete().await,
            Err(rejection) => SendOutcome::Rejected(rejection),
        }
    }

    /// Starts an exchange: claims the waiting flag and appends the user
    /// message, without contacting the service yet.
    ///
    /// This lets a view render the user's message and the typing indicator
    /// before awaiting [`Exchange::complete`].
    pub fn begin(&self, text: &str) -> Result<Exchange<'_, S>, Rejection> {
        let text = text.trim();
        if text.is_empty() {
            STORE_REJECTED_EMPTY.click();
            return Err(Rejection::Empty);
        }
        let Some(in_flight) = self.waiting.try_acquire() else {
            STORE_REJECTED_BUSY.click();
            return Err(Rejection::Busy);
        };
        STORE_SENDS.click();

        let history = {
            let mut thread = lock(&self.thread);
            let history = thread.clone();
            thread.push(Message::user(text));
            history
        };
        Ok(Exchange {
            store: self,
            text: text.to_string(),
            history,
            provider: self.provider(),
            _in_flight: in_flight,
        })
    }

    /// Appends `greeting` as an assistant message if the thread is empty.
    ///
    /// Returns true if the greeting was added.
    pub fn seed_greeting(&self, greeting: &str) -> bool {
        let mut thread = lock(&self.thread);
        if !thread.is_empty() {
            return false;
        }
        thread.push(Message::assistant(greeting));
        true
    }

    /// Returns a snapshot of the thread.
    pub fn messages(&self) -> Vec<Message> {
        lock(&self.thread).clone()
    }

    /// Returns the messages at and after `start`.
    pub fn messages_since(&self, start: usize) -> Vec<Message> {
        lock(&self.thread).iter().skip(start).cloned().collect()
    }

    /// Returns the number of messages in the thread.
    pub fn len(&self) -> usize {
        lock(&self.thread).len()
    }

    /// Returns true if the thread has no messages.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true while an exchange is in flight.
    pub fn is_waiting(&self) -> bool {
        self.waiting.is_set()
    }

    /// Returns a handle for observing the waiting flag.
    pub fn waiting_flag(&self) -> WaitingFlag {
        self.waiting.clone()
    }

    /// Returns the provider requested on sends, if any.
    pub fn provider(&self) -> Option<String> {
        lock(&self.provider).clone()
    }

    /// Sets or clears the provider requested on sends.
    pub fn set_provider(&self, provider: Option<String>) {
        *lock(&self.provider) = provider;
    }

    /// Returns the underlying service.
    pub fn service(&self) -> &S {
        &self.service
    }

    fn push(&self, message: Message) {
        lock(&self.thread).push(message);
    }
}

/// An exchange whose user message is already in the thread.
///
/// The waiting flag stays raised until the exchange is completed or dropped.
/// Dropping it without completing leaves the user message unanswered.
pub struct Exchange<'a, S: ChatService> {
    store: &'a ChatStore<S>,
    text: String,
    history: Vec<Message>,
    provider: Option<String>,
    _in_flight: InFlight,
}

impl<S: ChatService> Exchange<'_, S> {
    /// The trimmed text that was appended as the user message.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Calls the service and appends the reply or the error notice.
    pub async fn complete(self) -> SendOutcome {
        let start = Instant::now();
        let result = self
            .store
            .service
            .send_message(&self.text, &self.history, self.provider.as_deref())
            .await;
        STORE_EXCHANGE_DURATION.add(start.elapsed().as_secs_f64());

        match result {
            Ok(reply) => {
                let provider = reply.provider.or(self.provider);
                self.store
                    .push(Message::assistant(reply.response).with_provider(provider));
                SendOutcome::Replied
            }
            Err(err) => {
                STORE_SEND_FAILURES.click();
                if err.is_malformed_response() {
                    STORE_MALFORMED_REPLIES.click();
                }
                log::warn!("chat exchange failed: {err}");
                self.store.push(Message::assistant(ERROR_MESSAGE));
                SendOutcome::Failed(err)
            }
        }
    }
}

// A poisoned lock only means a panic elsewhere; the Vec itself is still whole.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::types::{ChatReply, Role};
    use std::sync::OnceLock;
    use tokio::sync::{Notify, oneshot};

    /// Answers every message with a fixed reply and records what it saw.
    struct CannedService {
        reply: Result<ChatReply>,
        seen: Mutex<Vec<(String, usize, Option<String>)>>,
        probe: Arc<OnceLock<WaitingFlag>>,
        waiting_during_call: Mutex<Vec<bool>>,
    }

    impl CannedService {
        fn new(reply: Result<ChatReply>) -> Self {
            Self {
                reply,
                seen: Mutex::new(Vec::new()),
                probe: Arc::new(OnceLock::new()),
                waiting_during_call: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl ChatService for CannedService {
        async fn send_message(
            &self,
            message: &str,
            history: &[Message],
            provider: Option<&str>,
        ) -> Result<ChatReply> {
            self.seen.lock().unwrap().push((
                message.to_string(),
                history.len(),
                provider.map(String::from),
            ));
            if let Some(flag) = self.probe.get() {
                self.waiting_during_call.lock().unwrap().push(flag.is_set());
            }
            self.reply.clone()
        }
    }

    /// Holds every exchange open until released.
    struct GatedService {
        entered: Mutex<Option<oneshot::Sender<()>>>,
        release: Arc<Notify>,
    }

    #[async_trait::async_trait]
    impl ChatService for GatedService {
        async fn send_message(
            &self,
            _: &str,
            _: &[Message],
            _: Option<&str>,
        ) -> Result<ChatReply> {
            if let Some(entered) = self.entered.lock().unwrap().take() {
                let _ = entered.send(());
            }
            self.release.notified().await;
            Ok(ChatReply::new("late reply"))
        }
    }

    #[tokio::test]
    async fn successful_exchange_appends_user_then_assistant() {
        let store = ChatStore::new(CannedService::new(Ok(
            ChatReply::new("R").with_provider("P")
        )));
        let outcome = store.send_message("  hello  ").await;
        assert!(matches!(outcome, SendOutcome::Replied));
        assert!(outcome.was_sent());

        let messages = store.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "hello");
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].content, "R");
        assert_eq!(messages[1].provider.as_deref(), Some("P"));
        assert!(!store.is_waiting());
    }

    #[tokio::test]
    async fn failed_exchange_appends_error_notice() {
        let store = ChatStore::new(CannedService::new(Err(Error::connection(
            "refused", None,
        ))));
        let outcome = store.send_message("hello").await;
        assert!(matches!(outcome, SendOutcome::Failed(ref e) if e.is_connection()));
        assert!(outcome.was_sent());

        let messages = store.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "hello");
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].content, ERROR_MESSAGE);
        assert_eq!(messages[1].provider, None);
        assert!(!store.is_waiting());
    }

    #[tokio::test]
    async fn malformed_reply_is_a_failure() {
        let store = ChatStore::new(CannedService::new(Err(Error::malformed_response(
            "missing reply text",
            Some("response".to_string()),
        ))));
        let outcome = store.send_message("hello").await;
        assert!(matches!(outcome, SendOutcome::Failed(ref e) if e.is_malformed_response()));
        assert_eq!(store.messages()[1].content, ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn blank_text_is_rejected() {
        let store = ChatStore::new(CannedService::new(Ok(ChatReply::new("R"))));
        for text in ["", "   ", "\n\t"] {
            let outcome = store.send_message(text).await;
            assert!(matches!(outcome, SendOutcome::Rejected(Rejection::Empty)));
        }
        assert!(store.is_empty());
        assert!(!store.is_waiting());
        assert!(store.service().seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn waiting_flag_set_even_for_instant_replies() {
        let service = CannedService::new(Ok(ChatReply::new("R")));
        let probe = service.probe.clone();
        let store = ChatStore::new(service);
        probe.set(store.waiting_flag()).unwrap();

        assert!(!store.is_waiting());
        store.send_message("one").await;
        store.send_message("two").await;
        assert!(!store.is_waiting());
        assert_eq!(
            *store.service().waiting_during_call.lock().unwrap(),
            vec![true, true]
        );
    }

    #[tokio::test]
    async fn user_message_visible_while_waiting_and_concurrent_send_rejected() {
        let (entered_tx, entered_rx) = oneshot::channel();
        let release = Arc::new(Notify::new());
        let store = Arc::new(ChatStore::new(GatedService {
            entered: Mutex::new(Some(entered_tx)),
            release: release.clone(),
        }));

        let task = {
            let store = store.clone();
            tokio::spawn(async move { store.send_message("first").await })
        };
        entered_rx.await.unwrap();

        assert!(store.is_waiting());
        assert_eq!(store.len(), 1);
        assert_eq!(store.messages()[0].content, "first");

        let second = store.send_message("second").await;
        assert!(matches!(second, SendOutcome::Rejected(Rejection::Busy)));
        assert!(!second.was_sent());
        assert_eq!(store.len(), 1);
        assert!(store.is_waiting());

        release.notify_one();
        let outcome = task.await.unwrap();
        assert!(matches!(outcome, SendOutcome::Replied));
        assert!(!store.is_waiting());
        assert_eq!(store.len(), 2);
        assert_eq!(store.messages()[1].content, "late reply");
    }

    #[test]
    fn pending_exchange_holds_the_flag() {
        let release = Arc::new(Notify::new());
        let store = ChatStore::new(GatedService {
            entered: Mutex::new(None),
            release: release.clone(),
        });

        let mut send = tokio_test::task::spawn(store.send_message("hello"));
        tokio_test::assert_pending!(send.poll());
        assert!(store.is_waiting());
        assert_eq!(store.len(), 1);

        release.notify_one();
        assert!(send.is_woken());
        let outcome = tokio_test::assert_ready!(send.poll());
        assert!(matches!(outcome, SendOutcome::Replied));
        assert!(!store.is_waiting());
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn history_excludes_the_new_message() {
        let store = ChatStore::new(CannedService::new(Ok(ChatReply::new("R"))))
            .with_provider(Some("local".to_string()));
        assert!(store.seed_greeting("Hi there"));
        store.send_message("first").await;
        store.send_message("second").await;

        let seen = store.service().seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                ("first".to_string(), 1, Some("local".to_string())),
                ("second".to_string(), 3, Some("local".to_string())),
            ]
        );
        // The reply carried no provider; the requested one is recorded.
        assert_eq!(store.messages()[2].provider.as_deref(), Some("local"));
    }

    #[tokio::test]
    async fn begin_appends_before_the_service_is_called() {
        let store = ChatStore::new(CannedService::new(Ok(ChatReply::new("R"))));
        let exchange = store.begin("  question ").unwrap();
        assert_eq!(exchange.text(), "question");
        assert_eq!(store.len(), 1);
        assert!(store.is_waiting());
        assert!(store.service().seen.lock().unwrap().is_empty());
        assert!(matches!(store.begin("again"), Err(Rejection::Busy)));

        assert!(matches!(exchange.complete().await, SendOutcome::Replied));
        assert_eq!(store.len(), 2);
        assert!(!store.is_waiting());
    }

    #[test]
    fn dropped_exchange_releases_the_flag() {
        let store = ChatStore::new(CannedService::new(Ok(ChatReply::new("R"))));
        let exchange = store.begin("question").unwrap();
        assert!(store.is_waiting());
        drop(exchange);
        assert!(!store.is_waiting());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn greeting_only_seeds_empty_thread() {
        let store = ChatStore::new(CannedService::new(Ok(ChatReply::new("R"))));
        assert!(store.seed_greeting("Hello!"));
        assert!(!store.seed_greeting("Hello again!"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.messages()[0].role, Role::Assistant);
        assert_eq!(store.messages_since(1), Vec::new());
    }

    #[test]
    fn provider_can_be_changed() {
        let store = ChatStore::new(CannedService::new(Ok(ChatReply::new("R"))));
        assert_eq!(store.provider(), None);
        store.set_provider(Some("anthropic".to_string()));
        assert_eq!(store.provider().as_deref(), Some("anthropic"));
    }
}
