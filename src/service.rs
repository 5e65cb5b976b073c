//! The chat service: one request/response exchange with the chat backend.

use crate::client::ApiClient;
use crate::error::Result;
use crate::types::{ChatReply, ChatRequest, Message};

const CHAT_PATH: &str = "chat";

/// Something that can answer a chat message.
///
/// The store talks to this trait rather than to HTTP directly so the exchange
/// can be served by a remote backend, a canned responder, or a test double.
#[async_trait::async_trait]
pub trait ChatService: Send + Sync {
    /// Send `message` with the thread that preceded it and return the reply.
    ///
    /// Implementations do not retry; errors propagate unchanged.
    async fn send_message(
        &self,
        message: &str,
        history: &[Message],
        provider: Option<&str>,
    ) -> Result<ChatReply>;
}

/// Chat service backed by `POST <base>/chat`.
#[derive(Debug, Clone)]
pub struct RemoteChatService {
    client: ApiClient,
}

impl RemoteChatService {
    /// Creates a service on top of the given base client.
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Returns the underlying base client.
    pub fn client(&self) -> &ApiClient {
        &self.client
    }
}

#[async_trait::async_trait]
impl ChatService for RemoteChatService {
    async fn send_message(
        &self,
        message: &str,
        history: &[Message],
        provider: Option<&str>,
    ) -> Result<ChatReply> {
        let request = ChatRequest::new(message, history, provider.map(String::from));
        let body = self.client.post_value(CHAT_PATH, &request).await?;
        ChatReply::from_value(body)
    }
}

#[async_trait::async_trait]
impl<S: ChatService + ?Sized> ChatService for std::sync::Arc<S> {
    async fn send_message(
        &self,
        message: &str,
        history: &[Message],
        provider: Option<&str>,
    ) -> Result<ChatReply> {
        (**self).send_message(message, history, provider).await
    }
}
