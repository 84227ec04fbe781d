//! Transport-neutral view of an incoming chat message.

/// Platform user identifier.
pub type UserId = i64;

/// Platform chat identifier.
pub type ChatId = i64;

/// Whether a message arrived in a one-to-one chat or a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatKind {
    Private,
    Group,
}

/// The chat a message was posted in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chat {
    pub id: ChatId,
    pub kind: ChatKind,
    /// Group title; `None` for private chats.
    pub title: Option<String>,
}

impl Chat {
    pub fn private(id: ChatId) -> Self {
        Self {
            id,
            kind: ChatKind::Private,
            title: None,
        }
    }

    pub fn group(id: ChatId, title: impl Into<String>) -> Self {
        Self {
            id,
            kind: ChatKind::Group,
            title: Some(title.into()),
        }
    }

    pub fn is_private(&self) -> bool {
        self.kind == ChatKind::Private
    }

    /// Name used in log lines.
    pub fn log_name(&self) -> &str {
        match self.kind {
            ChatKind::Private => "private",
            ChatKind::Group => self.title.as_deref().unwrap_or("group"),
        }
    }
}

/// A user as seen by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRef {
    pub id: UserId,
    pub username: Option<String>,
    pub full_name: Option<String>,
}

impl UserRef {
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            username: None,
            full_name: None,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self
    }

    /// Username, else full name, else `"User"`.
    pub fn display_name(&self) -> &str {
        self.username
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.full_name.as_deref().filter(|s| !s.is_empty()))
            .unwrap_or("User")
    }
}

/// One incoming message, already decoded by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub message_id: i64,
    pub chat: Chat,
    pub sender: UserRef,
    pub text: String,
    /// Author of the message this one replies to.
    pub reply_to: Option<UserRef>,
    /// Users mentioned in the text, as resolved by the transport.
    pub mentions: Vec<UserRef>,
}

impl IncomingMessage {
    pub fn new(message_id: i64, chat: Chat, sender: UserRef, text: impl Into<String>) -> Self {
        Self {
            message_id,
            chat,
            sender,
            text: text.into(),
            reply_to: None,
            mentions: Vec::new(),
        }
    }

    pub fn replying_to(mut self, user: UserRef) -> Self {
        self.reply_to = Some(user);
        self
    }

    pub fn mentioning(mut self, user: UserRef) -> Self {
        self.mentions.push(user);
        self
    }

    /// Users a targeted command should act on: the replied-to user, else
    /// everyone mentioned.
    pub fn targets(&self) -> Vec<&UserRef> {
        match &self.reply_to {
            Some(user) => vec![user],
            None => self.mentions.iter().collect(),
        }
    }

    /// Where replies to this message go.
    pub fn reply_target(&self) -> ReplyTarget {
        ReplyTarget {
            chat_id: self.chat.id,
            reply_to_message_id: Some(self.message_id),
        }
    }
}

/// Destination of an outgoing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyTarget {
    pub chat_id: ChatId,
    pub reply_to_message_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_fallbacks() {
        assert_eq!(UserRef::new(1).with_username("alice").display_name(), "alice");
        assert_eq!(UserRef::new(1).with_full_name("Alice B").display_name(), "Alice B");
        assert_eq!(
            UserRef::new(1)
                .with_username("")
                .with_full_name("Alice B")
                .display_name(),
            "Alice B"
        );
        assert_eq!(UserRef::new(1).display_name(), "User");
    }

    #[test]
    fn test_targets_prefer_reply() {
        let msg = IncomingMessage::new(1, Chat::group(-5, "g"), UserRef::new(1), "/rank")
            .mentioning(UserRef::new(2))
            .replying_to(UserRef::new(3));
        let ids: Vec<_> = msg.targets().iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![3]);

        let msg = IncomingMessage::new(1, Chat::group(-5, "g"), UserRef::new(1), "/rank")
            .mentioning(UserRef::new(2))
            .mentioning(UserRef::new(4));
        let ids: Vec<_> = msg.targets().iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![2, 4]);
    }

    #[test]
    fn test_chat_log_name() {
        assert_eq!(Chat::private(9).log_name(), "private");
        assert_eq!(Chat::group(-9, "Rustaceans").log_name(), "Rustaceans");
    }
}
