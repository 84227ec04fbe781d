//! Immutable command metadata.

/// Where and by whom a command may be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Scope {
    /// Group chats only.
    pub chat_only: bool,
    /// Private chats only.
    pub private_only: bool,
    /// Configured operators only.
    pub dev_only: bool,
    /// Chat owners and admins only.
    pub admin_only: bool,
}

/// Identity, scope and permission requirements of one command.
///
/// Built once at start-up and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandDescriptor {
    pub name: String,
    pub aliases: Vec<String>,
    pub category: String,
    pub description: String,
    pub usage: Option<String>,
    pub xp_reward: u64,
    pub scope: Scope,
    /// Rights an `admin` (not `owner`) must hold, checked in this order.
    pub admin_permissions: Vec<String>,
}

impl CommandDescriptor {
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            category: category.into(),
            description: String::new(),
            usage: None,
            xp_reward: 0,
            scope: Scope::default(),
            admin_permissions: Vec::new(),
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = Some(usage.into());
        self
    }

    pub fn xp(mut self, xp_reward: u64) -> Self {
        self.xp_reward = xp_reward;
        self
    }

    pub fn chat_only(mut self) -> Self {
        self.scope.chat_only = true;
        self
    }

    pub fn private_only(mut self) -> Self {
        self.scope.private_only = true;
        self
    }

    pub fn dev_only(mut self) -> Self {
        self.scope.dev_only = true;
        self
    }

    /// Require owner/admin role, plus `permissions` when the invoker is an admin.
    pub fn admin_only<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scope.admin_only = true;
        self.admin_permissions = permissions.into_iter().map(Into::into).collect();
        self
    }

    /// Name followed by aliases: every key this command answers to.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}
