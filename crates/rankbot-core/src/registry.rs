//! Command registry and lookup.
//!
//! The `Registry` owns every loaded command and tracks usage statistics.
//! It is built once at start-up; a reload builds a fresh registry and swaps
//! it in whole through a [`RegistryHandle`].

use crate::descriptor::CommandDescriptor;
use crate::error::{PluginError, RegistryError};
use crate::traits::Command;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{error, info};

/// A descriptor paired with its implementation, as supplied by a plugin source.
#[derive(Clone)]
pub struct CommandPlugin {
    pub descriptor: CommandDescriptor,
    pub handler: Arc<dyn Command>,
}

impl CommandPlugin {
    pub fn new(descriptor: CommandDescriptor, handler: Arc<dyn Command>) -> Self {
        Self {
            descriptor,
            handler,
        }
    }
}

/// A command as held by the registry.
pub struct RegisteredCommand {
    pub descriptor: CommandDescriptor,
    pub handler: Arc<dyn Command>,
    uses: AtomicU64,
}

impl RegisteredCommand {
    pub fn uses(&self) -> u64 {
        self.uses.load(Ordering::Relaxed)
    }

    pub(crate) fn record_use(&self) {
        self.uses.fetch_add(1, Ordering::Relaxed);
    }
}

/// Outcome of a bulk load.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Names of the commands registered, in load order.
    pub loaded: Vec<String>,
    pub plugin_errors: Vec<PluginError>,
    pub registry_errors: Vec<RegistryError>,
}

impl LoadReport {
    pub fn failed(&self) -> usize {
        self.plugin_errors.len() + self.registry_errors.len()
    }
}

/// Shared view of the live registry.
///
/// Clones see the same registry; [`replace`](Self::replace) swaps it for
/// every holder at once. Readers keep the snapshot they took.
#[derive(Clone, Default)]
pub struct RegistryHandle(Arc<RwLock<Arc<Registry>>>);

impl RegistryHandle {
    pub fn new(registry: Registry) -> Self {
        Self(Arc::new(RwLock::new(Arc::new(registry))))
    }

    pub fn snapshot(&self) -> Arc<Registry> {
        self.0.read().clone()
    }

    pub fn replace(&self, registry: Registry) {
        *self.0.write() = Arc::new(registry);
    }
}

impl From<Registry> for RegistryHandle {
    fn from(registry: Registry) -> Self {
        Self::new(registry)
    }
}

/// Registry of command implementations.
#[derive(Default)]
pub struct Registry {
    commands: Vec<RegisteredCommand>,
    /// Lower-cased command name -> index into `commands`.
    by_name: HashMap<String, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one command.
    ///
    /// Names and aliases are lower-cased and must be unique across the whole
    /// registry.
    pub fn register(
        &mut self,
        mut descriptor: CommandDescriptor,
        handler: Arc<dyn Command>,
    ) -> Result<(), RegistryError> {
        descriptor.name = descriptor.name.to_lowercase();
        for alias in &mut descriptor.aliases {
            *alias = alias.to_lowercase();
        }
        validate(&descriptor)?;

        let mut seen: Vec<&str> = Vec::new();
        for key in descriptor.keys() {
            let existing = match self.owner_of(key) {
                Some(owner) => Some(owner.clone()),
                None if seen.contains(&key) => Some(descriptor.name.clone()),
                None => None,
            };
            if let Some(existing) = existing {
                return Err(RegistryError::DuplicateCommand {
                    command: descriptor.name.clone(),
                    key: key.to_string(),
                    existing,
                });
            }
            seen.push(key);
        }

        self.by_name.insert(descriptor.name.clone(), self.commands.len());
        self.commands.push(RegisteredCommand {
            descriptor,
            handler,
            uses: AtomicU64::new(0),
        });
        Ok(())
    }

    /// Register every plugin the source produced, skipping failures.
    ///
    /// A failing plugin is logged and reported; it never prevents the
    /// remaining plugins from loading.
    pub fn load<I>(&mut self, plugins: I) -> LoadReport
    where
        I: IntoIterator<Item = Result<CommandPlugin, PluginError>>,
    {
        info!("Loading commands");
        let mut report = LoadReport::default();

        for plugin in plugins {
            let plugin = match plugin {
                Ok(plugin) => plugin,
                Err(e) => {
                    error!(plugin = %e.source_name, error = %e.reason, "Failed to load plugin");
                    report.plugin_errors.push(e);
                    continue;
                }
            };

            let name = plugin.descriptor.name.to_lowercase();
            let category = plugin.descriptor.category.clone();
            match self.register(plugin.descriptor, plugin.handler) {
                Ok(()) => {
                    info!(command = %name, category = %category, "Loaded command");
                    report.loaded.push(name);
                }
                Err(e) => {
                    error!(command = %name, error = %e, "Failed to register command");
                    report.registry_errors.push(e);
                }
            }
        }

        info!(
            loaded = report.loaded.len(),
            failed = report.failed(),
            "Finished loading commands"
        );
        report
    }

    /// Resolve a typed token to a command.
    ///
    /// Exact (case-insensitive) name match first, then a scan over aliases.
    pub fn resolve(&self, token: &str) -> Option<&RegisteredCommand> {
        let token = token.to_lowercase();
        if let Some(&idx) = self.by_name.get(&token) {
            return self.commands.get(idx);
        }
        self.commands
            .iter()
            .find(|c| c.descriptor.aliases.iter().any(|a| a.eq_ignore_ascii_case(&token)))
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Descriptors in registration order.
    pub fn descriptors(&self) -> impl Iterator<Item = &CommandDescriptor> {
        self.commands.iter().map(|c| &c.descriptor)
    }

    /// Descriptors grouped by category, categories sorted by name.
    pub fn by_category(&self) -> Vec<(&str, Vec<&CommandDescriptor>)> {
        let mut groups: Vec<(&str, Vec<&CommandDescriptor>)> = Vec::new();
        for descriptor in self.descriptors() {
            match groups.iter_mut().find(|(c, _)| *c == descriptor.category) {
                Some((_, list)) => list.push(descriptor),
                None => groups.push((descriptor.category.as_str(), vec![descriptor])),
            }
        }
        groups.sort_by(|a, b| a.0.cmp(b.0));
        groups
    }

    /// Completed-invocation counts of commands used at least once, most used
    /// first. Gate denials, refusals and failures are not counted.
    pub fn command_stats(&self) -> Vec<(&str, u64)> {
        let mut stats: Vec<_> = self
            .commands
            .iter()
            .map(|c| (c.descriptor.name.as_str(), c.uses()))
            .filter(|(_, count)| *count > 0)
            .collect();

        stats.sort_by(|a, b| b.1.cmp(&a.1));
        stats
    }

    /// Name of the command that already answers to `key`.
    fn owner_of(&self, key: &str) -> Option<&String> {
        self.commands
            .iter()
            .find(|c| c.descriptor.keys().any(|k| k == key))
            .map(|c| &c.descriptor.name)
    }
}

fn validate(descriptor: &CommandDescriptor) -> Result<(), RegistryError> {
    let invalid = |reason: &str| RegistryError::InvalidDescriptor {
        command: descriptor.name.clone(),
        reason: reason.to_string(),
    };

    if descriptor
        .keys()
        .any(|k| k.is_empty() || k.chars().any(char::is_whitespace))
    {
        return Err(invalid("names and aliases must be non-empty and contain no whitespace"));
    }
    if descriptor.scope.chat_only && descriptor.scope.private_only {
        return Err(invalid("cannot be both chat-only and private-only"));
    }
    if !descriptor.admin_permissions.is_empty() && !descriptor.scope.admin_only {
        return Err(invalid("admin permissions require an admin-only command"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::NoopCommand;

    fn plugin(descriptor: CommandDescriptor) -> Result<CommandPlugin, PluginError> {
        Ok(CommandPlugin::new(descriptor, Arc::new(NoopCommand)))
    }

    #[test]
    fn test_resolve_by_name_and_alias() {
        let mut registry = Registry::new();
        registry
            .register(
                CommandDescriptor::new("Rank", "general").alias("XP"),
                Arc::new(NoopCommand),
            )
            .unwrap();

        assert_eq!(registry.resolve("rank").unwrap().descriptor.name, "rank");
        assert_eq!(registry.resolve("RANK").unwrap().descriptor.name, "rank");
        assert_eq!(registry.resolve("xp").unwrap().descriptor.name, "rank");
        assert_eq!(registry.resolve("Xp").unwrap().descriptor.name, "rank");
        assert!(registry.resolve("level").is_none());
        assert!(registry.resolve("").is_none());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = Registry::new();
        registry
            .register(CommandDescriptor::new("hi", "general"), Arc::new(NoopCommand))
            .unwrap();
        let err = registry
            .register(CommandDescriptor::new("HI", "fun"), Arc::new(NoopCommand))
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateCommand { ref key, .. } if key == "hi"));
    }

    #[test]
    fn test_alias_colliding_with_name_rejected() {
        let mut registry = Registry::new();
        registry
            .register(CommandDescriptor::new("hi", "general"), Arc::new(NoopCommand))
            .unwrap();
        let err = registry
            .register(
                CommandDescriptor::new("hello", "general").alias("hi"),
                Arc::new(NoopCommand),
            )
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateCommand {
                command: "hello".into(),
                key: "hi".into(),
                existing: "hi".into(),
            }
        );
    }

    #[test]
    fn test_self_duplicate_alias_rejected() {
        let mut registry = Registry::new();
        let err = registry
            .register(
                CommandDescriptor::new("hi", "general").alias("yo").alias("YO"),
                Arc::new(NoopCommand),
            )
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateCommand { ref key, .. } if key == "yo"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_bulk_load_shared_alias_keeps_first() {
        let mut registry = Registry::new();
        let report = registry.load(vec![
            plugin(CommandDescriptor::new("anime", "anime").alias("ani")),
            plugin(CommandDescriptor::new("animal", "fun").alias("ani")),
        ]);

        assert_eq!(report.loaded, vec!["anime"]);
        assert!(matches!(
            report.registry_errors.as_slice(),
            [RegistryError::DuplicateCommand { command, key, existing }]
                if command == "animal" && key == "ani" && existing == "anime"
        ));
        assert_eq!(registry.resolve("ani").unwrap().descriptor.name, "anime");
        assert!(registry.resolve("animal").is_none());
    }

    #[test]
    fn test_bulk_load_tolerates_plugin_failure() {
        let mut registry = Registry::new();
        let report = registry.load(vec![
            plugin(CommandDescriptor::new("hi", "general")),
            Err(PluginError::new("weather", "missing API key")),
            plugin(CommandDescriptor::new("rank", "general")),
        ]);

        assert_eq!(report.loaded, vec!["hi", "rank"]);
        assert_eq!(report.plugin_errors.len(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_invalid_descriptors() {
        let mut registry = Registry::new();
        assert!(matches!(
            registry.register(CommandDescriptor::new("two words", "x"), Arc::new(NoopCommand)),
            Err(RegistryError::InvalidDescriptor { .. })
        ));
        assert!(matches!(
            registry.register(
                CommandDescriptor::new("x", "x").chat_only().private_only(),
                Arc::new(NoopCommand)
            ),
            Err(RegistryError::InvalidDescriptor { .. })
        ));
        let mut loose = CommandDescriptor::new("y", "x");
        loose.admin_permissions.push("can_pin_messages".into());
        assert!(matches!(
            registry.register(loose, Arc::new(NoopCommand)),
            Err(RegistryError::InvalidDescriptor { .. })
        ));
    }

    #[test]
    fn test_command_stats() {
        let mut registry = Registry::new();
        registry.load(vec![
            plugin(CommandDescriptor::new("hi", "general")),
            plugin(CommandDescriptor::new("rank", "general")),
            plugin(CommandDescriptor::new("help", "general")),
        ]);
        registry.resolve("rank").unwrap().record_use();
        registry.resolve("rank").unwrap().record_use();
        registry.resolve("hi").unwrap().record_use();

        assert_eq!(registry.command_stats(), vec![("rank", 2), ("hi", 1)]);
    }

    #[test]
    fn test_handle_replace_is_seen_by_clones() {
        let handle = RegistryHandle::default();
        let view = handle.clone();
        assert!(view.snapshot().is_empty());

        let before = view.snapshot();
        let mut registry = Registry::new();
        registry.load(vec![plugin(CommandDescriptor::new("hi", "general"))]);
        handle.replace(registry);

        assert!(view.snapshot().resolve("hi").is_some());
        assert!(before.is_empty());
    }

    #[test]
    fn test_by_category() {
        let mut registry = Registry::new();
        registry.load(vec![
            plugin(CommandDescriptor::new("promote", "chat")),
            plugin(CommandDescriptor::new("hi", "general")),
            plugin(CommandDescriptor::new("demote", "chat")),
        ]);
        let groups = registry.by_category();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "chat");
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[1].0, "general");
    }
}
