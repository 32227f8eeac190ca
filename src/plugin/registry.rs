//! Loaded plugins and the keyword routing table
use super::manifest::{Keyword, PluginDescriptor};
use super::native::NativePlugin;
use super::runtime::PluginRuntime;
use crate::config::{KeywordScope, ProtocolConfig};
use crate::error::{Result as RflaunchResult, RflaunchError};
use crate::query::{KeywordRouter, Query};
use log::{debug, info, warn};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Snapshot of one plugin handed to the dispatch engine.
#[derive(Clone)]
pub struct PluginHandle {
    pub descriptor: PluginDescriptor,
    pub runtime: Arc<PluginRuntime>,
}

impl PluginHandle {
    pub fn id(&self) -> &str {
        &self.descriptor.id
    }
}

struct Entry {
    descriptor: PluginDescriptor,
    runtime: Arc<PluginRuntime>,
}

#[derive(Default)]
struct RegistryState {
    order: Vec<String>,
    plugins: HashMap<String, Entry>,
    /// Non-global keyword to the plugins declaring it, in registration order.
    /// At most one of them is enabled at a time.
    keyword_routes: HashMap<String, Vec<String>>,
    /// Plugins holding the global keyword, in registration order.
    global: Vec<String>,
}

impl RegistryState {
    fn handle(&self, id: &str) -> Option<PluginHandle> {
        self.plugins.get(id).map(|entry| PluginHandle {
            descriptor: entry.descriptor.clone(),
            runtime: Arc::clone(&entry.runtime),
        })
    }

    fn enabled_handle(&self, id: &str) -> Option<PluginHandle> {
        self.handle(id).filter(|h| !h.descriptor.disabled)
    }

    fn is_enabled(&self, id: &str) -> bool {
        self.plugins.get(id).is_some_and(|e| !e.descriptor.disabled)
    }

    /// The enabled plugin routed to by `keyword`.
    fn keyword_owner(&self, keyword: &str) -> Option<&String> {
        self.keyword_routes
            .get(keyword)?
            .iter()
            .find(|id| self.is_enabled(id))
    }

    /// Enabled plugin other than `plugin_id` that already routes `keyword`.
    fn conflicting_owner(&self, keyword: &str, plugin_id: &str) -> Option<String> {
        self.keyword_owner(keyword)
            .filter(|owner| owner.as_str() != plugin_id)
            .cloned()
    }

    fn add_route(&mut self, keyword: &str, plugin_id: &str) {
        let owners = self.keyword_routes.entry(keyword.to_string()).or_default();
        if !owners.iter().any(|id| id == plugin_id) {
            owners.push(plugin_id.to_string());
        }
    }

    fn remove_route(&mut self, keyword: &str, plugin_id: &str) {
        if let Some(owners) = self.keyword_routes.get_mut(keyword) {
            owners.retain(|id| id != plugin_id);
            if owners.is_empty() {
                self.keyword_routes.remove(keyword);
            }
        }
    }

    fn entry_mut(&mut self, id: &str) -> RflaunchResult<&mut Entry> {
        self.plugins
            .get_mut(id)
            .ok_or_else(|| RflaunchError::UnknownPlugin(id.to_string()))
    }
}

/// Registry of all loaded plugins. Disabled plugins stay listed but are never
/// routed to.
#[derive(Default)]
pub struct PluginRegistry {
    state: RwLock<RegistryState>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every plugin directory found under `directories`. Broken plugins
    /// are logged and skipped.
    pub fn load(directories: &[PathBuf], protocol: &ProtocolConfig) -> Self {
        let registry = Self::new();
        for dir in directories {
            let loaded = registry.load_directory(dir, protocol);
            debug!("Loaded {loaded} plugin(s) from {}", dir.display());
        }
        info!("Plugin registry ready with {} plugin(s)", registry.len());
        registry
    }

    /// Loads each immediate subdirectory of `root` as a plugin. Returns the
    /// number of plugins registered.
    pub fn load_directory(&self, root: &Path, protocol: &ProtocolConfig) -> usize {
        let entries = match std::fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to read plugin directory {}: {}", root.display(), e);
                return 0;
            }
        };

        let mut plugin_dirs: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        plugin_dirs.sort();

        let mut loaded = 0;
        for dir in plugin_dirs {
            match self.load_plugin(&dir, protocol) {
                Ok(()) => loaded += 1,
                Err(e) => warn!("Skipping plugin at {}: {}", dir.display(), e),
            }
        }
        loaded
    }

    fn load_plugin(&self, dir: &Path, protocol: &ProtocolConfig) -> RflaunchResult<()> {
        let descriptor = PluginDescriptor::load(dir)?;
        let runtime = PluginRuntime::for_descriptor(&descriptor, protocol)?;
        info!(
            "Loaded {} plugin {} ({}) from {}",
            descriptor.language,
            descriptor.id,
            descriptor.name,
            dir.display()
        );
        self.register(descriptor, runtime)
    }

    pub fn register_native(
        &self,
        descriptor: PluginDescriptor,
        plugin: Arc<dyn NativePlugin>,
    ) -> RflaunchResult<()> {
        self.register(descriptor, PluginRuntime::native(plugin))
    }

    /// Adds a plugin. An enabled newcomer loses, with a warning, any keyword
    /// already routed to another enabled plugin. It stays registered even if
    /// that leaves it without keywords.
    pub fn register(
        &self,
        mut descriptor: PluginDescriptor,
        runtime: PluginRuntime,
    ) -> RflaunchResult<()> {
        let mut state = self.state.write();
        if state.plugins.contains_key(&descriptor.id) {
            return Err(RflaunchError::Other(format!(
                "duplicate plugin id '{}'",
                descriptor.id
            )));
        }

        if !descriptor.disabled {
            descriptor.action_keywords.retain(|keyword| match keyword {
                Keyword::Global => true,
                Keyword::Named(name) => match state.keyword_owner(name) {
                    Some(owner) => {
                        warn!(
                            "Plugin {} keyword '{}' already owned by {}, ignoring",
                            descriptor.id, name, owner
                        );
                        false
                    }
                    None => true,
                },
            });
            if descriptor.action_keywords.is_empty() {
                warn!(
                    "Plugin {} has no action keywords left and receives no queries until one is added",
                    descriptor.id
                );
            }
        }

        let id = descriptor.id.clone();
        for name in descriptor.named_keywords() {
            state.add_route(name, &id);
        }
        if descriptor.is_global() {
            state.global.push(id.clone());
        }
        state.order.push(id.clone());
        state.plugins.insert(
            id,
            Entry {
                descriptor,
                runtime: Arc::new(runtime),
            },
        );
        Ok(())
    }

    /// Owner of a non-global keyword, if it is enabled.
    pub fn route_keyword(&self, keyword: &str) -> Option<PluginHandle> {
        let state = self.state.read();
        let owner = state.keyword_owner(keyword)?;
        state.enabled_handle(owner)
    }

    pub fn all_global_plugins(&self) -> Vec<PluginHandle> {
        let state = self.state.read();
        state
            .global
            .iter()
            .filter_map(|id| state.enabled_handle(id))
            .collect()
    }

    /// Plugins that should receive `query`, keyword owner first.
    pub fn candidates(&self, query: &Query, scope: KeywordScope) -> Vec<PluginHandle> {
        let state = self.state.read();
        let owner = query
            .action_keyword()
            .and_then(|keyword| state.keyword_owner(keyword))
            .and_then(|id| state.enabled_handle(id));

        let mut candidates = Vec::new();
        let mut include_global = true;
        if let Some(owner) = owner {
            include_global = scope == KeywordScope::Narrow && !owner.descriptor.exclusive;
            candidates.push(owner);
        }

        if include_global {
            for id in &state.global {
                if candidates.iter().any(|c| c.id() == id) {
                    continue;
                }
                if let Some(handle) = state.enabled_handle(id) {
                    candidates.push(handle);
                }
            }
        }
        candidates
    }

    pub fn add_keyword(&self, plugin_id: &str, raw_keyword: &str) -> RflaunchResult<()> {
        let keyword = Keyword::parse(raw_keyword);
        let mut state = self.state.write();

        let enabled = !state.entry_mut(plugin_id)?.descriptor.disabled;
        if let Keyword::Named(name) = &keyword {
            if enabled {
                if let Some(owner) = state.conflicting_owner(name, plugin_id) {
                    return Err(RflaunchError::KeywordConflict {
                        keyword: name.clone(),
                        owner,
                    });
                }
            }
        }

        let entry = state.entry_mut(plugin_id)?;
        if entry.descriptor.action_keywords.contains(&keyword) {
            return Ok(());
        }
        entry.descriptor.action_keywords.push(keyword.clone());

        match keyword {
            Keyword::Named(name) => state.add_route(&name, plugin_id),
            Keyword::Global => {
                let position = state
                    .order
                    .iter()
                    .position(|id| id == plugin_id)
                    .unwrap_or(state.order.len());
                // keep global set in registration order
                let insert_at = state
                    .global
                    .iter()
                    .position(|id| {
                        state.order.iter().position(|o| o == id).unwrap_or(0) > position
                    })
                    .unwrap_or(state.global.len());
                state.global.insert(insert_at, plugin_id.to_string());
            }
        }
        info!("Added keyword '{raw_keyword}' to plugin {plugin_id}");
        Ok(())
    }

    pub fn remove_keyword(&self, plugin_id: &str, raw_keyword: &str) -> RflaunchResult<()> {
        let keyword = Keyword::parse(raw_keyword);
        let mut state = self.state.write();

        let entry = state.entry_mut(plugin_id)?;
        let before = entry.descriptor.action_keywords.len();
        entry.descriptor.action_keywords.retain(|k| k != &keyword);
        if entry.descriptor.action_keywords.len() == before {
            debug!("Plugin {plugin_id} has no keyword '{raw_keyword}'");
            return Ok(());
        }
        let still_global = entry.descriptor.is_global();

        if let Keyword::Named(name) = &keyword {
            state.remove_route(name, plugin_id);
        }
        if !still_global {
            state.global.retain(|id| id != plugin_id);
        }
        info!("Removed keyword '{raw_keyword}' from plugin {plugin_id}");
        Ok(())
    }

    /// Enabling fails if one of the plugin's keywords is routed to another
    /// enabled plugin in the meantime.
    pub fn set_disabled(&self, plugin_id: &str, disabled: bool) -> RflaunchResult<()> {
        let mut state = self.state.write();
        let entry = state.entry_mut(plugin_id)?;
        if !disabled && entry.descriptor.disabled {
            let keywords: Vec<String> =
                entry.descriptor.named_keywords().map(str::to_string).collect();
            for keyword in keywords {
                if let Some(owner) = state.conflicting_owner(&keyword, plugin_id) {
                    return Err(RflaunchError::KeywordConflict { keyword, owner });
                }
            }
        }
        state.entry_mut(plugin_id)?.descriptor.disabled = disabled;
        info!(
            "Plugin {plugin_id} {}",
            if disabled { "disabled" } else { "enabled" }
        );
        Ok(())
    }

    pub fn get(&self, plugin_id: &str) -> Option<PluginHandle> {
        self.state.read().handle(plugin_id)
    }

    /// All plugins, disabled ones included, in registration order.
    pub fn descriptors(&self) -> Vec<PluginDescriptor> {
        let state = self.state.read();
        state
            .order
            .iter()
            .filter_map(|id| state.plugins.get(id))
            .map(|entry| entry.descriptor.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.read().plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeywordRouter for PluginRegistry {
    fn is_action_keyword(&self, token: &str) -> bool {
        self.route_keyword(token).is_some()
    }
}
