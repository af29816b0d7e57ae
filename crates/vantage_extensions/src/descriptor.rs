//! # Extension Descriptor
//!
//! Validates what an extension declared and turns it into the immutable
//! [`ExtensionDescriptor`] the rest of the service works with.
//!
//! Structural problems (no plugin name, duplicate provider names within a scope,
//! group providers on the server) reject the extension. Softer problems, such as a
//! condition nobody publishes or over-long texts, only produce
//! [`DescriptorWarning`]s.

use crate::error::DescriptorError;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use vantage_extension_api::{
    truncate, CallEvents, DataExtension, ElementOrder, ExtensionDeclaration, PluginInfo,
    ProviderDeclaration, ProviderInfo, ProviderValue, Scope, TabInfo, ValueKind,
};

/// Longest plugin, provider, tab and text value kept.
pub const MAX_NAME_LENGTH: usize = 50;
/// Longest provider description kept.
pub const MAX_DESCRIPTION_LENGTH: usize = 150;
/// Priority of tabs missing from the explicit tab order.
pub const DEFAULT_TAB_PRIORITY: i32 = 100;

/// A non fatal problem found in a declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorWarning {
    pub plugin: String,
    pub provider: Option<String>,
    pub message: String,
}

impl std::fmt::Display for DescriptorWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.provider {
            Some(provider) => write!(f, "{}.{}: {}", self.plugin, provider, self.message),
            None => write!(f, "{}: {}", self.plugin, self.message),
        }
    }
}

/// One validated provider and its runtime enabled flag.
#[derive(Debug)]
pub struct Provider {
    info: ProviderInfo,
    value: ProviderValue,
    enabled: AtomicBool,
}

impl Provider {
    fn new(info: ProviderInfo, value: ProviderValue) -> Self {
        Self {
            info,
            value,
            enabled: AtomicBool::new(true),
        }
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn info(&self) -> &ProviderInfo {
        &self.info
    }

    pub fn value(&self) -> &ProviderValue {
        &self.value
    }

    pub fn scope(&self) -> Scope {
        self.value.scope()
    }

    pub fn kind(&self) -> ValueKind {
        self.value.kind()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Disables the provider for the lifetime of this descriptor.
    ///
    /// Returns `true` for the call that actually flipped the flag.
    pub fn disable(&self) -> bool {
        self.enabled.swap(false, Ordering::AcqRel)
    }
}

/// A tab and its resolved sort priority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabDescriptor {
    pub info: TabInfo,
    pub priority: i32,
}

/// Everything known about a registered extension.
#[derive(Debug)]
pub struct ExtensionDescriptor {
    plugin: PluginInfo,
    tabs: Vec<TabDescriptor>,
    server_providers: Vec<Provider>,
    player_providers: Vec<Provider>,
    invalidated: Vec<String>,
    call_events: HashSet<CallEvents>,
}

/// Asks the extension for its declaration and validates it.
pub fn extract_descriptor(
    extension: &Arc<dyn DataExtension>,
) -> Result<(ExtensionDescriptor, Vec<DescriptorWarning>), DescriptorError> {
    ExtensionDescriptor::from_declaration(Arc::clone(extension).declare())
}

impl ExtensionDescriptor {
    pub fn from_declaration(
        declaration: ExtensionDeclaration,
    ) -> Result<(Self, Vec<DescriptorWarning>), DescriptorError> {
        let ExtensionDeclaration {
            plugin,
            tabs,
            tab_order,
            providers,
            invalidated,
            call_events,
        } = declaration;

        if plugin.name.trim().is_empty() {
            return Err(DescriptorError::MissingPluginName);
        }
        let mut warnings = Warnings::new(truncate(&plugin.name, MAX_NAME_LENGTH));
        if plugin.name.chars().count() > MAX_NAME_LENGTH {
            warnings.plugin(format!("plugin name is longer than {MAX_NAME_LENGTH} characters and was cut"));
        }
        let plugin = PluginInfo {
            name: warnings.plugin_name.clone(),
            icon: plugin.icon,
        };

        let mut seen = HashSet::new();
        let mut server_providers = Vec::new();
        let mut player_providers = Vec::new();
        for ProviderDeclaration { info, value } in providers {
            let scope = value.scope();
            if info.name.trim().is_empty() {
                return Err(DescriptorError::InvalidProvider {
                    plugin: plugin.name.clone(),
                    provider: info.name,
                    reason: "provider name is empty".to_string(),
                });
            }
            if value.kind() == ValueKind::Group && scope == Scope::Server {
                return Err(DescriptorError::InvalidProvider {
                    plugin: plugin.name.clone(),
                    provider: info.name,
                    reason: "group providers can only be about players".to_string(),
                });
            }

            let info = normalize_info(info, &mut warnings);
            if !seen.insert((scope, info.name.clone())) {
                return Err(DescriptorError::DuplicateProvider {
                    plugin: plugin.name.clone(),
                    scope,
                    provider: info.name,
                });
            }
            let provider = Provider::new(info, value);
            match scope {
                Scope::Server => server_providers.push(provider),
                Scope::Player => player_providers.push(provider),
            }
        }

        check_conditions(&server_providers, &mut warnings);
        check_conditions(&player_providers, &mut warnings);

        let tabs = resolve_tabs(
            tabs,
            tab_order,
            server_providers.iter().chain(player_providers.iter()),
            &mut warnings,
        );

        let descriptor = Self {
            plugin,
            tabs,
            server_providers,
            player_providers,
            invalidated,
            call_events: call_events.into_iter().collect(),
        };
        Ok((descriptor, warnings.into_inner()))
    }

    pub fn plugin(&self) -> &PluginInfo {
        &self.plugin
    }

    pub fn name(&self) -> &str {
        &self.plugin.name
    }

    /// Tabs in display order.
    pub fn tabs(&self) -> &[TabDescriptor] {
        &self.tabs
    }

    pub fn providers(&self, scope: Scope) -> &[Provider] {
        match scope {
            Scope::Server => &self.server_providers,
            Scope::Player => &self.player_providers,
        }
    }

    pub fn providers_of_kind(&self, scope: Scope, kind: ValueKind) -> impl Iterator<Item = &Provider> {
        self.providers(scope).iter().filter(move |provider| provider.kind() == kind)
    }

    pub fn all_providers(&self) -> impl Iterator<Item = &Provider> {
        self.server_providers.iter().chain(self.player_providers.iter())
    }

    pub fn invalidated(&self) -> &[String] {
        &self.invalidated
    }

    pub fn call_events(&self) -> &HashSet<CallEvents> {
        &self.call_events
    }

    /// Whether a gather triggered by `event` should be skipped.
    pub fn should_skip_event(&self, event: CallEvents) -> bool {
        event != CallEvents::Manual && !self.call_events.contains(&event)
    }
}

struct Warnings {
    plugin_name: String,
    list: Vec<DescriptorWarning>,
}

impl Warnings {
    fn new(plugin_name: String) -> Self {
        Self {
            plugin_name,
            list: Vec::new(),
        }
    }

    fn plugin(&mut self, message: String) {
        self.list.push(DescriptorWarning {
            plugin: self.plugin_name.clone(),
            provider: None,
            message,
        });
    }

    fn provider(&mut self, provider: &str, message: String) {
        self.list.push(DescriptorWarning {
            plugin: self.plugin_name.clone(),
            provider: Some(provider.to_string()),
            message,
        });
    }

    fn into_inner(self) -> Vec<DescriptorWarning> {
        self.list
    }
}

fn normalize_info(mut info: ProviderInfo, warnings: &mut Warnings) -> ProviderInfo {
    if info.name.chars().count() > MAX_NAME_LENGTH {
        warnings.provider(&info.name, format!("name is longer than {MAX_NAME_LENGTH} characters and was cut"));
        info.name = truncate(&info.name, MAX_NAME_LENGTH);
    }
    if info.text.chars().count() > MAX_NAME_LENGTH {
        warnings.provider(&info.name, format!("text is longer than {MAX_NAME_LENGTH} characters and was cut"));
        info.text = truncate(&info.text, MAX_NAME_LENGTH);
    }
    if let Some(description) = &info.description {
        if description.chars().count() > MAX_DESCRIPTION_LENGTH {
            warnings.provider(
                &info.name,
                format!("description is longer than {MAX_DESCRIPTION_LENGTH} characters and was cut"),
            );
            info.description = Some(truncate(description, MAX_DESCRIPTION_LENGTH));
        }
    }
    info.tab = info.tab.map(|tab| truncate(&tab, MAX_NAME_LENGTH));
    info
}

fn check_conditions(providers: &[Provider], warnings: &mut Warnings) {
    let published: HashSet<&str> = providers
        .iter()
        .filter_map(|provider| provider.value().provided_condition())
        .collect();

    for provider in providers {
        let Some(condition) = &provider.info().condition else {
            continue;
        };
        if provider.value().provided_condition() == Some(condition.name.as_str()) {
            warnings.provider(
                provider.name(),
                format!("condition '{}' is published by the provider itself, it will never be called", condition.name),
            );
        } else if !published.contains(condition.name.as_str()) {
            warnings.provider(
                provider.name(),
                format!(
                    "condition '{}' is not published by any {} boolean provider",
                    condition.name,
                    provider.scope()
                ),
            );
        }
    }
}

fn resolve_tabs<'a>(
    declared: Vec<TabInfo>,
    tab_order: Option<Vec<String>>,
    providers: impl Iterator<Item = &'a Provider>,
    warnings: &mut Warnings,
) -> Vec<TabDescriptor> {
    let mut tabs: Vec<TabInfo> = Vec::with_capacity(declared.len());
    for tab in declared {
        let name = truncate(&tab.name, MAX_NAME_LENGTH);
        if tabs.iter().any(|existing| existing.name == name) {
            warnings.plugin(format!("tab '{name}' is declared more than once, keeping the first"));
            continue;
        }
        tabs.push(TabInfo {
            name,
            icon: tab.icon,
            element_order: ElementOrder::complete(&tab.element_order),
        });
    }
    for provider in providers {
        if let Some(tab) = &provider.info().tab {
            if !tabs.iter().any(|existing| &existing.name == tab) {
                tabs.push(TabInfo::new(tab.clone()));
            }
        }
    }

    let order: Vec<String> = tab_order
        .unwrap_or_default()
        .iter()
        .map(|name| truncate(name, MAX_NAME_LENGTH))
        .collect();
    let mut resolved: Vec<TabDescriptor> = tabs
        .into_iter()
        .map(|info| {
            let priority = order
                .iter()
                .position(|name| *name == info.name)
                .map(|index| index as i32)
                .unwrap_or(DEFAULT_TAB_PRIORITY);
            TabDescriptor { info, priority }
        })
        .collect();
    resolved.sort_by_key(|tab| tab.priority);
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use vantage_extension_api::{Conditional, Method};

    fn declaration() -> ExtensionDeclaration {
        ExtensionDeclaration::new(PluginInfo::new("Test"))
    }

    #[test]
    fn test_providers_are_split_by_scope() {
        let (descriptor, warnings) = ExtensionDescriptor::from_declaration(
            declaration()
                .number(ProviderInfo::new("players", "Players"), Method::server(|| Ok(3)))
                .number(ProviderInfo::new("kills", "Kills"), Method::player(|_| Ok(1)))
                .string(ProviderInfo::new("rank", "Rank"), Method::player(|_| Ok("a".into()))),
        )
        .unwrap();

        assert!(warnings.is_empty());
        assert_eq!(descriptor.providers(Scope::Server).len(), 1);
        assert_eq!(descriptor.providers(Scope::Player).len(), 2);
        assert_eq!(descriptor.providers_of_kind(Scope::Player, ValueKind::Number).count(), 1);
    }

    #[test]
    fn test_same_name_in_both_scopes_is_allowed() {
        let result = ExtensionDescriptor::from_declaration(
            declaration()
                .boolean(ProviderInfo::new("flag", "Flag"), Method::server(|| Ok(true)))
                .boolean(ProviderInfo::new("flag", "Flag"), Method::player(|_| Ok(true))),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_duplicate_provider_is_rejected() {
        let result = ExtensionDescriptor::from_declaration(
            declaration()
                .number(ProviderInfo::new("value", "Value"), Method::player(|_| Ok(1)))
                .double(ProviderInfo::new("value", "Value"), Method::player(|_| Ok(1.0))),
        );
        assert!(matches!(result, Err(DescriptorError::DuplicateProvider { .. })));
    }

    #[test]
    fn test_missing_plugin_name_is_rejected() {
        let result = ExtensionDescriptor::from_declaration(ExtensionDeclaration::new(PluginInfo::new("  ")));
        assert!(matches!(result, Err(DescriptorError::MissingPluginName)));
    }

    #[test]
    fn test_server_group_is_rejected() {
        let result = ExtensionDescriptor::from_declaration(
            declaration().group(ProviderInfo::new("groups", "Groups"), Method::server(|| Ok(vec![]))),
        );
        assert!(matches!(result, Err(DescriptorError::InvalidProvider { .. })));
    }

    #[test]
    fn test_unknown_condition_only_warns() {
        let (descriptor, warnings) = ExtensionDescriptor::from_declaration(
            declaration()
                .condition(ProviderInfo::new("online", "Online"), "online", Method::server(|| Ok(true)))
                .number(
                    ProviderInfo::new("value", "Value").conditional(Conditional::new("online")),
                    Method::player(|_| Ok(1)),
                ),
        )
        .unwrap();

        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].provider.as_deref(), Some("value"));
        assert_eq!(descriptor.providers(Scope::Player).len(), 1);
    }

    #[test]
    fn test_long_texts_are_cut_with_warning() {
        let (descriptor, warnings) = ExtensionDescriptor::from_declaration(
            declaration().number(
                ProviderInfo::new("value", "x".repeat(60)).description("d".repeat(200)),
                Method::player(|_| Ok(1)),
            ),
        )
        .unwrap();

        let info = descriptor.providers(Scope::Player)[0].info();
        assert_eq!(info.text.len(), MAX_NAME_LENGTH);
        assert_eq!(info.description.as_ref().map(String::len), Some(MAX_DESCRIPTION_LENGTH));
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn test_tab_order_and_duplicates() {
        let (descriptor, warnings) = ExtensionDescriptor::from_declaration(
            declaration()
                .tab(TabInfo::new("First"))
                .tab(TabInfo::new("Second").element_order(vec![ElementOrder::Table]))
                .tab(TabInfo::new("First").icon(vantage_extension_api::Icon::called("ignored")))
                .tab(TabInfo::new("Third"))
                .tab_order(["Third", "Second"])
                .number(ProviderInfo::new("value", "Value").tab("Implicit"), Method::player(|_| Ok(1))),
        )
        .unwrap();

        let names: Vec<&str> = descriptor.tabs().iter().map(|tab| tab.info.name.as_str()).collect();
        assert_eq!(names, vec!["Third", "Second", "First", "Implicit"]);
        assert_eq!(descriptor.tabs()[0].priority, 0);
        assert_eq!(descriptor.tabs()[2].priority, DEFAULT_TAB_PRIORITY);
        assert_eq!(descriptor.tabs()[2].info.icon, vantage_extension_api::Icon::default());
        assert_eq!(
            descriptor.tabs()[1].info.element_order,
            vec![ElementOrder::Table, ElementOrder::Values, ElementOrder::Graph]
        );
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_disable_flips_once() {
        let (descriptor, _) = ExtensionDescriptor::from_declaration(
            declaration().number(ProviderInfo::new("value", "Value"), Method::player(|_| Ok(1))),
        )
        .unwrap();
        let provider = &descriptor.providers(Scope::Player)[0];

        assert!(provider.is_enabled());
        assert!(provider.disable());
        assert!(!provider.disable());
        assert!(!provider.is_enabled());
    }

    #[test]
    fn test_manual_event_is_never_skipped() {
        let (descriptor, _) =
            ExtensionDescriptor::from_declaration(declaration().call_events([CallEvents::PlayerJoin])).unwrap();

        assert!(!descriptor.should_skip_event(CallEvents::Manual));
        assert!(!descriptor.should_skip_event(CallEvents::PlayerJoin));
        assert!(descriptor.should_skip_event(CallEvents::ServerPeriodical));
    }
}
