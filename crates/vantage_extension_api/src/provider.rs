//! # Provider Declarations
//!
//! An extension describes itself with an [`ExtensionDeclaration`]: its plugin
//! identity, tabs, and the list of providers. Each provider pairs presentation
//! metadata ([`ProviderInfo`]) with a typed method ([`ProviderValue`]).
//!
//! Server providers are plain closures; player providers receive the [`Player`]
//! the gather pass runs for.

use crate::table::Table;
use crate::types::{CallEvents, Color, ElementOrder, FormatType, Icon, Player, Scope};
use std::sync::Arc;

/// Error type returned by provider methods.
pub type ProviderError = Box<dyn std::error::Error + Send + Sync>;

/// Result of invoking a provider method.
pub type ProviderResult<T> = Result<T, ProviderError>;

type ServerFn<T> = dyn Fn() -> ProviderResult<T> + Send + Sync;
type PlayerFn<T> = dyn Fn(&Player) -> ProviderResult<T> + Send + Sync;

/// A provider method, either about the server or about one player.
pub enum Method<T> {
    Server(Arc<ServerFn<T>>),
    Player(Arc<PlayerFn<T>>),
}

impl<T> Method<T> {
    pub fn server<F>(method: F) -> Self
    where
        F: Fn() -> ProviderResult<T> + Send + Sync + 'static,
    {
        Method::Server(Arc::new(method))
    }

    pub fn player<F>(method: F) -> Self
    where
        F: Fn(&Player) -> ProviderResult<T> + Send + Sync + 'static,
    {
        Method::Player(Arc::new(method))
    }

    pub fn scope(&self) -> Scope {
        match self {
            Method::Server(_) => Scope::Server,
            Method::Player(_) => Scope::Player,
        }
    }

    /// Calls the method. Player methods fail when no player is given.
    pub fn invoke(&self, player: Option<&Player>) -> ProviderResult<T> {
        match (self, player) {
            (Method::Server(method), _) => method(),
            (Method::Player(method), Some(player)) => method(player),
            (Method::Player(_), None) => Err("player provider called without a player".into()),
        }
    }
}

impl<T> Clone for Method<T> {
    fn clone(&self) -> Self {
        match self {
            Method::Server(method) => Method::Server(Arc::clone(method)),
            Method::Player(method) => Method::Player(Arc::clone(method)),
        }
    }
}

impl<T> std::fmt::Debug for Method<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Method::{:?}", self.scope())
    }
}

/// Kind of value a provider produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Boolean,
    Number,
    Double,
    Percentage,
    String,
    Table,
    Group,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Boolean => "boolean",
            ValueKind::Number => "number",
            ValueKind::Double => "double",
            ValueKind::Percentage => "percentage",
            ValueKind::String => "string",
            ValueKind::Table => "table",
            ValueKind::Group => "group",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "boolean" => Some(ValueKind::Boolean),
            "number" => Some(ValueKind::Number),
            "double" => Some(ValueKind::Double),
            "percentage" => Some(ValueKind::Percentage),
            "string" => Some(ValueKind::String),
            "table" => Some(ValueKind::Table),
            "group" => Some(ValueKind::Group),
            _ => None,
        }
    }
}

/// The typed method of a provider along with kind specific options.
#[derive(Debug, Clone)]
pub enum ProviderValue {
    Boolean {
        method: Method<bool>,
        /// Condition published by this provider: `name` when true, `not_name` when false.
        provided_condition: Option<String>,
        /// Hidden booleans only gate conditions and are never displayed.
        hidden: bool,
    },
    Number {
        method: Method<i64>,
        format: FormatType,
    },
    Double(Method<f64>),
    /// Fraction between 0.0 and 1.0
    Percentage(Method<f64>),
    String {
        method: Method<String>,
        /// The value is a player name and may be rendered as a link.
        player_name: bool,
    },
    Table {
        method: Method<Table>,
        color: Color,
    },
    /// Labels a player belongs to. Player scope only.
    Group(Method<Vec<String>>),
}

impl ProviderValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            ProviderValue::Boolean { .. } => ValueKind::Boolean,
            ProviderValue::Number { .. } => ValueKind::Number,
            ProviderValue::Double(_) => ValueKind::Double,
            ProviderValue::Percentage(_) => ValueKind::Percentage,
            ProviderValue::String { .. } => ValueKind::String,
            ProviderValue::Table { .. } => ValueKind::Table,
            ProviderValue::Group(_) => ValueKind::Group,
        }
    }

    pub fn scope(&self) -> Scope {
        match self {
            ProviderValue::Boolean { method, .. } => method.scope(),
            ProviderValue::Number { method, .. } => method.scope(),
            ProviderValue::Double(method) | ProviderValue::Percentage(method) => method.scope(),
            ProviderValue::String { method, .. } => method.scope(),
            ProviderValue::Table { method, .. } => method.scope(),
            ProviderValue::Group(method) => method.scope(),
        }
    }

    pub fn provided_condition(&self) -> Option<&str> {
        match self {
            ProviderValue::Boolean {
                provided_condition, ..
            } => provided_condition.as_deref(),
            _ => None,
        }
    }
}

/// A condition gating whether a provider's value should exist.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Conditional {
    pub name: String,
    pub negated: bool,
}

impl Conditional {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            negated: false,
        }
    }

    pub fn negated(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            negated: true,
        }
    }

    /// Name under which the condition is satisfied, `not_` prefixed when negated.
    pub fn satisfied_by(&self) -> String {
        if self.negated {
            format!("not_{}", self.name)
        } else {
            self.name.clone()
        }
    }
}

/// Presentation metadata shared by all provider kinds.
#[derive(Debug, Clone)]
pub struct ProviderInfo {
    pub name: String,
    pub text: String,
    pub description: Option<String>,
    /// Higher priority values are shown first.
    pub priority: i32,
    pub icon: Icon,
    pub show_in_players_table: bool,
    pub tab: Option<String>,
    pub condition: Option<Conditional>,
}

impl ProviderInfo {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            description: None,
            priority: 0,
            icon: Icon::default(),
            show_in_players_table: false,
            tab: None,
            condition: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn icon(mut self, icon: Icon) -> Self {
        self.icon = icon;
        self
    }

    pub fn show_in_players_table(mut self) -> Self {
        self.show_in_players_table = true;
        self
    }

    pub fn tab(mut self, tab: impl Into<String>) -> Self {
        self.tab = Some(tab.into());
        self
    }

    pub fn conditional(mut self, condition: Conditional) -> Self {
        self.condition = Some(condition);
        self
    }
}

/// One declared provider.
#[derive(Debug, Clone)]
pub struct ProviderDeclaration {
    pub info: ProviderInfo,
    pub value: ProviderValue,
}

/// Identity of the plugin an extension reports for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginInfo {
    pub name: String,
    pub icon: Icon,
}

impl PluginInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            icon: Icon::default(),
        }
    }

    pub fn icon(mut self, icon: Icon) -> Self {
        self.icon = icon;
        self
    }
}

/// Presentation of a tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabInfo {
    pub name: String,
    pub icon: Icon,
    pub element_order: Vec<ElementOrder>,
}

impl TabInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            icon: Icon::default(),
            element_order: ElementOrder::DEFAULT_ORDER.to_vec(),
        }
    }

    pub fn icon(mut self, icon: Icon) -> Self {
        self.icon = icon;
        self
    }

    pub fn element_order(mut self, order: Vec<ElementOrder>) -> Self {
        self.element_order = order;
        self
    }
}

/// Everything an extension declares about itself.
///
/// ```rust
/// use vantage_extension_api::{ExtensionDeclaration, Method, PluginInfo, ProviderInfo};
///
/// let declaration = ExtensionDeclaration::new(PluginInfo::new("Economy"))
///     .number(ProviderInfo::new("balance", "Balance"), Method::player(|_player| Ok(120)))
///     .string(ProviderInfo::new("currency", "Currency"), Method::server(|| Ok("gold".to_string())));
///
/// assert_eq!(declaration.providers.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct ExtensionDeclaration {
    pub plugin: PluginInfo,
    pub tabs: Vec<TabInfo>,
    /// Explicit tab ordering. Tabs not listed sort after listed ones.
    pub tab_order: Option<Vec<String>>,
    pub providers: Vec<ProviderDeclaration>,
    /// Provider names whose stored values are removed when the extension registers.
    pub invalidated: Vec<String>,
    pub call_events: Vec<CallEvents>,
}

impl ExtensionDeclaration {
    pub fn new(plugin: PluginInfo) -> Self {
        Self {
            plugin,
            tabs: Vec::new(),
            tab_order: None,
            providers: Vec::new(),
            invalidated: Vec::new(),
            call_events: CallEvents::defaults(),
        }
    }

    pub fn tab(mut self, tab: TabInfo) -> Self {
        self.tabs.push(tab);
        self
    }

    pub fn tab_order<S: Into<String>>(mut self, order: impl IntoIterator<Item = S>) -> Self {
        self.tab_order = Some(order.into_iter().map(Into::into).collect());
        self
    }

    pub fn invalidate(mut self, provider_name: impl Into<String>) -> Self {
        self.invalidated.push(provider_name.into());
        self
    }

    pub fn call_events(mut self, events: impl IntoIterator<Item = CallEvents>) -> Self {
        self.call_events = events.into_iter().collect();
        self
    }

    pub fn provider(mut self, info: ProviderInfo, value: ProviderValue) -> Self {
        self.providers.push(ProviderDeclaration { info, value });
        self
    }

    pub fn boolean(self, info: ProviderInfo, method: Method<bool>) -> Self {
        self.provider(
            info,
            ProviderValue::Boolean {
                method,
                provided_condition: None,
                hidden: false,
            },
        )
    }

    /// A boolean that also publishes a condition other providers can depend on.
    pub fn condition(
        self,
        info: ProviderInfo,
        condition_name: impl Into<String>,
        method: Method<bool>,
    ) -> Self {
        self.provider(
            info,
            ProviderValue::Boolean {
                method,
                provided_condition: Some(condition_name.into()),
                hidden: false,
            },
        )
    }

    pub fn number(self, info: ProviderInfo, method: Method<i64>) -> Self {
        self.formatted_number(info, FormatType::None, method)
    }

    pub fn formatted_number(self, info: ProviderInfo, format: FormatType, method: Method<i64>) -> Self {
        self.provider(info, ProviderValue::Number { method, format })
    }

    pub fn double(self, info: ProviderInfo, method: Method<f64>) -> Self {
        self.provider(info, ProviderValue::Double(method))
    }

    pub fn percentage(self, info: ProviderInfo, method: Method<f64>) -> Self {
        self.provider(info, ProviderValue::Percentage(method))
    }

    pub fn string(self, info: ProviderInfo, method: Method<String>) -> Self {
        self.provider(
            info,
            ProviderValue::String {
                method,
                player_name: false,
            },
        )
    }

    pub fn player_name(self, info: ProviderInfo, method: Method<String>) -> Self {
        self.provider(
            info,
            ProviderValue::String {
                method,
                player_name: true,
            },
        )
    }

    pub fn table(self, info: ProviderInfo, color: Color, method: Method<Table>) -> Self {
        self.provider(info, ProviderValue::Table { method, color })
    }

    pub fn group(self, info: ProviderInfo, method: Method<Vec<String>>) -> Self {
        self.provider(info, ProviderValue::Group(method))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PlayerUuid;

    #[test]
    fn test_player_method_requires_player() {
        let method: Method<i64> = Method::player(|player| Ok(player.name.len() as i64));
        assert!(method.invoke(None).is_err());

        let player = Player::new(PlayerUuid::new(), "Alice");
        assert_eq!(method.invoke(Some(&player)).unwrap(), 5);
    }

    #[test]
    fn test_server_method_ignores_player() {
        let method = Method::server(|| Ok(true));
        let player = Player::new(PlayerUuid::new(), "Bob");
        assert!(method.invoke(Some(&player)).unwrap());
        assert_eq!(method.scope(), Scope::Server);
    }

    #[test]
    fn test_negated_condition_name() {
        assert_eq!(Conditional::new("online").satisfied_by(), "online");
        assert_eq!(Conditional::negated("online").satisfied_by(), "not_online");
    }

    #[test]
    fn test_declaration_builder() {
        let declaration = ExtensionDeclaration::new(PluginInfo::new("Builder"))
            .tab(TabInfo::new("Stats"))
            .tab_order(["Stats"])
            .condition(ProviderInfo::new("online", "Online"), "online", Method::player(|_| Ok(true)))
            .group(ProviderInfo::new("teams", "Teams"), Method::player(|_| Ok(vec!["red".into()])))
            .invalidate("old_value")
            .call_events([CallEvents::PlayerJoin]);

        assert_eq!(declaration.providers.len(), 2);
        assert_eq!(declaration.providers[0].value.provided_condition(), Some("online"));
        assert_eq!(declaration.providers[1].value.kind(), ValueKind::Group);
        assert_eq!(declaration.tab_order, Some(vec!["Stats".to_string()]));
        assert_eq!(declaration.invalidated, vec!["old_value".to_string()]);
        assert_eq!(declaration.call_events, vec![CallEvents::PlayerJoin]);
    }
}
