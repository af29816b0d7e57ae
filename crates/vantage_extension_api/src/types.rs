//! # Core Type Definitions
//!
//! Identifiers, lifecycle triggers and presentation enums shared by every extension.
//!
//! ## Key Types
//!
//! - [`PlayerUuid`] / [`ServerUuid`] - Subjects a metric can be gathered for
//! - [`CallEvents`] - Lifecycle triggers an extension subscribes to
//! - [`Icon`], [`Family`], [`Color`] - Presentation of plugins, tabs and values
//! - [`ElementOrder`] - Order of element kinds inside a tab
//! - [`FormatType`] - How a number value is rendered

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier of a player.
///
/// # Examples
///
/// ```rust
/// use vantage_extension_api::PlayerUuid;
///
/// let player = PlayerUuid::from_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
/// assert_eq!(player.to_string(), "550e8400-e29b-41d4-a716-446655440000");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerUuid(pub Uuid);

impl PlayerUuid {
    /// Creates a new random player id using UUID v4.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses a player id from its hyphenated string form.
    pub fn from_str(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }

    /// The nil id never identifies a real player.
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl std::str::FromStr for PlayerUuid {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str(s)
    }
}

impl Default for PlayerUuid {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PlayerUuid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier of a server process whose metrics are being gathered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServerUuid(pub Uuid);

impl ServerUuid {
    /// Creates a new random server id using UUID v4.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses a server id from its hyphenated string form.
    pub fn from_str(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }
}

impl std::str::FromStr for ServerUuid {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str(s)
    }
}

impl Default for ServerUuid {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ServerUuid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A player a gather pass runs for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub uuid: PlayerUuid,
    pub name: String,
}

impl Player {
    pub fn new(uuid: PlayerUuid, name: impl Into<String>) -> Self {
        Self {
            uuid,
            name: name.into(),
        }
    }
}

/// Whether a provider produces values about the server or about a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    Server,
    Player,
}

impl Scope {
    /// Stable name used in persisted catalog rows.
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Server => "server",
            Scope::Player => "player",
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Lifecycle Triggers
// ============================================================================

/// Lifecycle events that may trigger a gather pass.
///
/// An extension lists the events it wants to be called on. [`CallEvents::Manual`]
/// requests are never skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallEvents {
    /// Explicit request through a `Caller` or a management command
    Manual,
    /// A player joined the server
    PlayerJoin,
    /// A player left the server
    PlayerLeave,
    /// A player name was seen for the first time
    PlayerNameFirstSeen,
    /// Periodic server tick
    ServerPeriodical,
    /// The extension itself was just registered
    ServerExtensionRegister,
}

impl CallEvents {
    /// Events an extension is called on when it does not list its own.
    pub fn defaults() -> Vec<CallEvents> {
        vec![
            CallEvents::PlayerJoin,
            CallEvents::PlayerLeave,
            CallEvents::ServerExtensionRegister,
            CallEvents::ServerPeriodical,
        ]
    }
}

impl std::fmt::Display for CallEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CallEvents::Manual => "MANUAL",
            CallEvents::PlayerJoin => "PLAYER_JOIN",
            CallEvents::PlayerLeave => "PLAYER_LEAVE",
            CallEvents::PlayerNameFirstSeen => "PLAYER_NAME_FIRST_SEEN",
            CallEvents::ServerPeriodical => "SERVER_PERIODICAL",
            CallEvents::ServerExtensionRegister => "SERVER_EXTENSION_REGISTER",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Presentation
// ============================================================================

/// Icon style family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Family {
    #[default]
    Solid,
    Regular,
    Brand,
}

impl Family {
    pub fn as_str(&self) -> &'static str {
        match self {
            Family::Solid => "SOLID",
            Family::Regular => "REGULAR",
            Family::Brand => "BRAND",
        }
    }

    /// Unknown names fall back to [`Family::Solid`].
    pub fn from_name(name: &str) -> Self {
        match name {
            "REGULAR" => Family::Regular,
            "BRAND" => Family::Brand,
            _ => Family::Solid,
        }
    }
}

/// Material palette used for icons and table headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Color {
    Red,
    Pink,
    Purple,
    DeepPurple,
    Indigo,
    Blue,
    LightBlue,
    Cyan,
    Teal,
    Green,
    LightGreen,
    Lime,
    Yellow,
    Amber,
    Orange,
    DeepOrange,
    Brown,
    Grey,
    BlueGrey,
    Black,
    #[default]
    None,
}

const COLORS: [(Color, &str); 21] = [
    (Color::Red, "RED"),
    (Color::Pink, "PINK"),
    (Color::Purple, "PURPLE"),
    (Color::DeepPurple, "DEEP_PURPLE"),
    (Color::Indigo, "INDIGO"),
    (Color::Blue, "BLUE"),
    (Color::LightBlue, "LIGHT_BLUE"),
    (Color::Cyan, "CYAN"),
    (Color::Teal, "TEAL"),
    (Color::Green, "GREEN"),
    (Color::LightGreen, "LIGHT_GREEN"),
    (Color::Lime, "LIME"),
    (Color::Yellow, "YELLOW"),
    (Color::Amber, "AMBER"),
    (Color::Orange, "ORANGE"),
    (Color::DeepOrange, "DEEP_ORANGE"),
    (Color::Brown, "BROWN"),
    (Color::Grey, "GREY"),
    (Color::BlueGrey, "BLUE_GREY"),
    (Color::Black, "BLACK"),
    (Color::None, "NONE"),
];

impl Color {
    pub fn as_str(&self) -> &'static str {
        COLORS
            .iter()
            .find(|(color, _)| color == self)
            .map(|(_, name)| *name)
            .unwrap_or("NONE")
    }

    /// Unknown names fall back to [`Color::None`].
    pub fn from_name(name: &str) -> Self {
        COLORS
            .iter()
            .find(|(_, candidate)| *candidate == name)
            .map(|(color, _)| *color)
            .unwrap_or(Color::None)
    }

    /// CSS class of the colour, e.g. `deep-purple`.
    pub fn css_class(&self) -> String {
        self.as_str().to_lowercase().replace('_', "-")
    }
}

/// An icon shown next to plugins, tabs, values and table columns.
///
/// The default icon is a plain solid circle without colour.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Icon {
    pub name: String,
    pub family: Family,
    pub color: Color,
}

impl Icon {
    /// Creates a solid, uncoloured icon with the given name.
    pub fn called(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            family: Family::Solid,
            color: Color::None,
        }
    }

    pub fn of(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn family(mut self, family: Family) -> Self {
        self.family = family;
        self
    }
}

impl Default for Icon {
    fn default() -> Self {
        Icon::called("circle")
    }
}

/// Kinds of elements a tab can display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementOrder {
    Values,
    Table,
    Graph,
}

impl ElementOrder {
    /// Fallback order used for kinds a tab does not mention.
    pub const DEFAULT_ORDER: [ElementOrder; 3] =
        [ElementOrder::Values, ElementOrder::Table, ElementOrder::Graph];

    pub fn as_str(&self) -> &'static str {
        match self {
            ElementOrder::Values => "VALUES",
            ElementOrder::Table => "TABLE",
            ElementOrder::Graph => "GRAPH",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim() {
            "VALUES" => Some(ElementOrder::Values),
            "TABLE" => Some(ElementOrder::Table),
            "GRAPH" => Some(ElementOrder::Graph),
            _ => None,
        }
    }

    /// Removes duplicates and appends missing kinds in the fallback order.
    pub fn complete(order: &[ElementOrder]) -> Vec<ElementOrder> {
        let mut completed: Vec<ElementOrder> = Vec::with_capacity(Self::DEFAULT_ORDER.len());
        for element in order.iter().chain(Self::DEFAULT_ORDER.iter()) {
            if !completed.contains(element) {
                completed.push(*element);
            }
        }
        completed
    }

    /// Comma separated form, e.g. `VALUES,TABLE,GRAPH`.
    pub fn serialize_order(order: &[ElementOrder]) -> String {
        order
            .iter()
            .map(ElementOrder::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Parses the comma separated form. Unknown entries are dropped and missing kinds filled in.
    pub fn parse_order(serialized: &str) -> Vec<ElementOrder> {
        let parsed: Vec<ElementOrder> = serialized
            .split(',')
            .filter_map(ElementOrder::from_name)
            .collect();
        Self::complete(&parsed)
    }
}

/// How a number value is turned into text.
///
/// Date and time formats interpret the number as epoch milliseconds or a
/// millisecond duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FormatType {
    #[default]
    None,
    DateYear,
    DateSecond,
    TimeMilliseconds,
}

impl FormatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatType::None => "NONE",
            FormatType::DateYear => "DATE_YEAR",
            FormatType::DateSecond => "DATE_SECOND",
            FormatType::TimeMilliseconds => "TIME_MILLISECONDS",
        }
    }

    pub fn from_name(name: &str) -> Self {
        match name {
            "DATE_YEAR" => FormatType::DateYear,
            "DATE_SECOND" => FormatType::DateSecond,
            "TIME_MILLISECONDS" => FormatType::TimeMilliseconds,
            _ => FormatType::None,
        }
    }

    pub fn format(&self, value: i64) -> String {
        match self {
            FormatType::None => value.to_string(),
            FormatType::DateYear => format_epoch_millis(value, "%b %-d %Y"),
            FormatType::DateSecond => format_epoch_millis(value, "%b %-d %Y, %H:%M:%S"),
            FormatType::TimeMilliseconds => format_duration_millis(value),
        }
    }
}

fn format_epoch_millis(millis: i64, pattern: &str) -> String {
    match chrono::DateTime::from_timestamp_millis(millis) {
        Some(date) => date.format(pattern).to_string(),
        None => millis.to_string(),
    }
}

fn format_duration_millis(millis: i64) -> String {
    if millis < 1000 {
        return "0s".to_string();
    }
    let total_seconds = millis / 1000;
    let (days, rest) = (total_seconds / 86_400, total_seconds % 86_400);
    let (hours, rest) = (rest / 3600, rest % 3600);
    let (minutes, seconds) = (rest / 60, rest % 60);

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{days}d"));
    }
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    if seconds > 0 {
        parts.push(format!("{seconds}s"));
    }
    parts.join(" ")
}
