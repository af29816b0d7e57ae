#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use vantage_extension_api::*;
use vantage_extensions::{
    Database, ErrorLogger, ExtensionService, JsonCache, MemoryExtensionSettings, Processing,
};

pub fn service() -> Arc<ExtensionService> {
    service_with(Arc::new(MemoryExtensionSettings::new()))
}

pub fn service_with(settings: Arc<MemoryExtensionSettings>) -> Arc<ExtensionService> {
    service_on(
        ServerUuid::new(),
        Arc::new(Database::open_in_memory().unwrap()),
        settings,
    )
}

pub fn service_on(
    server: ServerUuid,
    database: Arc<Database>,
    settings: Arc<MemoryExtensionSettings>,
) -> Arc<ExtensionService> {
    ExtensionService::new(
        server,
        database,
        settings,
        Arc::new(JsonCache::default()),
        Processing::from_current(4).unwrap(),
        Arc::new(ErrorLogger::new()),
    )
}

pub fn alice() -> Player {
    Player::new(PlayerUuid::new(), "Alice")
}

/// One provider of every player value kind.
pub struct PlayerExtension;

impl DataExtension for PlayerExtension {
    fn declare(self: Arc<Self>) -> ExtensionDeclaration {
        ExtensionDeclaration::new(PluginInfo::new("PlayerExtension"))
            .number(
                ProviderInfo::new("value", "A Number").show_in_players_table(),
                Method::player(|_| Ok(5)),
            )
            .boolean(ProviderInfo::new("boolVal", "A Boolean"), Method::player(|_| Ok(false)))
            .double(ProviderInfo::new("doubleVal", "A Double"), Method::player(|_| Ok(0.5)))
            .percentage(ProviderInfo::new("percentageVal", "A Percentage"), Method::player(|_| Ok(0.5)))
            .string(
                ProviderInfo::new("stringVal", "A String"),
                Method::player(|_| Ok("Something".to_string())),
            )
            .group(
                ProviderInfo::new("groupVal", "A Group"),
                Method::player(|_| Ok(vec!["Group".to_string()])),
            )
    }
}

/// One provider of every server value kind.
pub struct ServerExtension;

impl DataExtension for ServerExtension {
    fn declare(self: Arc<Self>) -> ExtensionDeclaration {
        ExtensionDeclaration::new(PluginInfo::new("ServerExtension"))
            .call_events([CallEvents::ServerPeriodical])
            .number(ProviderInfo::new("value", "A Number"), Method::server(|| Ok(5)))
            .boolean(ProviderInfo::new("boolVal", "A Boolean"), Method::server(|| Ok(false)))
            .double(ProviderInfo::new("doubleVal", "A Double"), Method::server(|| Ok(0.5)))
            .percentage(ProviderInfo::new("percentageVal", "A Percentage"), Method::server(|| Ok(0.5)))
            .string(
                ProviderInfo::new("stringVal", "A String"),
                Method::server(|| Ok("Something".to_string())),
            )
    }
}

/// Values gated by a boolean whose value the test controls.
pub struct ConditionalExtension {
    pub condition: Arc<AtomicBool>,
}

impl ConditionalExtension {
    pub fn new(condition: bool) -> Arc<Self> {
        Arc::new(Self {
            condition: Arc::new(AtomicBool::new(condition)),
        })
    }

    pub fn set(&self, condition: bool) {
        self.condition.store(condition, Ordering::SeqCst);
    }
}

impl DataExtension for ConditionalExtension {
    fn declare(self: Arc<Self>) -> ExtensionDeclaration {
        let player_state = Arc::clone(&self.condition);
        let server_state = Arc::clone(&self.condition);
        let conditional = || ProviderInfo::new("conditionalValue", "Conditional").conditional(Conditional::new("condition"));
        let reversed = || {
            ProviderInfo::new("reversedConditionalValue", "Reversed").conditional(Conditional::negated("condition"))
        };

        ExtensionDeclaration::new(PluginInfo::new("ConditionalExtension"))
            .call_events([CallEvents::PlayerJoin, CallEvents::ServerPeriodical])
            .condition(
                ProviderInfo::new("isCondition", "Condition"),
                "condition",
                Method::player(move |_| Ok(player_state.load(Ordering::SeqCst))),
            )
            .string(conditional(), Method::player(|_| Ok("Conditional".to_string())))
            .string(reversed(), Method::player(|_| Ok("Reversed".to_string())))
            .string(
                ProviderInfo::new("unconditional", "Unconditional"),
                Method::player(|_| Ok("unconditional".to_string())),
            )
            .group(
                ProviderInfo::new("conditionalGroups", "Groups").conditional(Conditional::new("condition")),
                Method::player(|_| Ok(vec!["Group".to_string()])),
            )
            .condition(
                ProviderInfo::new("isCondition", "Condition"),
                "condition",
                Method::server(move || Ok(server_state.load(Ordering::SeqCst))),
            )
            .string(conditional(), Method::server(|| Ok("Conditional".to_string())))
            .string(reversed(), Method::server(|| Ok("Reversed".to_string())))
            .string(
                ProviderInfo::new("unconditional", "Unconditional"),
                Method::server(|| Ok("unconditional".to_string())),
            )
    }
}

fn sample_table() -> Table {
    Table::builder()
        .column_one("first", Some(Icon::called("gavel")))
        .column_two("second", None)
        .column_three("third", None)
        .add_row(&[&"value", &3, &0.5])
        .build()
}

/// A table for the server and one for each player.
pub struct TableExtension;

impl DataExtension for TableExtension {
    fn declare(self: Arc<Self>) -> ExtensionDeclaration {
        ExtensionDeclaration::new(PluginInfo::new("TableExtension"))
            .call_events([CallEvents::PlayerJoin])
            .table(
                ProviderInfo::new("table", "Table"),
                Color::Amber,
                Method::server(|| Ok(sample_table())),
            )
            .table(
                ProviderInfo::new("table", "Table"),
                Color::Amber,
                Method::player(|_| Ok(sample_table())),
            )
    }
}

/// Providers that fail in different ways next to one that works.
pub struct BrokenExtension;

impl DataExtension for BrokenExtension {
    fn declare(self: Arc<Self>) -> ExtensionDeclaration {
        ExtensionDeclaration::new(PluginInfo::new("BrokenExtension"))
            .call_events([CallEvents::PlayerJoin])
            .number(ProviderInfo::new("failing", "Failing"), Method::player(|_| Err("no value".into())))
            .number(
                ProviderInfo::new("panicking", "Panicking"),
                Method::player(|_| -> ProviderResult<i64> { panic!("provider panicked") }),
            )
            .number(ProviderInfo::new("working", "Working"), Method::player(|_| Ok(1)))
    }
}
