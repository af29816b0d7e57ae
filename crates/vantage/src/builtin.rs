//! Extension shipped with the binary, reporting on the process itself.

use std::sync::Arc;
use std::time::Instant;
use vantage_extension_api::*;

pub const PLUGIN_NAME: &str = "Vantage";

/// Uptime and start time of this process, plus each player's name.
pub struct ServerStatusExtension {
    server_name: String,
    started: Instant,
    started_at_millis: i64,
}

impl ServerStatusExtension {
    pub fn new(server_name: impl Into<String>) -> Self {
        Self {
            server_name: server_name.into(),
            started: Instant::now(),
            started_at_millis: current_timestamp_millis(),
        }
    }
}

impl DataExtension for ServerStatusExtension {
    fn declare(self: Arc<Self>) -> ExtensionDeclaration {
        let uptime_source = Arc::clone(&self);
        let name_source = Arc::clone(&self);
        let started_at = self.started_at_millis;

        ExtensionDeclaration::new(PluginInfo::new(PLUGIN_NAME).icon(Icon::called("chart-line").of(Color::Teal)))
            .tab(TabInfo::new("Process").icon(Icon::called("server")))
            .call_events([
                CallEvents::ServerExtensionRegister,
                CallEvents::ServerPeriodical,
                CallEvents::PlayerJoin,
            ])
            .string(
                ProviderInfo::new("serverName", "Server")
                    .icon(Icon::called("signature"))
                    .priority(100)
                    .tab("Process"),
                Method::server(move || Ok(name_source.server_name.clone())),
            )
            .formatted_number(
                ProviderInfo::new("uptime", "Uptime")
                    .description("Time since the process started")
                    .icon(Icon::called("clock").family(Family::Regular))
                    .priority(90)
                    .tab("Process"),
                FormatType::TimeMilliseconds,
                Method::server(move || Ok(uptime_source.started.elapsed().as_millis() as i64)),
            )
            .formatted_number(
                ProviderInfo::new("started", "Started")
                    .icon(Icon::called("play"))
                    .priority(80)
                    .tab("Process"),
                FormatType::DateSecond,
                Method::server(move || Ok(started_at)),
            )
            .player_name(
                ProviderInfo::new("playerName", "Name")
                    .icon(Icon::called("user"))
                    .show_in_players_table(),
                Method::player(|player| Ok(player.name.clone())),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declaration() {
        let declaration = Arc::new(ServerStatusExtension::new("Lobby")).declare();

        assert_eq!(declaration.plugin.name, PLUGIN_NAME);
        assert_eq!(declaration.tabs.len(), 1);
        assert_eq!(declaration.providers.len(), 4);
        assert!(declaration.call_events.contains(&CallEvents::ServerPeriodical));

        let names: Vec<&str> = declaration
            .providers
            .iter()
            .map(|provider| provider.info.name.as_str())
            .collect();
        assert_eq!(names, vec!["serverName", "uptime", "started", "playerName"]);
    }

    #[test]
    fn test_providers_report_process_state() {
        let declaration = Arc::new(ServerStatusExtension::new("Lobby")).declare();
        let player = Player::new(PlayerUuid::new(), "Alice");

        for provider in &declaration.providers {
            match (&provider.info.name[..], &provider.value) {
                ("serverName", ProviderValue::String { method, .. }) => {
                    assert_eq!(method.invoke(None).unwrap(), "Lobby");
                }
                ("uptime", ProviderValue::Number { method, format }) => {
                    assert_eq!(*format, FormatType::TimeMilliseconds);
                    assert!(method.invoke(None).unwrap() >= 0);
                }
                ("started", ProviderValue::Number { method, .. }) => {
                    assert!(method.invoke(None).unwrap() > 0);
                }
                ("playerName", ProviderValue::String { method, player_name }) => {
                    assert!(*player_name);
                    assert_eq!(method.invoke(Some(&player)).unwrap(), "Alice");
                }
                (name, _) => panic!("unexpected provider {name}"),
            }
        }
    }
}
