mod common;

use common::*;
use std::sync::Arc;
use vantage_extension_api::*;
use vantage_extensions::store::data::ExtensionTabData;
use vantage_extensions::store::queries::{
    ExtensionInformationQuery, ExtensionPlayerDataQuery, ExtensionServerDataQuery,
};
use vantage_extensions::store::transactions::{CleanupScope, RemoveUnsatisfiedConditionalResultsTransaction};
use vantage_extensions::{extract_descriptor, ExtensionService, StoreError, Transaction};

/// Flips every stored condition without storing what depends on it.
struct FlipStoredConditions;

impl Transaction for FlipStoredConditions {
    fn execute(&self, tx: &rusqlite::Transaction<'_>) -> Result<(), StoreError> {
        tx.execute(
            "UPDATE extension_values SET boolean_value = 1 - boolean_value WHERE boolean_value IS NOT NULL",
            [],
        )?;
        Ok(())
    }
}

fn player_tab(service: &ExtensionService, player: &Player) -> ExtensionTabData {
    let data = service
        .database()
        .query(&ExtensionPlayerDataQuery { player: player.uuid })
        .unwrap();
    data[&service.server_uuid()][0].tabs()[0].clone()
}

fn server_tab(service: &ExtensionService) -> ExtensionTabData {
    let data = service
        .database()
        .query(&ExtensionServerDataQuery {
            server: service.server_uuid(),
        })
        .unwrap();
    data[0].tabs()[0].clone()
}

fn stored_values(service: &ExtensionService) -> usize {
    service
        .database()
        .query(&ExtensionInformationQuery {
            server: service.server_uuid(),
        })
        .unwrap()[0]
        .stored_values
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_player_conditional_values_follow_condition() {
    let service = service();
    let extension = ConditionalExtension::new(true);
    service.register(Arc::clone(&extension) as Arc<dyn DataExtension>).unwrap();
    let player = alice();

    service.update_player_values(&player, CallEvents::Manual);
    let tab = player_tab(&service, &player);
    assert_eq!(tab.string("conditionalValue").unwrap().value, "Conditional");
    assert_eq!(tab.string("conditionalGroups").unwrap().value, "Group");
    assert!(tab.string("reversedConditionalValue").is_none());
    assert_eq!(tab.string("unconditional").unwrap().value, "unconditional");
    assert!(tab.boolean("isCondition").unwrap().value);

    extension.set(false);
    service.update_player_values(&player, CallEvents::Manual);
    let tab = player_tab(&service, &player);
    assert!(tab.string("conditionalValue").is_none());
    assert!(tab.string("conditionalGroups").is_none());
    assert_eq!(tab.string("reversedConditionalValue").unwrap().value, "Reversed");
    assert_eq!(tab.string("unconditional").unwrap().value, "unconditional");

    extension.set(true);
    service.update_player_values(&player, CallEvents::Manual);
    let tab = player_tab(&service, &player);
    assert_eq!(tab.string("conditionalValue").unwrap().value, "Conditional");
    assert!(tab.string("reversedConditionalValue").is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_server_conditional_values_follow_condition() {
    let service = service();
    let extension = ConditionalExtension::new(false);
    service.register(Arc::clone(&extension) as Arc<dyn DataExtension>).unwrap();

    service.update_server_values(CallEvents::ServerPeriodical);
    let tab = server_tab(&service);
    assert!(tab.string("conditionalValue").is_none());
    assert_eq!(tab.string("reversedConditionalValue").unwrap().value, "Reversed");

    extension.set(true);
    service.update_server_values(CallEvents::ServerPeriodical);
    let tab = server_tab(&service);
    assert_eq!(tab.string("conditionalValue").unwrap().value, "Conditional");
    assert!(tab.string("reversedConditionalValue").is_none());
    assert_eq!(tab.string("unconditional").unwrap().value, "unconditional");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_global_cleanup_is_idempotent() {
    let service = service();
    let extension = ConditionalExtension::new(true);
    service.register(Arc::clone(&extension) as Arc<dyn DataExtension>).unwrap();
    let player = alice();

    service.update_player_values(&player, CallEvents::Manual);
    service.update_server_values(CallEvents::Manual);
    let before = stored_values(&service);

    service.remove_unsatisfied_conditionals().unwrap();
    assert_eq!(stored_values(&service), before);
    service.remove_unsatisfied_conditionals().unwrap();
    assert_eq!(stored_values(&service), before);
    assert_eq!(
        player_tab(&service, &player).string("conditionalValue").unwrap().value,
        "Conditional"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_one_players_condition_does_not_affect_another() {
    struct PerPlayer;

    impl DataExtension for PerPlayer {
        fn declare(self: Arc<Self>) -> ExtensionDeclaration {
            ExtensionDeclaration::new(PluginInfo::new("PerPlayer"))
                .call_events([CallEvents::PlayerJoin])
                .condition(
                    ProviderInfo::new("isAdmin", "Admin"),
                    "admin",
                    Method::player(|player| Ok(player.name == "Alice")),
                )
                .string(
                    ProviderInfo::new("secret", "Secret").conditional(Conditional::new("admin")),
                    Method::player(|_| Ok("hidden".to_string())),
                )
        }
    }

    let service = service();
    service.register(Arc::new(PerPlayer)).unwrap();
    let alice = alice();
    let bob = Player::new(PlayerUuid::new(), "Bob");

    service.update_player_values(&alice, CallEvents::Manual);
    service.update_player_values(&bob, CallEvents::Manual);
    service.remove_unsatisfied_conditionals().unwrap();

    assert_eq!(player_tab(&service, &alice).string("secret").unwrap().value, "hidden");
    let bob_tab = player_tab(&service, &bob);
    assert!(!bob_tab.boolean("isAdmin").unwrap().value);
    assert!(bob_tab.string("secret").is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_scoped_cleanup_is_idempotent() {
    let service = service();
    let extension = ConditionalExtension::new(true);
    service.register(Arc::clone(&extension) as Arc<dyn DataExtension>).unwrap();
    let player = alice();
    service.update_player_values(&player, CallEvents::Manual);
    service.update_server_values(CallEvents::Manual);
    service.database().execute_transaction(&FlipStoredConditions).unwrap();
    let before = stored_values(&service);

    let cleanup = RemoveUnsatisfiedConditionalResultsTransaction::new(CleanupScope::Scope(Scope::Player));
    service.database().execute_transaction(&cleanup).unwrap();
    assert_eq!(stored_values(&service), before - 1);
    service.database().execute_transaction(&cleanup).unwrap();
    assert_eq!(stored_values(&service), before - 1);

    let tab = player_tab(&service, &player);
    assert!(tab.string("conditionalValue").is_none());
    assert!(tab.string("conditionalGroups").is_none());
    assert_eq!(tab.string("unconditional").unwrap().value, "unconditional");
    // Server results are outside the cleaned scope.
    assert_eq!(server_tab(&service).string("conditionalValue").unwrap().value, "Conditional");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unknown_condition_only_skips_its_provider() {
    struct UnknownCondition;

    impl DataExtension for UnknownCondition {
        fn declare(self: Arc<Self>) -> ExtensionDeclaration {
            ExtensionDeclaration::new(PluginInfo::new("UnknownCondition"))
                .call_events([CallEvents::PlayerJoin])
                .string(
                    ProviderInfo::new("orphan", "Orphan").conditional(Conditional::new("nobodyPublishesThis")),
                    Method::player(|_| Ok("never".to_string())),
                )
                .string(
                    ProviderInfo::new("plain", "Plain"),
                    Method::player(|_| Ok("plain".to_string())),
                )
        }
    }

    let extension: Arc<dyn DataExtension> = Arc::new(UnknownCondition);
    let (_, warnings) = extract_descriptor(&extension).unwrap();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].provider.as_deref(), Some("orphan"));
    assert!(warnings[0].message.contains("nobodyPublishesThis"));

    let service = service();
    assert!(service.register(extension).unwrap().is_some());
    assert!(service.is_registered("UnknownCondition"));

    let player = alice();
    service.update_player_values(&player, CallEvents::Manual);
    let tab = player_tab(&service, &player);
    assert_eq!(tab.string("plain").unwrap().value, "plain");
    assert!(tab.string("orphan").is_none());
    assert_eq!(service.error_logger().count(), 0);
}
