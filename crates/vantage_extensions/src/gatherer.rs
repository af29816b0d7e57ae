//! # Gatherer
//!
//! Calls the providers of one extension for one subject and stores what they
//! return.
//!
//! Booleans run first, repeatedly, until no new condition gets published. Every
//! other provider then runs only when its condition is satisfied. Values of all
//! providers that succeeded are written in one transaction, which also removes
//! the subject's results whose condition is no longer satisfied.
//!
//! A provider that returns an error or panics is disabled for the lifetime of the
//! descriptor and the pass carries on with the rest.

use crate::descriptor::{ExtensionDescriptor, Provider};
use crate::error::{ProviderCallError, StoreError};
use crate::error_logger::{ErrorContext, ErrorLevel, ErrorLogger};
use crate::store::transactions::{
    DisableProviderTransaction, RemoveInvalidResultsTransaction, StoreExtensionInformationTransaction,
    StoreResultsTransaction,
};
use crate::store::values::GatheredValue;
use crate::store::{Database, Subject};
use std::any::Any;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, trace};
use vantage_extension_api::{CallEvents, Player, ProviderValue, ServerUuid, ValueKind};

pub struct ProviderValueGatherer {
    descriptor: Arc<ExtensionDescriptor>,
    database: Arc<Database>,
    server: ServerUuid,
    error_logger: Arc<ErrorLogger>,
}

impl ProviderValueGatherer {
    pub fn new(
        descriptor: Arc<ExtensionDescriptor>,
        database: Arc<Database>,
        server: ServerUuid,
        error_logger: Arc<ErrorLogger>,
    ) -> Self {
        Self {
            descriptor,
            database,
            server,
            error_logger,
        }
    }

    pub fn descriptor(&self) -> &Arc<ExtensionDescriptor> {
        &self.descriptor
    }

    pub fn plugin_name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn should_skip_event(&self, event: CallEvents) -> bool {
        self.descriptor.should_skip_event(event)
    }

    /// Stores the catalog entry and drops values of invalidated providers.
    pub fn store_extension_info(&self) -> Result<(), StoreError> {
        self.database
            .execute_transaction(&StoreExtensionInformationTransaction::new(self.server, &self.descriptor))?;
        if !self.descriptor.invalidated().is_empty() {
            self.database.execute_transaction(&RemoveInvalidResultsTransaction::new(
                self.server,
                self.plugin_name(),
                self.descriptor.invalidated().to_vec(),
            ))?;
        }
        Ok(())
    }

    pub fn update_server_values(&self, event: CallEvents) -> Result<(), StoreError> {
        self.gather(Subject::Server(self.server), None, event)
    }

    pub fn update_player_values(&self, player: &Player, event: CallEvents) -> Result<(), StoreError> {
        self.gather(Subject::Player(player.uuid), Some(player), event)
    }

    fn gather(&self, subject: Subject, player: Option<&Player>, event: CallEvents) -> Result<(), StoreError> {
        let providers = self.descriptor.providers(subject.scope());
        let mut called = vec![false; providers.len()];
        let mut satisfied: HashSet<String> = HashSet::new();
        let mut results = Vec::new();

        loop {
            let mut progressed = false;
            for (index, provider) in providers.iter().enumerate() {
                if called[index] || provider.kind() != ValueKind::Boolean || !is_callable(provider, &satisfied) {
                    continue;
                }
                called[index] = true;
                progressed = true;
                if let Some(value) = self.call(provider, subject, player, event) {
                    if let (GatheredValue::Boolean(value), Some(name)) =
                        (&value, provider.value().provided_condition())
                    {
                        satisfied.insert(if *value { name.to_string() } else { format!("not_{name}") });
                    }
                    results.push((provider.name().to_string(), value));
                }
            }
            if !progressed {
                break;
            }
        }

        for (index, provider) in providers.iter().enumerate() {
            if called[index] || provider.kind() == ValueKind::Boolean || !is_callable(provider, &satisfied) {
                continue;
            }
            if let Some(value) = self.call(provider, subject, player, event) {
                results.push((provider.name().to_string(), value));
            }
        }

        trace!(plugin = %self.plugin_name(), %subject, values = results.len(), "Gathered values");
        self.database.execute_transaction(&StoreResultsTransaction::new(
            self.server,
            self.plugin_name(),
            subject,
            results,
        ))
    }

    fn call(
        &self,
        provider: &Provider,
        subject: Subject,
        player: Option<&Player>,
        event: CallEvents,
    ) -> Option<GatheredValue> {
        match invoke(provider.value(), player) {
            Ok(value) => Some(value),
            Err(cause) => {
                self.disable(provider, subject, event, cause);
                None
            }
        }
    }

    fn disable(&self, provider: &Provider, subject: Subject, event: CallEvents, cause: String) {
        if !provider.disable() {
            return;
        }
        let error = ProviderCallError {
            plugin: self.plugin_name().to_string(),
            provider: provider.name().to_string(),
            event,
            cause,
        };
        self.error_logger.log(
            ErrorLevel::Warn,
            &error,
            ErrorContext::new()
                .related(self.plugin_name())
                .related(provider.name())
                .related(subject)
                .related(event)
                .what_to_do(format!(
                    "Report this to the developer of {}. The provider stays disabled until the extension registers again.",
                    self.plugin_name()
                )),
        );

        let disable = DisableProviderTransaction::new(self.server, self.plugin_name(), provider.scope(), provider.name());
        if let Err(e) = self.database.execute_transaction(&disable) {
            self.error_logger.log(
                ErrorLevel::Error,
                &e,
                ErrorContext::new()
                    .related(self.plugin_name())
                    .related(provider.name())
                    .what_to_do("Check that the database is writable."),
            );
        }
        debug!(plugin = %self.plugin_name(), provider = %provider.name(), "Disabled provider");
    }
}

fn is_callable(provider: &Provider, satisfied: &HashSet<String>) -> bool {
    provider.is_enabled()
        && provider
            .info()
            .condition
            .as_ref()
            .map_or(true, |condition| satisfied.contains(&condition.satisfied_by()))
}

/// Runs the provider method, turning errors and panics into a message.
fn invoke(value: &ProviderValue, player: Option<&Player>) -> Result<GatheredValue, String> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| match value {
        ProviderValue::Boolean { method, .. } => method.invoke(player).map(GatheredValue::Boolean),
        ProviderValue::Number { method, .. } => method.invoke(player).map(GatheredValue::Number),
        ProviderValue::Double(method) => method.invoke(player).map(GatheredValue::Double),
        ProviderValue::Percentage(method) => method.invoke(player).map(GatheredValue::Percentage),
        ProviderValue::String { method, .. } => method.invoke(player).map(GatheredValue::String),
        ProviderValue::Table { method, .. } => method.invoke(player).map(GatheredValue::Table),
        ProviderValue::Group(method) => method.invoke(player).map(GatheredValue::Group),
    }));
    match outcome {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(payload) => Err(panic_message(payload)),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}
