//! Translation of [`MongoConfig`] into driver client options.

use std::str::FromStr;
use std::time::Duration;

use bson::{Bson, Document};
use mongodb::options::{
    AuthMechanism, ClientOptions, Credential, ReadPreference, ReadPreferenceOptions,
    SelectionCriteria, ServerAddress,
};
use tracing::debug;

use crate::config::{AuthConfig, MongoConfig, ReadMode, ReadPreferenceConfig};
use crate::error::{MongoError, MongoResult};

/// Build driver client options from configuration.
///
/// No I/O happens here and value combinations are not validated; the driver
/// reports those when the client is created. Only host strings and the
/// mechanism name are parsed, since the driver types them.
pub fn client_options(config: &MongoConfig) -> MongoResult<ClientOptions> {
    let mut options = ClientOptions::default();

    options.hosts = config
        .hosts
        .iter()
        .map(|host| {
            ServerAddress::parse(host)
                .map_err(|e| MongoError::config(format!("invalid host '{}': {}", host, e)))
        })
        .collect::<MongoResult<Vec<_>>>()?;

    if !config.replica_set.is_empty() {
        options.repl_set_name = Some(config.replica_set.clone());
    }

    options.selection_criteria = read_preference(&config.read_preference)
        .map(SelectionCriteria::ReadPreference);

    if config.auth.is_configured() {
        // Any credential, even an empty one, makes the driver authenticate.
        options.credential = Some(credential(&config.auth)?);
    }

    options.connect_timeout = Some(Duration::from_secs(config.connect_timeout));
    // Zero leaves these to the driver: no idle limit and its default pool
    // size. It rejects maxPoolSize=0.
    if config.max_conn_idle_time > 0 {
        options.max_idle_time = Some(Duration::from_secs(config.max_conn_idle_time));
    }
    if config.max_pool_size > 0 {
        options.max_pool_size = Some(config.max_pool_size);
    }
    options.min_pool_size = Some(config.min_pool_size);

    if config.server_selection_timeout > 0 {
        options.server_selection_timeout =
            Some(Duration::from_secs(config.server_selection_timeout));
    }

    if !config.app_name.is_empty() {
        options.app_name = Some(config.app_name.clone());
    }

    debug!(
        hosts = ?config.hosts,
        replica_set = %config.replica_set,
        read_mode = config.read_preference.mode,
        auth = options.credential.is_some(),
        max_pool_size = config.max_pool_size,
        min_pool_size = config.min_pool_size,
        "translated MongoDB client options"
    );

    Ok(options)
}

/// Build the read preference for the configured mode.
///
/// Primary, unset and unknown modes yield `None` so the driver default
/// (primary, no modifiers) applies. Staleness and tags are dropped in
/// that case.
pub fn read_preference(config: &ReadPreferenceConfig) -> Option<ReadPreference> {
    let mut modifiers = ReadPreferenceOptions::default();
    if config.max_staleness > 0 {
        modifiers.max_staleness = Some(Duration::from_secs(config.max_staleness));
    }
    if !config.tags.is_empty() {
        modifiers.tag_sets = Some(vec![config.tags.clone()]);
    }

    let preference = match config.read_mode() {
        Some(ReadMode::PrimaryPreferred) => ReadPreference::PrimaryPreferred { options: modifiers },
        Some(ReadMode::Secondary) => ReadPreference::Secondary { options: modifiers },
        Some(ReadMode::SecondaryPreferred) => {
            ReadPreference::SecondaryPreferred { options: modifiers }
        }
        Some(ReadMode::Nearest) => ReadPreference::Nearest { options: modifiers },
        Some(ReadMode::Primary) | None => {
            if config.max_staleness > 0 || !config.tags.is_empty() {
                debug!(
                    mode = config.mode,
                    "read preference modifiers ignored for primary/unset mode"
                );
            }
            return None;
        }
    };

    Some(preference)
}

fn credential(auth: &AuthConfig) -> MongoResult<Credential> {
    let mut credential = Credential::default();

    if !auth.mechanism.is_empty() {
        let mechanism = AuthMechanism::from_str(&auth.mechanism).map_err(|e| {
            MongoError::config(format!("invalid auth mechanism '{}': {}", auth.mechanism, e))
        })?;
        credential.mechanism = Some(mechanism);
    }

    if !auth.mechanism_properties.is_empty() {
        let properties: Document = auth
            .mechanism_properties
            .iter()
            .map(|(key, value)| (key.clone(), Bson::String(value.clone())))
            .collect();
        credential.mechanism_properties = Some(properties);
    }

    if !auth.source.is_empty() {
        credential.source = Some(auth.source.clone());
    }

    if !auth.username.is_empty() {
        credential.username = Some(auth.username.clone());
    }

    if auth.password_set || !auth.password.is_empty() {
        credential.password = Some(auth.password.clone());
    }

    Ok(credential)
}
