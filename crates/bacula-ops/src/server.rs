//! Reconcile for the backup server: director, storage daemon, local file
//! daemon and web front end on one host.

use secrecy::SecretString;
use serde::Serialize;
use serde_json::json;
use tracing::Instrument;
use url::Url;

use crate::config::Settings;
use crate::error::{ReconcileError, Result, ServiceError};
use crate::relation::{ClientAggregator, POSTGRESQL_ENDPOINT, S3_ENDPOINT};
use crate::secrets::{generate_password, SecretContent, SecretDistributor, SecretStore};
use crate::service::{DbConfig, ServiceRegistry, UserRealm};
use crate::state::{unit_number, Relation, UnitState};
use crate::status::UnitStatus;

/// Ports opened once the server is configured: director, storage daemon,
/// web front end and its API.
pub const SERVER_PORTS: [u16; 4] = [9101, 9103, 9095, 9096];

/// User the reconcile maintains in the web front end.
pub const BACULUM_USERNAME: &str = "charm-admin";

const CREDENTIALS_KEY: &str = "passwords";
const CREDENTIALS_LABEL: &str = "bacula-credentials";
const CREDENTIAL_FIELDS: [&str; 4] = ["dir-password", "fd-password", "sd-password", "api-password"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BaculaConfig {
    pub dir_address: String,
    pub sd_address: String,
    pub dir_password: String,
    pub sd_password: String,
    pub fd_password: String,
    pub file_retention: String,
    pub job_retention: String,
    pub volume_retention: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct S3Config {
    pub address: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub protocol: String,
    pub uri_style: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BaculumApiConfig {
    pub username: String,
    pub password: String,
    pub protocol: String,
    pub address: String,
    pub port: u16,
}

impl BaculumApiConfig {
    fn local(password: String) -> Self {
        Self {
            username: BACULUM_USERNAME.to_string(),
            password,
            protocol: "http".to_string(),
            address: "localhost".to_string(),
            port: 9096,
        }
    }
}

/// Brings the server in line with its inputs.
pub async fn reconcile(
    state: &mut UnitState,
    settings: &Settings,
    store: &mut dyn SecretStore,
    registry: &ServiceRegistry,
) -> Result<()> {
    let span = tracing::info_span!("reconcile", role = "server", unit = %state.unit.unit_name);
    reconcile_server(state, settings, store, registry)
        .instrument(span)
        .await
}

async fn reconcile_server(
    state: &mut UnitState,
    settings: &Settings,
    store: &mut dyn SecretStore,
    registry: &ServiceRegistry,
) -> Result<()> {
    let credentials = ensure_credentials(state, store)?;
    let address = unit_address(state)?;
    let bacula = BaculaConfig {
        dir_address: address.clone(),
        sd_address: address,
        dir_password: credentials.require("dir-password")?.to_string(),
        sd_password: credentials.require("sd-password")?.to_string(),
        fd_password: credentials.require("fd-password")?.to_string(),
        file_retention: settings.server.file_retention.clone(),
        job_retention: settings.server.job_retention.clone(),
        volume_retention: settings.server.volume_retention.clone(),
    };
    let baculum_api = BaculumApiConfig::local(credentials.require("api-password")?.to_string());
    let db = db_config(state)?;
    let s3 = s3_config(state)?;

    if !is_singleton(state) {
        return Err(ReconcileError::unrecoverable(
            "bacula-server does not support multiple units",
        ));
    }

    if !registry.is_installed() {
        maintenance(state, "installing charmed-bacula-server");
        registry.install()?;
    }
    if !registry.is_initialized(&db).await? {
        maintenance(state, "initializing bacula database");
        registry.initialize(&db).await?;
    }
    maintenance(state, "sync bacula config");

    let aggregator = ClientAggregator::new(settings.paths.noop_script.clone());
    aggregator.send_to_clients(state, store)?;
    let clients = aggregator.receive_from_clients(state, store)?;

    let variables = json!({
        "name": state.unit.app_name,
        "bacula": bacula,
        "db": db,
        "s3": s3,
        "baculum_api": baculum_api,
        "relation_fd_list": aggregator.template_list(&clients),
    });
    registry.apply(&variables).map_err(|e| match e {
        ServiceError::InvalidConfig { .. } => {
            ReconcileError::unrecoverable("failed to apply bacula configuration")
        }
        other => other.into(),
    })?;

    state.set_ports(&SERVER_PORTS);

    let password = SecretString::from(baculum_api.password.clone());
    registry.set_user(UserRealm::Api, &baculum_api.username, &password)?;
    registry.set_user(UserRealm::Web, &baculum_api.username, &password)?;
    Ok(())
}

fn maintenance(state: &mut UnitState, message: &str) {
    log::info!("{}", message);
    state.set_status(UnitStatus::Maintenance(message.to_string()));
}

fn ensure_credentials(state: &mut UnitState, store: &mut dyn SecretStore) -> Result<SecretContent> {
    let leader = state.unit.leader;
    let peer = state
        .peer_relation_mut()
        .ok_or_else(|| ReconcileError::not_ready("waiting for peer relation"))?;

    SecretDistributor::new(store)
        .ensure_bundle(
            &mut peer.local_app_data,
            CREDENTIALS_KEY,
            CREDENTIALS_LABEL,
            &CREDENTIAL_FIELDS,
            leader,
        )?
        .ok_or_else(|| ReconcileError::not_ready("waiting for peer relation data"))
}

fn unit_address(state: &UnitState) -> Result<String> {
    let peer = state
        .peer_relation()
        .ok_or_else(|| ReconcileError::not_ready("waiting for peer relation"))?;
    peer.local_unit_data
        .get("ingress-address")
        .cloned()
        .ok_or_else(|| ReconcileError::not_ready("waiting for unit address"))
}

/// Relation data keys only; values may be credentials.
fn dump_keys(relation: &Relation) -> String {
    let keys: Vec<&str> = relation.remote_app_data.keys().map(String::as_str).collect();
    format!("app data keys {:?}, {} unit(s)", keys, relation.remote_units.len())
}

fn db_config(state: &UnitState) -> Result<DbConfig> {
    let relation = state
        .relation(POSTGRESQL_ENDPOINT)
        .ok_or_else(|| ReconcileError::not_ready("waiting for postgresql relation"))?;
    let data = &relation.remote_app_data;
    let Some(name) = data.get("database") else {
        return Err(ReconcileError::not_ready("waiting for postgresql relation data"));
    };

    let invalid = || {
        log::error!("invalid postgresql integration: {}", dump_keys(relation));
        ReconcileError::unrecoverable("invalid postgresql relation")
    };

    let endpoint = data
        .get("endpoints")
        .and_then(|e| e.split(',').next())
        .map(str::trim)
        .ok_or_else(invalid)?;
    let (host, port) = endpoint.rsplit_once(':').ok_or_else(invalid)?;
    let port: u16 = port.parse().map_err(|_| invalid())?;
    let username = data.get("username").ok_or_else(invalid)?;
    let password = data.get("password").ok_or_else(invalid)?;

    Ok(DbConfig {
        host: host.to_string(),
        port,
        name: name.clone(),
        username: username.clone(),
        password: password.clone(),
    })
}

/// Parses the object store endpoint. Endpoints without a scheme are taken
/// as HTTPS.
fn parse_endpoint(endpoint: &str) -> std::result::Result<Url, url::ParseError> {
    if endpoint.contains("://") {
        Url::parse(endpoint)
    } else {
        Url::parse(&format!("https://{}", endpoint))
    }
}

/// `host[:port]` of a parsed endpoint.
fn endpoint_address(url: &Url) -> Option<String> {
    let host = url.host_str().filter(|h| !h.is_empty())?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

fn s3_config(state: &UnitState) -> Result<S3Config> {
    let relation = state
        .relation(S3_ENDPOINT)
        .ok_or_else(|| ReconcileError::not_ready("waiting for s3 relation"))?;
    let data = &relation.remote_app_data;
    let (Some(access_key), Some(secret_key), Some(endpoint), Some(bucket)) = (
        data.get("access-key"),
        data.get("secret-key"),
        data.get("endpoint"),
        data.get("bucket"),
    ) else {
        return Err(ReconcileError::not_ready("waiting for s3 integration"));
    };

    let invalid = || {
        log::error!("invalid s3 endpoint {:?}: {}", endpoint, dump_keys(relation));
        ReconcileError::unrecoverable("invalid s3 relation")
    };
    let url = parse_endpoint(endpoint).map_err(|_| invalid())?;
    let address = endpoint_address(&url).ok_or_else(invalid)?;
    Ok(S3Config {
        address,
        bucket: bucket.clone(),
        access_key: access_key.clone(),
        secret_key: secret_key.clone(),
        protocol: if url.scheme() == "http" { "HTTP" } else { "HTTPS" }.to_string(),
        uri_style: if data.get("s3-uri-style").map(String::as_str) == Some("path") {
            "Path"
        } else {
            "VirtualHost"
        }
        .to_string(),
    })
}

/// True when this unit is alone or has the lowest unit number among its
/// peers.
fn is_singleton(state: &UnitState) -> bool {
    let Some(peer) = state.peer_relation() else {
        return false;
    };
    let Some(own) = unit_number(&state.unit.unit_name) else {
        return peer.remote_units.is_empty();
    };
    peer.remote_units
        .keys()
        .filter_map(|name| unit_number(name))
        .all(|other| own < other)
}

/// Registers `username` with a fresh password in the given realm and
/// returns the password.
pub fn create_user(
    registry: &ServiceRegistry,
    realm: UserRealm,
    username: &str,
) -> Result<SecretString> {
    let password = SecretString::from(generate_password(16)?);
    registry.set_user(realm, username, &password)?;
    log::info!("Created {:?} user {}", realm, username);
    Ok(password)
}
