//! The activation client: the embedding application's single entry point.
//!
//! The client is deliberately single-threaded. Every method blocks the
//! calling thread for at most the configured network timeouts, and callers
//! are expected to serialize access themselves (typically from the UI thread
//! or one worker).

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

use crate::activation::{Activation, Status};
use crate::crypto;
use crate::encoding;
use crate::error::{Error, Result};
use crate::machine;
use crate::messages::{ActivationRequest, OfflineRequest, TrialRequest};
use crate::product::ProductData;
use crate::rest::{
    RestClient, ENDPOINT_ACTIVATE, ENDPOINT_ACTIVATE_TRIAL, ENDPOINT_PING,
    ENDPOINT_UPDATE_ACTIVATIONS,
};
use crate::store::{ActivationStore, StoreOptions};

/// How `validate` balances local state against the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationStrategy {
    /// Use whatever the local store provides; never contact the server.
    LocalOnly,
    /// As `LocalOnly`, but only load the selection when it validates
    /// cleanly. Suited to a fast, silent startup check.
    LocalValidOnly,
    /// Refresh stale or nearly expired activations first, then select
    /// locally.
    Online,
    /// Refresh every matching activation, then select locally.
    ForceOnline,
}

/// Trial availability on this machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TrialStatus {
    #[default]
    Undefined,
    /// No trial exists yet, so one can still be started.
    TrialAvailable,
    TrialActive,
    /// A trial exists and has expired; this machine cannot start another.
    TrialExpired,
}

impl TrialStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Undefined => "Undefined",
            Self::TrialAvailable => "TrialAvailable",
            Self::TrialActive => "TrialActive",
            Self::TrialExpired => "TrialExpired",
        }
    }
}

impl std::fmt::Display for TrialStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives the selected activation after every `validate`.
pub trait Subscriber {
    /// Called with the currently loaded most valuable activation, or `None`
    /// when no activation is available at all.
    fn on_activations_updated(&self, current: Option<&Activation>);
}

type SubscriberList = Rc<RefCell<Vec<Weak<dyn Subscriber>>>>;

/// Deregisters its subscriber when dropped.
///
/// Returned by [`ActivationClient::subscribe`]; hold it for as long as the
/// subscriber should receive updates.
#[must_use = "dropping the subscription immediately unsubscribes"]
pub struct Subscription {
    listeners: Weak<RefCell<Vec<Weak<dyn Subscriber>>>>,
    target: Weak<dyn Subscriber>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.borrow_mut().retain(|s| !s.ptr_eq(&self.target));
        }
    }
}

/// Client-side activation manager for one product.
///
/// Construct once, call [`set_product_data`](Self::set_product_data), then
/// drive it with [`validate`](Self::validate) and the activation operations.
pub struct ActivationClient {
    rest_client: Option<RestClient>,
    product_data: Option<ProductData>,
    store: ActivationStore,
    current: Option<Activation>,
    listeners: SubscriberList,
    device_info: Option<String>,
    database_directory: Option<PathBuf>,
    machine_uid_override: Option<Vec<u8>>,
}

impl Default for ActivationClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivationClient {
    pub fn new() -> Self {
        Self {
            rest_client: None,
            product_data: None,
            store: ActivationStore::new(),
            current: None,
            listeners: Rc::new(RefCell::new(Vec::new())),
            device_info: Some(machine::default_device_info()),
            database_directory: None,
            machine_uid_override: None,
        }
    }

    /// Supplies the product configuration as base64-encoded JSON.
    ///
    /// Required before any other operation. May be called again to swap
    /// products; that rebinds the server client and reopens the store under
    /// the new organisation's directory.
    pub fn set_product_data(&mut self, encoded: &str) -> Result<()> {
        let product_data = ProductData::from_base64(encoded)?;

        self.rest_client = Some(RestClient::new(&product_data.primary_public_server_address));

        let database_file = self.database_file_for(&product_data.organisation_name)?;
        self.store.open(StoreOptions { database_file })?;

        self.product_data = Some(product_data);
        Ok(())
    }

    /// The currently set product data, if any.
    pub fn product_data(&self) -> Option<&ProductData> {
        self.product_data.as_ref()
    }

    /// Overrides the free-form device description attached to requests;
    /// `None` omits it entirely. Defaults to hostname, OS and architecture.
    pub fn set_device_info(&mut self, device_info: Option<String>) {
        self.device_info = device_info;
    }

    /// Overrides the machine UID used for every operation. The default is a
    /// hash of the platform's unique device id; hosts with their own
    /// identity scheme (and tests) can substitute an opaque byte string.
    pub fn set_machine_uid(&mut self, machine_uid: Option<Vec<u8>>) {
        self.machine_uid_override = machine_uid;
    }

    /// Overrides the parent directory for the activations database. The
    /// default is the per-user application data directory.
    pub fn set_database_directory(&mut self, directory: Option<PathBuf>) {
        self.database_directory = directory;
    }

    /// Path of the activations database currently in use.
    pub fn database_file(&self) -> Option<&Path> {
        self.store.database_file()
    }

    /// Selects, validates and publishes the current activation.
    ///
    /// Online strategies first refresh whatever the store flags as stale,
    /// applying the server's response as an upsert-and-prune diff. The most
    /// valuable local activation is then re-validated and exposed to
    /// subscribers; every registered subscriber is called exactly once with
    /// the final selection.
    pub fn validate(&mut self, strategy: ValidationStrategy) -> Result<()> {
        self.product()?;

        self.current = None;

        self.update_activations(strategy)?;

        let product_data = self.product()?;
        let machine_uid = self.machine_uid()?;

        let activations = self.store.list_for(&product_data.product_uid, &machine_uid)?;

        if let Some(best) = find_most_valuable(&activations) {
            let mut activation = best.clone();
            let status = activation.validate(
                &product_data.product_uid,
                &machine_uid,
                &product_data.verifying_key,
            );

            // LocalValidOnly keeps startup quiet: an invalid best candidate
            // stays unloaded instead of surfacing a warning state.
            if strategy != ValidationStrategy::LocalValidOnly || status == Status::Valid {
                self.current = Some(activation);
            }
        }

        self.notify_listeners();
        Ok(())
    }

    /// Activates the product with an email address and license key.
    pub fn activate(&mut self, email_address: &str, license_key: &str) -> Result<()> {
        self.product()?;

        if email_address.is_empty() {
            return Err(Error::Input("email address is empty".into()));
        }
        if license_key.is_empty() {
            return Err(Error::Input("license key is empty".into()));
        }

        let request = ActivationRequest {
            product_uid: self.product()?.product_uid.clone(),
            machine_uid: encoding::encode(self.machine_uid()?),
            email_address: email_address.to_string(),
            license_key: license_key.to_string(),
            device_info: self.device_info.clone(),
        };

        let response = self
            .rest_client()?
            .post(ENDPOINT_ACTIVATE, &request)?
            .error_for_status()?;

        let activation: Activation = serde_json::from_str(&response.body)?;
        self.install_activation(activation)
    }

    /// Starts a trial for this product with the given email address.
    pub fn start_trial(&mut self, email_address: &str) -> Result<()> {
        self.product()?;

        if email_address.is_empty() {
            return Err(Error::Input("email address is empty".into()));
        }

        let request = TrialRequest {
            product_uid: self.product()?.product_uid.clone(),
            machine_uid: encoding::encode(self.machine_uid()?),
            email_address: email_address.to_string(),
            device_info: self.device_info.clone(),
        };

        let response = self
            .rest_client()?
            .post(ENDPOINT_ACTIVATE_TRIAL, &request)?
            .error_for_status()?;

        let activation: Activation = serde_json::from_str(&response.body)?;
        self.install_activation(activation)
    }

    /// Validates and persists an activation obtained from the server or a
    /// response file, then re-runs an online validation so subscribers
    /// observe the change.
    pub fn install_activation(&mut self, mut activation: Activation) -> Result<()> {
        let product_data = self.product()?;
        let machine_uid = self.machine_uid()?;

        let status = activation.validate(
            &product_data.product_uid,
            &machine_uid,
            &product_data.verifying_key,
        );

        if status != Status::Valid {
            return Err(Error::Validation(status));
        }

        self.store.save(&activation)?;

        self.validate(ValidationStrategy::Online)
    }

    /// Builds an encrypted offline request and writes it to `file`,
    /// replacing any existing contents. The file is meant to be carried to
    /// an online machine and submitted there.
    pub fn save_activation_request(
        &self,
        email_address: &str,
        license_key: &str,
        file: &Path,
        trial: bool,
    ) -> Result<()> {
        let product_data = self.product()?;

        let seal_field = |value: &str| -> Result<String> {
            Ok(encoding::encode(crypto::seal(
                value.as_bytes(),
                &product_data.crypto_public_key,
            )?))
        };

        let device_info = match self.device_info.as_deref() {
            Some(info) => Some(seal_field(info)?),
            None => None,
        };
        let machine_uid = encoding::encode(self.machine_uid()?);

        let request = if trial {
            OfflineRequest::TrialRequest(TrialRequest {
                product_uid: product_data.product_uid.clone(),
                machine_uid,
                email_address: seal_field(email_address)?,
                device_info,
            })
        } else {
            OfflineRequest::ActivationRequest(ActivationRequest {
                product_uid: product_data.product_uid.clone(),
                machine_uid,
                email_address: seal_field(email_address)?,
                license_key: seal_field(license_key)?,
                device_info,
            })
        };

        let json = serde_json::to_string(&request)?;
        fs::write(file, json)
            .map_err(|e| Error::Input(format!("failed to save activation request: {e}")))?;
        Ok(())
    }

    /// Installs an activation from a response file.
    ///
    /// If the file turns out to be an offline *request*, the error says so
    /// instead of surfacing a bare parse failure; any other malformed
    /// content propagates the original parse error.
    pub fn install_activation_file(&mut self, file: &Path) -> Result<()> {
        let json = fs::read_to_string(file)
            .map_err(|e| Error::Input(format!("failed to load activation file: {e}")))?;

        if json.is_empty() {
            return Err(Error::Input("activation file is empty".into()));
        }

        match serde_json::from_str::<Activation>(&json) {
            Ok(activation) => self.install_activation(activation),
            Err(original_error) => {
                if serde_json::from_str::<OfflineRequest>(&json).is_ok() {
                    return Err(Error::RequestFileGiven);
                }
                Err(original_error.into())
            }
        }
    }

    /// Deletes every locally stored activation for this product and machine
    /// and returns the number removed. The server is not contacted, so the
    /// seats stay provisioned and a later re-activation costs nothing.
    pub fn destroy_all_local_activations(&mut self) -> Result<usize> {
        let product_data = self.product()?;
        let machine_uid = self.machine_uid()?;
        self.store
            .delete_all_for(&product_data.product_uid, &machine_uid)
    }

    /// Trial availability on this machine, judged from local state only.
    /// Server-side trial exhaustion surfaces when a new trial is requested.
    pub fn trial_status(&self) -> Result<TrialStatus> {
        let product_data = self.product()?;
        let machine_uid = self.machine_uid()?;

        let trials = self
            .store
            .list_trials_for(&product_data.product_uid, &machine_uid)?;

        let Some(best) = find_most_valuable(&trials) else {
            return Ok(TrialStatus::TrialAvailable);
        };

        if best.is_expired() {
            return Ok(TrialStatus::TrialExpired);
        }

        Ok(TrialStatus::TrialActive)
    }

    /// Round-trips a value through the server's debug endpoint.
    pub fn ping(&self, value: i64) -> Result<()> {
        let response = self
            .rest_client()?
            .post(ENDPOINT_PING, &serde_json::json!({ "id": value }))?
            .error_for_status()?;

        tracing::debug!(status = response.status_code, body = %response.body, "ping");
        Ok(())
    }

    /// The currently loaded activation, or `None` if none is loaded.
    pub fn current_activation(&self) -> Option<&Activation> {
        self.current.as_ref()
    }

    /// Status of the loaded activation, or `NoActivationLoaded` when none
    /// is.
    pub fn status(&self) -> Status {
        self.current
            .as_ref()
            .map_or(Status::NoActivationLoaded, |a| a.status())
    }

    /// User-facing message for the current status; see
    /// [`Activation::status_user_message`].
    pub fn status_user_message(&self, hide_details: bool) -> &'static str {
        match &self.current {
            Some(activation) => activation.status_user_message(hide_details),
            None if hide_details => "Invalid activation (2)",
            None => "No activation loaded",
        }
    }

    /// Registers a subscriber. It is called immediately with the current
    /// activation and again after every `validate`. Pair with
    /// [`remove_listener`](Self::remove_listener), or use
    /// [`subscribe`](Self::subscribe) for scope-bound registration.
    pub fn add_listener(&mut self, subscriber: &Rc<dyn Subscriber>) {
        subscriber.on_activations_updated(self.current.as_ref());
        self.listeners.borrow_mut().push(Rc::downgrade(subscriber));
    }

    /// Removes a previously registered subscriber.
    pub fn remove_listener(&mut self, subscriber: &Rc<dyn Subscriber>) {
        let target = Rc::downgrade(subscriber);
        self.listeners.borrow_mut().retain(|s| !s.ptr_eq(&target));
    }

    /// [`add_listener`](Self::add_listener) with scoped deregistration: the
    /// subscriber stays registered until the returned guard is dropped.
    pub fn subscribe(&mut self, subscriber: &Rc<dyn Subscriber>) -> Subscription {
        self.add_listener(subscriber);
        Subscription {
            listeners: Rc::downgrade(&self.listeners),
            target: Rc::downgrade(subscriber),
        }
    }

    fn notify_listeners(&self) {
        // Upgrade inside the borrow, call outside it, so a subscriber may
        // drop its own Subscription from within the callback.
        let subscribers: Vec<Rc<dyn Subscriber>> = {
            let mut listeners = self.listeners.borrow_mut();
            listeners.retain(|s| s.strong_count() > 0);
            listeners.iter().filter_map(Weak::upgrade).collect()
        };

        for subscriber in subscribers {
            subscriber.on_activations_updated(self.current.as_ref());
        }
    }

    fn update_activations(&mut self, strategy: ValidationStrategy) -> Result<()> {
        if matches!(
            strategy,
            ValidationStrategy::LocalOnly | ValidationStrategy::LocalValidOnly
        ) {
            return Ok(());
        }

        let product_uid = self.product()?.product_uid.clone();
        let machine_uid = self.machine_uid()?;

        let candidates = self.store.list_needing_update(
            &product_uid,
            &machine_uid,
            strategy == ValidationStrategy::ForceOnline,
        )?;

        if candidates.is_empty() {
            return Ok(());
        }

        tracing::debug!(candidates = candidates.len(), "refreshing activations");

        let response = self
            .rest_client()?
            .post(ENDPOINT_UPDATE_ACTIVATIONS, &candidates)?
            .error_for_status()?;

        let refreshed: Vec<Activation> = serde_json::from_str(&response.body)?;

        self.store.apply_refresh(&refreshed, &candidates)?;
        Ok(())
    }

    fn machine_uid(&self) -> Result<Vec<u8>> {
        match &self.machine_uid_override {
            Some(machine_uid) => Ok(machine_uid.clone()),
            None => machine::machine_uid(),
        }
    }

    fn database_file_for(&self, organisation_name: &str) -> Result<PathBuf> {
        let parent = match &self.database_directory {
            Some(directory) => directory.clone(),
            None => directories::BaseDirs::new()
                .ok_or_else(|| Error::Config("no home directory for the current user".into()))?
                .data_dir()
                .to_path_buf(),
        };
        Ok(parent.join(organisation_name).join("activations.db"))
    }

    fn product(&self) -> Result<&ProductData> {
        self.product_data.as_ref().ok_or(Error::ProductDataNotSet)
    }

    fn rest_client(&self) -> Result<&RestClient> {
        self.rest_client.as_ref().ok_or(Error::ProductDataNotSet)
    }
}

/// First more-valuable scan; on full ties the earliest entry wins.
fn find_most_valuable(activations: &[Activation]) -> Option<&Activation> {
    let (first, rest) = activations.split_first()?;
    let mut best = first;
    for activation in rest {
        if activation.is_more_valuable_than(best) {
            best = activation;
        }
    }
    Some(best)
}
