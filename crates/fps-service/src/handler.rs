//! Long-lived First-Party Sets service object.
//!
//! One handler is built at startup and cloned into every consumer. Inputs are
//! fed through [`FirstPartySetsHandler::init`] (or the individual setters), and
//! the finalized public sets become visible exactly once. Queries made before
//! that point are queued and answered in registration order.

use std::collections::{BTreeSet, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use fps_core::{
    compute_enterprise_customizations, compute_sets_diff, find_owner, init_psl, GlobalSets, ParsedPolicySetLists,
    PolicyCustomization, PslRules, SetEntry, Site,
};
use fps_parser::{
    deserialize_first_party_sets, parse_sets_from_enterprise_policy, serialize_first_party_sets, PolicyParsingError,
};
use serde_json::Value;
use tokio::sync::oneshot;

use crate::config::HandlerConfig;
use crate::loader::{parse_component_sets, SetsLoader};
use crate::persistence::{SetsPersistence, SitesToClearStore};

/// Receives the finalized public sets.
pub type SetsCallback = Box<dyn FnOnce(GlobalSets) + Send>;

/// Receives a computed policy customization.
pub type CustomizationCallback = Box<dyn FnOnce(PolicyCustomization) + Send>;

struct HandlerState {
    loader: SetsLoader,
    loaded_rx: oneshot::Receiver<GlobalSets>,
    sets: Option<GlobalSets>,
    on_sets_ready: VecDeque<SetsCallback>,
    /// Raw persisted snapshot from the previous run.
    previous_sets: Vec<u8>,
}

impl HandlerState {
    fn new() -> Self {
        let (loaded_tx, loaded_rx) = oneshot::channel();
        let loader = SetsLoader::new(Box::new(move |sets| {
            let _ = loaded_tx.send(sets);
        }));
        Self {
            loader,
            loaded_rx,
            sets: None,
            on_sets_ready: VecDeque::new(),
            previous_sets: Vec::new(),
        }
    }
}

#[derive(Clone)]
pub struct FirstPartySetsHandler {
    config: Arc<HandlerConfig>,
    state: Arc<Mutex<HandlerState>>,
    persistence: Arc<dyn SetsPersistence>,
    store: Arc<dyn SitesToClearStore>,
}

impl FirstPartySetsHandler {
    pub fn new(
        config: HandlerConfig,
        persistence: Arc<dyn SetsPersistence>,
        store: Arc<dyn SitesToClearStore>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            state: Arc::new(Mutex::new(HandlerState::new())),
            persistence,
            store,
        }
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, HandlerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Startup
    // =========================================================================

    /// Feed every configured input: PSL, persisted snapshot, manual set and
    /// the component sets file.
    ///
    /// Without a `component_sets_path` the handler stays pending until
    /// [`set_public_first_party_sets`](Self::set_public_first_party_sets) is called.
    pub async fn init(&self) {
        if let Some(psl_path) = &self.config.psl_path {
            self.load_psl(psl_path.clone()).await;
        }

        if !self.config.enabled {
            log::info!("First-Party Sets disabled, finishing with empty sets");
            self.set_manually_specified_set("");
            self.set_public_first_party_sets(Vec::new()).await;
            return;
        }

        if let Some(path) = &self.config.persisted_sets_path {
            let previous = self.read_file(path.clone()).await;
            self.lock().previous_sets = previous;
        }

        self.set_manually_specified_set(self.config.manual_set.as_deref().unwrap_or_default());

        if let Some(path) = &self.config.component_sets_path {
            let bytes = self.read_file(path.clone()).await;
            self.set_public_first_party_sets(bytes).await;
        }
    }

    async fn load_psl(&self, path: PathBuf) {
        let bytes = self.read_file(path.clone()).await;
        match PslRules::parse(&String::from_utf8_lossy(&bytes)) {
            Ok(rules) => init_psl(rules),
            Err(e) => log::warn!("keeping built-in suffix rules, '{}': {e}", path.display()),
        }
    }

    async fn read_file(&self, path: PathBuf) -> Vec<u8> {
        let persistence = Arc::clone(&self.persistence);
        match tokio::task::spawn_blocking(move || persistence.read_raw_bytes(&path)).await {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("read task failed: {e}");
                Vec::new()
            }
        }
    }

    // =========================================================================
    // Inputs
    // =========================================================================

    pub fn set_manually_specified_set(&self, flag_value: &str) {
        self.update_loader(|loader| loader.set_manually_specified_set(flag_value));
    }

    /// Provide the public sets list. Only the first call has any effect.
    pub async fn set_public_first_party_sets(&self, bytes: Vec<u8>) {
        if !self.lock().loader.begin_component_sets() {
            log::debug!("public sets already provided, discarding {} bytes", bytes.len());
            return;
        }
        let sets = if self.config.enabled {
            parse_component_sets(bytes).await
        } else {
            GlobalSets::default()
        };
        self.update_loader(move |loader| loader.set_component_sets(sets));
    }

    fn update_loader(&self, update: impl FnOnce(&mut SetsLoader)) {
        let (sets, callbacks) = {
            let mut state = self.lock();
            update(&mut state.loader);
            let Ok(sets) = state.loaded_rx.try_recv() else {
                return;
            };
            log::info!("First-Party Sets ready: {} sites", sets.sets.len());
            state.sets = Some(sets.clone());
            (sets, std::mem::take(&mut state.on_sets_ready))
        };
        for callback in callbacks {
            callback(sets.clone());
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn is_ready(&self) -> bool {
        self.lock().sets.is_some()
    }

    /// The finalized sets if ready; otherwise `callback` is queued and `None` returned.
    pub fn get_sets(&self, callback: impl FnOnce(GlobalSets) + Send + 'static) -> Option<GlobalSets> {
        let mut state = self.lock();
        if let Some(sets) = &state.sets {
            return Some(sets.clone());
        }
        state.on_sets_ready.push_back(Box::new(callback));
        None
    }

    /// Wait until the finalized sets are available.
    ///
    /// Returns empty sets if the handler is reset while waiting.
    pub async fn wait_for_sets(&self) -> GlobalSets {
        let (tx, rx) = oneshot::channel();
        let ready = self.get_sets(move |sets| {
            let _ = tx.send(sets);
        });
        if let Some(sets) = ready {
            return sets;
        }
        rx.await.unwrap_or_else(|_| {
            log::debug!("handler reset before sets were ready");
            GlobalSets::default()
        })
    }

    /// Check an Overrides policy without building a customization.
    pub fn validate_enterprise_policy(policy: &Value) -> Option<PolicyParsingError> {
        parse_sets_from_enterprise_policy(policy).err()
    }

    fn parse_policy(&self, policy: &Value) -> Option<ParsedPolicySetLists> {
        if !self.config.enabled {
            return None;
        }
        match parse_sets_from_enterprise_policy(policy) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                log::warn!("ignoring invalid Overrides policy: {e}");
                None
            }
        }
    }

    /// Customization for `policy`, computed now if the sets are ready.
    ///
    /// Otherwise `callback` receives it once they are and `None` is returned.
    /// Invalid policies yield an empty customization immediately.
    pub fn get_customization_for_policy(
        &self,
        policy: &Value,
        callback: impl FnOnce(PolicyCustomization) + Send + 'static,
    ) -> Option<PolicyCustomization> {
        let Some(parsed) = self.parse_policy(policy) else {
            return Some(PolicyCustomization::new());
        };
        let sets = {
            let mut state = self.lock();
            match state.sets.clone() {
                Some(sets) => sets,
                None => {
                    let callback: CustomizationCallback = Box::new(callback);
                    state.on_sets_ready.push_back(Box::new(move |sets| {
                        callback(compute_enterprise_customizations(&sets.sets, &parsed))
                    }));
                    return None;
                }
            }
        };
        Some(compute_enterprise_customizations(&sets.sets, &parsed))
    }

    pub async fn customization_for_policy(&self, policy: &Value) -> PolicyCustomization {
        let Some(parsed) = self.parse_policy(policy) else {
            return PolicyCustomization::new();
        };
        let sets = self.wait_for_sets().await;
        compute_enterprise_customizations(&sets.sets, &parsed)
    }

    /// Owner of `site` under `customization`, or `None` before the sets are ready.
    pub fn find_owner(&self, site: &Site, customization: &PolicyCustomization) -> Option<SetEntry> {
        let state = self.lock();
        let sets = state.sets.as_ref()?;
        find_owner(site, &sets.sets, customization).cloned()
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Sites whose owner changed since the persisted snapshot, recorded for
    /// `browser_context_id` in the clearing store.
    pub async fn clear_site_data_on_changed_sets(
        &self,
        browser_context_id: &str,
        previous_policy: &PolicyCustomization,
        current_policy: &PolicyCustomization,
    ) -> BTreeSet<Site> {
        let current = self.wait_for_sets().await;
        if current.sets.is_empty() && current_policy.is_empty() {
            log::debug!("no current sets, nothing to clear for {browser_context_id}");
            return BTreeSet::new();
        }

        let previous_bytes = self.lock().previous_sets.clone();
        let previous_sets = deserialize_first_party_sets(&String::from_utf8_lossy(&previous_bytes));
        let changed = compute_sets_diff(&previous_sets, previous_policy, &current.sets, current_policy);

        log::info!("{} sites changed owner for {browser_context_id}", changed.len());
        self.store.record_sites_to_clear(browser_context_id, &changed);
        changed
    }

    /// Write the finalized sets to `persisted_sets_path`, waiting for them if needed.
    pub async fn persist_sets(&self) {
        let Some(path) = self.config.persisted_sets_path.clone() else {
            log::debug!("no persisted sets path configured");
            return;
        };
        let sets = self.wait_for_sets().await;
        let json = serialize_first_party_sets(&sets.sets);
        let persistence = Arc::clone(&self.persistence);
        if let Err(e) = tokio::task::spawn_blocking(move || persistence.write_raw_bytes(&path, json.as_bytes())).await {
            log::warn!("persist task failed: {e}");
        }
    }

    /// Drop all inputs, the finalized sets and pending queries.
    pub fn reset_for_testing(&self) {
        *self.lock() = HandlerState::new();
    }
}
