//! Collects the two startup inputs and emits the finalized public sets once.

use fps_core::{apply_manually_specified_set, GlobalSets, SingleSet};
use fps_parser::{parse_manually_specified_set, parse_sets_from_bytes};

/// Invoked exactly once with the finalized sets.
pub type LoadCompleteCallback = Box<dyn FnOnce(GlobalSets) + Send>;

#[derive(Debug)]
enum ComponentState {
    NotStarted,
    Started,
    Finished(GlobalSets),
}

/// Waits for the manual set flag and the component sets, then merges them.
pub struct SetsLoader {
    on_load_complete: Option<LoadCompleteCallback>,
    /// Outer `Some` once the flag was seen; inner `None` when it held no valid set.
    manual_set: Option<Option<SingleSet>>,
    component: ComponentState,
}

impl SetsLoader {
    pub fn new(on_load_complete: LoadCompleteCallback) -> Self {
        Self {
            on_load_complete: Some(on_load_complete),
            manual_set: None,
            component: ComponentState::NotStarted,
        }
    }

    /// Parse and store the manual set flag. Later calls are ignored.
    pub fn set_manually_specified_set(&mut self, flag_value: &str) {
        if self.manual_set.is_some() {
            log::debug!("manual set already provided, ignoring");
            return;
        }
        self.manual_set = Some(parse_manually_specified_set(flag_value));
        self.maybe_finish_loading();
    }

    /// Claim the component input. Returns `false` if another caller already did.
    pub fn begin_component_sets(&mut self) -> bool {
        match self.component {
            ComponentState::NotStarted => {
                self.component = ComponentState::Started;
                true
            }
            ComponentState::Started | ComponentState::Finished(_) => false,
        }
    }

    /// Deliver the parsed component sets claimed by `begin_component_sets`.
    pub fn set_component_sets(&mut self, sets: GlobalSets) {
        match self.component {
            ComponentState::Started => {
                log::debug!("component sets parsed: {} sites, {} aliases", sets.sets.len(), sets.aliases.len());
                self.component = ComponentState::Finished(sets);
                self.maybe_finish_loading();
            }
            ComponentState::NotStarted => {
                log::warn!("component sets delivered before being claimed, ignoring");
            }
            ComponentState::Finished(_) => {
                log::debug!("component sets already loaded, ignoring");
            }
        }
    }

    pub fn has_all_inputs(&self) -> bool {
        matches!(self.component, ComponentState::Finished(_)) && self.manual_set.is_some()
    }

    fn maybe_finish_loading(&mut self) {
        if !self.has_all_inputs() {
            return;
        }
        let Some(callback) = self.on_load_complete.take() else {
            return;
        };
        let ComponentState::Finished(loaded) = &mut self.component else {
            return;
        };
        let mut sets = std::mem::take(loaded);
        if let Some(Some(manual_set)) = &self.manual_set {
            apply_manually_specified_set(&mut sets, manual_set);
        }
        callback(sets);
    }
}

/// Parse component bytes on the blocking pool.
pub async fn parse_component_sets(bytes: Vec<u8>) -> GlobalSets {
    match tokio::task::spawn_blocking(move || parse_sets_from_bytes(&bytes)).await {
        Ok(sets) => sets,
        Err(e) => {
            log::warn!("component sets parsing task failed: {e}");
            GlobalSets::default()
        }
    }
}
