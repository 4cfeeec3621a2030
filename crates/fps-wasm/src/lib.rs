//! WebAssembly bindings for First-Party Sets

use std::sync::OnceLock;

use fps_core::{
    apply_manually_specified_set, compute_enterprise_customizations, find_owner as resolve_owner, GlobalSets,
    PolicyCustomization, SetEntry, Site, SiteType,
};
use fps_parser::{parse_manually_specified_set, parse_sets_from_enterprise_policy, parse_sets_from_stream};
use serde_json::Value;
use wasm_bindgen::prelude::*;

static SETS_STATE: OnceLock<GlobalSets> = OnceLock::new();

fn load_sets(component_sets_text: &str, manual_set: Option<&str>) -> GlobalSets {
    let mut sets = parse_sets_from_stream(component_sets_text);
    if let Some(manual_set) = manual_set.and_then(parse_manually_specified_set) {
        apply_manually_specified_set(&mut sets, &manual_set);
    }
    sets
}

fn parse_policy_json(policy_json: &str) -> Result<Value, JsValue> {
    serde_json::from_str(policy_json).map_err(|e| JsValue::from_str(&format!("Invalid policy JSON: {}", e)))
}

/// Invalid policies customize nothing.
fn customization_for(sets: &GlobalSets, policy: &Value) -> PolicyCustomization {
    match parse_sets_from_enterprise_policy(policy) {
        Ok(parsed) => compute_enterprise_customizations(&sets.sets, &parsed),
        Err(_) => PolicyCustomization::new(),
    }
}

#[wasm_bindgen]
pub fn init(component_sets_text: &str, manual_set: Option<String>) -> Result<(), JsValue> {
    if SETS_STATE.get().is_some() {
        return Err(JsValue::from_str("Already initialized. Reload the page to reinitialize."));
    }

    let sets = load_sets(component_sets_text, manual_set.as_deref());
    let message = format!("First-Party Sets loaded: {} sites, {} aliases", sets.sets.len(), sets.aliases.len());

    SETS_STATE
        .set(sets)
        .map_err(|_| JsValue::from_str("Failed to set First-Party Sets state"))?;
    web_sys::console::log_1(&JsValue::from_str(&message));

    Ok(())
}

#[wasm_bindgen]
pub fn is_initialized() -> bool {
    SETS_STATE.get().is_some()
}

#[wasm_bindgen]
pub fn get_sets_info() -> JsValue {
    let result = js_sys::Object::new();
    if let Some(sets) = SETS_STATE.get() {
        let _ = js_sys::Reflect::set(&result, &"initialized".into(), &JsValue::from(true));
        let _ = js_sys::Reflect::set(&result, &"sites".into(), &JsValue::from(sets.sets.len() as u32));
        let _ = js_sys::Reflect::set(&result, &"sets".into(), &JsValue::from(sets.owner_to_members().len() as u32));
        let _ = js_sys::Reflect::set(&result, &"aliases".into(), &JsValue::from(sets.aliases.len() as u32));
    } else {
        let _ = js_sys::Reflect::set(&result, &"initialized".into(), &JsValue::from(false));
    }
    result.into()
}

/// `null` for a valid policy, otherwise `{error, setType, index}`.
#[wasm_bindgen]
pub fn validate_enterprise_policy(policy_json: &str) -> Result<JsValue, JsValue> {
    let policy = parse_policy_json(policy_json)?;
    let Err(error) = parse_sets_from_enterprise_policy(&policy) else {
        return Ok(JsValue::NULL);
    };

    let result = js_sys::Object::new();
    let _ = js_sys::Reflect::set(&result, &"error".into(), &JsValue::from_str(&error.error.to_string()));
    let _ = js_sys::Reflect::set(&result, &"setType".into(), &JsValue::from_str(error.set_type.as_str()));
    let _ = js_sys::Reflect::set(&result, &"index".into(), &JsValue::from(error.error_index as u32));
    Ok(result.into())
}

/// Owner entry for `site`, or `null` if it is not in a set.
#[wasm_bindgen]
pub fn find_owner(site: &str, policy_json: Option<String>) -> Result<JsValue, JsValue> {
    let sets = SETS_STATE
        .get()
        .ok_or_else(|| JsValue::from_str("Not initialized"))?;
    let site = Site::canonicalize(site, false).map_err(|e| JsValue::from_str(&e.to_string()))?;

    let customization = match policy_json {
        Some(json) => customization_for(sets, &parse_policy_json(&json)?),
        None => PolicyCustomization::new(),
    };

    Ok(match resolve_owner(&site, &sets.sets, &customization) {
        Some(entry) => entry_to_js(entry),
        None => JsValue::NULL,
    })
}

fn entry_to_js(entry: &SetEntry) -> JsValue {
    let result = js_sys::Object::new();
    let site_type = match entry.site_type() {
        SiteType::Primary => "primary",
        SiteType::Associated => "associated",
    };
    let _ = js_sys::Reflect::set(&result, &"owner".into(), &JsValue::from_str(entry.owner().as_str()));
    let _ = js_sys::Reflect::set(&result, &"siteType".into(), &JsValue::from_str(site_type));
    if let Some(index) = entry.index() {
        let _ = js_sys::Reflect::set(&result, &"index".into(), &JsValue::from(index.0));
    }
    result.into()
}

/// Canonical `https://<registrable domain>` form of `origin`, if it has one.
#[wasm_bindgen]
pub fn canonicalize_site(origin: &str) -> Option<String> {
    Site::canonicalize(origin, false).ok().map(String::from)
}
