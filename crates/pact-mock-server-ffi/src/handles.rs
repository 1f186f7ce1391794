//! Contracts built up call by call from foreign code.
//!
//! A [`PactHandle`] indexes a contract held in a process-wide table; an
//! [`InteractionHandle`] additionally names one interaction of it. Once a
//! mock server has been started for a contract, the contract is frozen and
//! every mutator returns false.

use once_cell::sync::Lazy;
use pact_mock_server::model::{Contract, HttpPartBuilder, Interaction};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::warn;

/// Handle to a contract under construction.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PactHandle {
    pub pact: usize,
}

/// Handle to one interaction of a contract under construction.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InteractionHandle {
    pub pact: usize,
    pub interaction: usize,
}

/// Which half of an interaction a call applies to.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionPart {
    Request,
    Response,
}

struct PactEntry {
    contract: Contract,
    mock_server_started: bool,
}

static PACTS: Lazy<Mutex<HashMap<usize, PactEntry>>> = Lazy::new(|| Mutex::new(HashMap::new()));
static NEXT_PACT: AtomicUsize = AtomicUsize::new(1);

pub(crate) fn new_pact(consumer: &str, provider: &str) -> PactHandle {
    let id = NEXT_PACT.fetch_add(1, Ordering::Relaxed);
    PACTS.lock().insert(
        id,
        PactEntry {
            contract: Contract::new(consumer, provider),
            mock_server_started: false,
        },
    );
    PactHandle { pact: id }
}

/// Add an interaction; the handle's `interaction` is 1-based, 0 means the
/// pact was not found or is frozen.
pub(crate) fn new_interaction(pact: PactHandle, description: &str) -> InteractionHandle {
    let mut pacts = PACTS.lock();
    let interaction = match pacts.get_mut(&pact.pact) {
        Some(entry) if !entry.mock_server_started => {
            entry.contract.add_interaction(Interaction::new(description)) + 1
        }
        Some(_) => {
            warn!("Pact {} already has a running mock server", pact.pact);
            0
        }
        None => {
            warn!("No pact with handle {}", pact.pact);
            0
        }
    };
    InteractionHandle {
        pact: pact.pact,
        interaction,
    }
}

/// Apply `f` to the interaction if it exists and its pact is still mutable.
fn with_interaction(handle: InteractionHandle, f: impl FnOnce(&mut Interaction)) -> bool {
    let mut pacts = PACTS.lock();
    let Some(entry) = pacts.get_mut(&handle.pact) else {
        warn!("No pact with handle {}", handle.pact);
        return false;
    };
    if entry.mock_server_started {
        warn!(
            "Pact {} can not be modified, its mock server has started",
            handle.pact
        );
        return false;
    }
    let Some(interaction) = handle
        .interaction
        .checked_sub(1)
        .and_then(|index| entry.contract.interactions.get_mut(index))
    else {
        warn!(
            "Pact {} has no interaction with handle {}",
            handle.pact, handle.interaction
        );
        return false;
    };
    f(interaction);
    true
}

pub(crate) fn upon_receiving(handle: InteractionHandle, description: &str) -> bool {
    with_interaction(handle, |i| i.description = description.to_string())
}

pub(crate) fn given(handle: InteractionHandle, state: &str) -> bool {
    with_interaction(handle, |i| i.provider_state = Some(state.to_string()))
}

pub(crate) fn with_request(handle: InteractionHandle, method: &str, path: &str) -> bool {
    with_interaction(handle, |i| {
        i.request.with_method_and_path(method, path);
    })
}

pub(crate) fn with_query_parameter(
    handle: InteractionHandle,
    name: &str,
    index: usize,
    value: &str,
) -> bool {
    with_interaction(handle, |i| {
        i.request.with_query_parameter(name, index, value);
    })
}

pub(crate) fn with_header(
    handle: InteractionHandle,
    part: InteractionPart,
    name: &str,
    index: usize,
    value: &str,
) -> bool {
    with_interaction(handle, |i| match part {
        InteractionPart::Request => {
            i.request.with_header(name, index, value);
        }
        InteractionPart::Response => {
            i.response.with_header(name, index, value);
        }
    })
}

pub(crate) fn response_status(handle: InteractionHandle, status: u16) -> bool {
    with_interaction(handle, |i| {
        i.response.with_status(status);
    })
}

pub(crate) fn with_body(
    handle: InteractionHandle,
    part: InteractionPart,
    content_type: Option<&str>,
    body: &str,
) -> bool {
    with_interaction(handle, |i| match part {
        InteractionPart::Request => {
            i.request.with_body(content_type, body);
        }
        InteractionPart::Response => {
            i.response.with_body(content_type, body);
        }
    })
}

pub(crate) fn with_pact_metadata(
    pact: PactHandle,
    namespace: &str,
    name: &str,
    value: &str,
) -> bool {
    let mut pacts = PACTS.lock();
    match pacts.get_mut(&pact.pact) {
        Some(entry) if !entry.mock_server_started => {
            let section = entry
                .contract
                .metadata
                .extra
                .entry(namespace.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !section.is_object() {
                *section = Value::Object(Map::new());
            }
            if let Value::Object(section) = section {
                section.insert(name.to_string(), Value::String(value.to_string()));
            }
            true
        }
        _ => false,
    }
}

/// Snapshot of the contract behind `pact`.
pub(crate) fn contract(pact: PactHandle) -> Option<Contract> {
    PACTS.lock().get(&pact.pact).map(|entry| entry.contract.clone())
}

/// Freeze the contract once a server is serving it.
pub(crate) fn mark_started(pact: PactHandle) {
    if let Some(entry) = PACTS.lock().get_mut(&pact.pact) {
        entry.mock_server_started = true;
    }
}
