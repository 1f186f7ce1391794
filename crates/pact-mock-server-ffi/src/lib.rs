//! C-compatible FFI for the Pact mock server.
//!
//! Mock servers are addressed by the port they are bound to. Every exported
//! function catches panics, so no unwinding ever crosses into the caller.
//!
//! Strings returned by this library must be released with [`free_string`].

mod handles;
mod logging;

pub use handles::{InteractionHandle, InteractionPart, PactHandle};

use pact_mock_server::{Cleanup, MockServerConfig, MockServerError, ServerManager};
use std::ffi::{c_char, c_ushort, CStr, CString};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::ptr;
use tracing::{error, warn};

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");

/// A null pointer or invalid UTF-8 was passed in
pub const ERROR_INVALID_ARGUMENT: i32 = -1;
/// The mock server could not be started
pub const ERROR_START_FAILED: i32 = -3;
/// The call panicked
pub const ERROR_PANIC: i32 = -4;
/// The mock server config could not be parsed
pub const ERROR_INVALID_CONFIG: i32 = -6;

/// `write_pact_file`: the call panicked
pub const WRITE_PACT_PANIC: i32 = 1;
/// `write_pact_file`: the pact file could not be written
pub const WRITE_PACT_FAILED: i32 = 2;
/// `write_pact_file`: no mock server is running on the port
pub const WRITE_PACT_NOT_FOUND: i32 = 3;

/// Borrow a C string argument, `None` for null or invalid UTF-8.
///
/// # Safety
/// `ptr` must be null or point to a valid null-terminated string.
unsafe fn str_arg<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok()
}

fn port_arg(port: i32) -> Option<u16> {
    u16::try_from(port).ok()
}

/// Run `f`, turning a panic into `fallback`.
fn guard<T>(name: &str, fallback: T, f: impl FnOnce() -> T) -> T {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|_| {
        error!("{} panicked", name);
        fallback
    })
}

fn manager() -> Option<&'static ServerManager> {
    match ServerManager::global() {
        Ok(manager) => Some(manager),
        Err(e) => {
            error!("Could not start the mock server runtime: {}", e);
            None
        }
    }
}

fn env_config() -> MockServerConfig {
    MockServerConfig::from_env().unwrap_or_else(|e| {
        warn!("Ignoring invalid mock server environment config: {:#}", e);
        MockServerConfig::default()
    })
}

fn start(pact: &str, addr: &str, config: MockServerConfig) -> i32 {
    let Some(manager) = manager() else {
        return ERROR_START_FAILED;
    };
    match manager.start_mock_server(pact, addr, config) {
        Ok(port) => i32::from(port),
        Err(e) => {
            error!("Failed to start mock server: {}", e);
            e.error_code()
        }
    }
}

/// Initialise logging. Log directives are read from the environment
/// variable named by `log_env_var`, falling back to `RUST_LOG`, then `info`.
///
/// # Safety
/// `log_env_var` must be null or a valid null-terminated string.
#[no_mangle]
pub unsafe extern "C" fn init(log_env_var: *const c_char) {
    guard("init", (), || {
        logging::init_logging(str_arg(log_env_var));
    })
}

/// Create a mock server for a contract given as JSON, bound to `addr_str`
/// (`host:port`, port 0 for any free port).
///
/// Returns the bound port, or a negative error:
///
/// | Error | Description |
/// |-------|-------------|
/// | -1 | A null pointer or invalid UTF-8 was received |
/// | -2 | The contract JSON could not be parsed |
/// | -3 | The mock server could not be started |
/// | -4 | The call panicked |
/// | -5 | The address is not valid |
///
/// # Safety
/// Both arguments must be null or valid null-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn create_mock_server(
    pact_str: *const c_char,
    addr_str: *const c_char,
) -> i32 {
    guard("create_mock_server", ERROR_PANIC, || {
        let (Some(pact), Some(addr)) = (str_arg(pact_str), str_arg(addr_str)) else {
            return ERROR_INVALID_ARGUMENT;
        };
        start(pact, addr, env_config())
    })
}

/// As [`create_mock_server`], with a JSON mock server config such as
/// `{"corsPreflight": true}`. A config that can not be parsed gives -6.
///
/// # Safety
/// All arguments must be null or valid null-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn create_mock_server_with_config(
    pact_str: *const c_char,
    addr_str: *const c_char,
    config_str: *const c_char,
) -> i32 {
    guard("create_mock_server_with_config", ERROR_PANIC, || {
        let (Some(pact), Some(addr), Some(config)) =
            (str_arg(pact_str), str_arg(addr_str), str_arg(config_str))
        else {
            return ERROR_INVALID_ARGUMENT;
        };
        match MockServerConfig::from_json_str(config) {
            Ok(config) => start(pact, addr, config),
            Err(e) => {
                error!("Invalid mock server config: {:#}", e);
                ERROR_INVALID_CONFIG
            }
        }
    })
}

/// Create a mock server for a contract built with [`new_pact`]. The contract
/// can not be modified afterwards. Error codes as for
/// [`create_mock_server`], with -1 for an unknown handle.
///
/// # Safety
/// `addr_str` must be null or a valid null-terminated string.
#[no_mangle]
pub unsafe extern "C" fn create_mock_server_for_pact(
    pact: PactHandle,
    addr_str: *const c_char,
) -> i32 {
    guard("create_mock_server_for_pact", ERROR_PANIC, || {
        let Some(addr) = str_arg(addr_str) else {
            return ERROR_INVALID_ARGUMENT;
        };
        let Some(contract) = handles::contract(pact) else {
            warn!("No pact with handle {}", pact.pact);
            return ERROR_INVALID_ARGUMENT;
        };
        let Some(manager) = manager() else {
            return ERROR_START_FAILED;
        };
        match manager.start_mock_server_for_contract(contract, addr, env_config()) {
            Ok(port) => {
                handles::mark_started(pact);
                i32::from(port)
            }
            Err(e) => {
                error!("Failed to start mock server: {}", e);
                e.error_code()
            }
        }
    })
}

/// True when every request to the mock server on `mock_server_port` matched
/// and every interaction was exercised. False for an unknown port.
#[no_mangle]
pub extern "C" fn mock_server_matched(mock_server_port: i32) -> bool {
    guard("mock_server_matched", false, || {
        let (Some(port), Some(manager)) = (port_arg(mock_server_port), manager()) else {
            return false;
        };
        manager.matched(port).unwrap_or_else(|e| {
            warn!("{}", e);
            false
        })
    })
}

/// The mismatch report of the mock server on `mock_server_port` as a JSON
/// array. Returns NULL for an unknown port. The string must be released
/// with [`free_string`].
#[no_mangle]
pub extern "C" fn mock_server_mismatches(mock_server_port: i32) -> *mut c_char {
    guard("mock_server_mismatches", ptr::null_mut(), || {
        let (Some(port), Some(manager)) = (port_arg(mock_server_port), manager()) else {
            return ptr::null_mut();
        };
        let report = match manager.mismatches(port) {
            Ok(report) => report,
            Err(e) => {
                warn!("{}", e);
                return ptr::null_mut();
            }
        };
        serde_json::to_string(&report)
            .ok()
            .and_then(|json| CString::new(json).ok())
            .map_or(ptr::null_mut(), CString::into_raw)
    })
}

/// Write the contract of the mock server on `mock_server_port` as a pact
/// file in `directory` (the working directory when null). Unless
/// `overwrite` is set, the contract is merged into an existing file.
///
/// Returns 0 on success, 1 on panic, 2 when the file can not be written and
/// 3 when no mock server is running on the port.
///
/// # Safety
/// `directory` must be null or a valid null-terminated string.
#[no_mangle]
pub unsafe extern "C" fn write_pact_file(
    mock_server_port: i32,
    directory: *const c_char,
    overwrite: bool,
) -> i32 {
    guard("write_pact_file", WRITE_PACT_PANIC, || {
        let Some(port) = port_arg(mock_server_port) else {
            return WRITE_PACT_NOT_FOUND;
        };
        let Some(manager) = manager() else {
            return WRITE_PACT_FAILED;
        };
        let directory = if directory.is_null() {
            None
        } else {
            match str_arg(directory) {
                Some(directory) => Some(Path::new(directory)),
                None => {
                    error!("write_pact_file: directory is not valid UTF-8");
                    return WRITE_PACT_FAILED;
                }
            }
        };
        match manager.write_pact_file(port, directory, overwrite) {
            Ok(_) => 0,
            Err(MockServerError::NotFound(port)) => {
                warn!("No mock server running on port {}", port);
                WRITE_PACT_NOT_FOUND
            }
            Err(e) => {
                error!("{}", e);
                WRITE_PACT_FAILED
            }
        }
    })
}

/// Stop the mock server on `mock_server_port` and release it. Cleaning up
/// the same port again also returns true; an unknown port returns false.
#[no_mangle]
pub extern "C" fn cleanup_mock_server(mock_server_port: i32) -> bool {
    guard("cleanup_mock_server", false, || {
        let (Some(port), Some(manager)) = (port_arg(mock_server_port), manager()) else {
            return false;
        };
        match manager.shutdown_mock_server(port) {
            Ok(Cleanup::Stopped) | Ok(Cleanup::AlreadyStopped) => true,
            Err(e) => {
                warn!("{}", e);
                false
            }
        }
    })
}

/// Release a string returned by this library.
///
/// # Safety
/// `s` must be null or a pointer returned by this library that has not
/// already been freed.
#[no_mangle]
pub unsafe extern "C" fn free_string(s: *mut c_char) {
    if s.is_null() {
        return;
    }
    drop(CString::from_raw(s));
}

/// The library version as a static string. Do not free it.
#[no_mangle]
pub extern "C" fn version() -> *const c_char {
    VERSION.as_ptr().cast()
}

// ============================================================================
// Contract builder
// ============================================================================

/// Start a new contract between `consumer_name` and `provider_name`.
/// Missing names are left empty.
///
/// # Safety
/// Both arguments must be null or valid null-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn new_pact(
    consumer_name: *const c_char,
    provider_name: *const c_char,
) -> PactHandle {
    guard("new_pact", PactHandle { pact: 0 }, || {
        handles::new_pact(
            str_arg(consumer_name).unwrap_or_default(),
            str_arg(provider_name).unwrap_or_default(),
        )
    })
}

/// Add an interaction to a contract. The returned handle has `interaction`
/// 0 when the contract is unknown or a mock server has already started.
///
/// # Safety
/// `description` must be null or a valid null-terminated string.
#[no_mangle]
pub unsafe extern "C" fn new_interaction(
    pact: PactHandle,
    description: *const c_char,
) -> InteractionHandle {
    let failed = InteractionHandle {
        pact: pact.pact,
        interaction: 0,
    };
    guard("new_interaction", failed, || {
        handles::new_interaction(pact, str_arg(description).unwrap_or_default())
    })
}

/// Set the interaction's description. Returns false if it can not be
/// modified.
///
/// # Safety
/// `description` must be null or a valid null-terminated string.
#[no_mangle]
pub unsafe extern "C" fn upon_receiving(
    interaction: InteractionHandle,
    description: *const c_char,
) -> bool {
    guard("upon_receiving", false, || match str_arg(description) {
        Some(description) => handles::upon_receiving(interaction, description),
        None => false,
    })
}

/// Set the provider state the interaction needs.
///
/// # Safety
/// `description` must be null or a valid null-terminated string.
#[no_mangle]
pub unsafe extern "C" fn given(interaction: InteractionHandle, description: *const c_char) -> bool {
    guard("given", false, || match str_arg(description) {
        Some(description) => handles::given(interaction, description),
        None => false,
    })
}

/// Set the expected request method and path. Null arguments keep the
/// defaults of `GET` and `/`.
///
/// # Safety
/// Both arguments must be null or valid null-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn with_request(
    interaction: InteractionHandle,
    method: *const c_char,
    path: *const c_char,
) -> bool {
    guard("with_request", false, || {
        handles::with_request(
            interaction,
            str_arg(method).unwrap_or("GET"),
            str_arg(path).unwrap_or("/"),
        )
    })
}

/// Set value `index` of an expected query parameter.
///
/// # Safety
/// Both strings must be null or valid null-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn with_query_parameter(
    interaction: InteractionHandle,
    name: *const c_char,
    index: usize,
    value: *const c_char,
) -> bool {
    guard("with_query_parameter", false, || {
        match (str_arg(name), str_arg(value)) {
            (Some(name), Some(value)) => {
                handles::with_query_parameter(interaction, name, index, value)
            }
            _ => false,
        }
    })
}

/// Set value `index` of a request or response header.
///
/// # Safety
/// Both strings must be null or valid null-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn with_header(
    interaction: InteractionHandle,
    part: InteractionPart,
    name: *const c_char,
    index: usize,
    value: *const c_char,
) -> bool {
    guard("with_header", false, || match (str_arg(name), str_arg(value)) {
        (Some(name), Some(value)) => handles::with_header(interaction, part, name, index, value),
        _ => false,
    })
}

/// Set the response status.
#[no_mangle]
pub extern "C" fn response_status(interaction: InteractionHandle, status: c_ushort) -> bool {
    guard("response_status", false, || {
        handles::response_status(interaction, status)
    })
}

/// Set the request or response body. `content_type` defaults to
/// `text/plain` and is ignored when a `Content-Type` header is already set.
///
/// # Safety
/// Both arguments must be null or valid null-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn with_body(
    interaction: InteractionHandle,
    part: InteractionPart,
    content_type: *const c_char,
    body: *const c_char,
) -> bool {
    guard("with_body", false, || {
        handles::with_body(
            interaction,
            part,
            str_arg(content_type),
            str_arg(body).unwrap_or_default(),
        )
    })
}

/// Set `metadata[namespace][name] = value` on the contract.
///
/// # Safety
/// All strings must be null or valid null-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn with_pact_metadata(
    pact: PactHandle,
    namespace: *const c_char,
    name: *const c_char,
    value: *const c_char,
) -> bool {
    guard("with_pact_metadata", false, || {
        match (str_arg(namespace), str_arg(name), str_arg(value)) {
            (Some(namespace), Some(name), Some(value)) => {
                handles::with_pact_metadata(pact, namespace, name, value)
            }
            _ => false,
        }
    })
}
