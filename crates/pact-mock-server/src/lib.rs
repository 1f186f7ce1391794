// Library exports for the mock server, the matching engine and the FFI crate

// ===== Contract model =====
pub mod model;

// ===== Matching engine =====
pub mod matching;

// ===== Mock servers and their registry =====
pub mod config;
pub mod error;
pub mod pact_file;
pub mod server;

pub use config::MockServerConfig;
pub use error::{ContractError, MockServerError, PathError};
pub use matching::{
    match_request, match_response, select_interaction, Mismatch, MismatchKind, Selection,
};
pub use model::{Contract, Interaction, Request, Response};
pub use pact_file::write_pact_file;
pub use server::{Cleanup, MismatchReport, MockServer, ServerManager};

/// Crate version, reported across the foreign boundary.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
