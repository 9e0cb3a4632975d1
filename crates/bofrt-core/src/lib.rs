//! Runtime support for position-independent extension modules.
//!
//! Modules receive their arguments as an untagged little-endian byte buffer
//! and return results through an append-only encoder. Around that codec sit
//! a process-wide key/value store for carrying state between invocations, a
//! per-thread security principal override, and the output channel the host
//! drains.
//!
//! The C ABI over these types lives in `bofrt-native`.

pub mod arena;
pub mod builder;
pub mod config;
pub mod cursor;
pub mod error;
pub mod guard;
pub mod output;
pub mod printf;
pub mod schema;
pub mod store;
pub mod wide;

pub use arena::{Handle, HandleArena};
pub use builder::FormatBuilder;
pub use config::RuntimeConfig;
pub use cursor::BufferCursor;
pub use error::{DecodeError, EncodeError, FormatError, GuardError, SchemaError, WideError};
pub use guard::{PrincipalBackend, ScopedOverride, SecurityContext, Unsupported};
pub use output::{OutputBuffer, OutputCategory, OutputChannel, OutputRecord};
pub use printf::PrintfArg;
pub use schema::{Field, FieldKind, PackValue, Schema, SchemaCursor};
pub use store::{ContextStore, OpaqueAddr};

#[cfg(all(target_os = "linux", target_pointer_width = "64"))]
pub use guard::ThreadEuid;

/// The principal backend for the current target.
#[cfg(all(target_os = "linux", target_pointer_width = "64"))]
pub type PlatformPrincipal = guard::ThreadEuid;

#[cfg(not(all(target_os = "linux", target_pointer_width = "64")))]
pub type PlatformPrincipal = guard::Unsupported;
