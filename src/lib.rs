//! ylibc: the runtime core that transpiled C programs link against.
//!
//! Translated code calls the `Y<name>` bridges with an execution context
//! ([`tls::Tls`]) as the first argument and raw addresses for every pointer.

#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
#![allow(non_upper_case_globals)]
#![allow(clippy::missing_safety_doc)]

#[macro_use]
pub mod macros;

pub mod atomic;
pub mod c_str;
pub mod error;
pub mod header;
pub mod platform;
pub mod sync;
pub mod tls;
pub mod trampoline;
pub mod va_list;

pub use crate::tls::Tls;
