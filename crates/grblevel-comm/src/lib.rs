#![allow(dead_code)]
//! Grbl character-counting streaming protocol ([`conn`]) and the two
//! transport adapters that sit on top of it ([`serial_adapter`],
//! [`spjs_adapter`]), unified behind [`adapter::MachineAdapter`].

pub mod adapter;
pub mod conn;
pub mod serial_adapter;
pub mod spjs_adapter;
pub mod status;

pub use adapter::MachineAdapter;
pub use conn::Connection;
pub use serial_adapter::SerialAdapter;
pub use spjs_adapter::SpjsAdapter;
pub use status::{MachineState, ProbeResult, Status};
