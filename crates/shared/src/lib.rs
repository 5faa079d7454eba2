//! Huddle shared library — ids, constants, and the wire contracts exchanged
//! between the encryption core and the transport/membership layers.

pub mod api;
pub mod constants;
pub mod error;
pub mod ids;
