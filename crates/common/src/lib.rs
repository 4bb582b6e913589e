// msgsync-common: identifiers, wire/external shapes and the stateless translation layer

pub mod error;
pub mod protocol;
pub mod translate;
pub mod types;
