//! Postgres wire protocol (the subset the bundled driver speaks)
//!
//! Only the simple query flow is implemented: startup, authentication,
//! `Query`, and the backend messages those produce.

pub mod constants;
pub mod decode;
pub mod encode;
mod message;

pub use decode::decode_message;
pub use encode::encode_message;
pub use message::{
    AuthenticationMessage, BackendMessage, ErrorFields, FieldDescription, FrontendMessage,
};
