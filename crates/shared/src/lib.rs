pub mod domain;
pub mod error;
pub mod events;
pub mod form;
pub mod intake;
pub mod paths;
pub mod protocol;
pub mod scenario;
pub mod timeline;
