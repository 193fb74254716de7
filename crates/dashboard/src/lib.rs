//! Server-side HTML for the operator console: attendant, dispatch and
//! courier views rendered from client state.

pub mod components;
pub mod courier;
pub mod html;
pub mod map;
pub mod pages;

pub use courier::render_courier;
pub use html::Markup;
pub use pages::{render_despacho, render_document, render_pedidos, render_view};
