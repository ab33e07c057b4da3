pub mod handler_registry;

pub use handler_registry::{handler_fn, HandlerFn, HandlerPair, HandlerRegistry};
