pub mod emitter;
pub mod handler;
