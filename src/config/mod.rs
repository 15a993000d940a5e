mod r#impl;
mod structs;

pub use r#impl::load_config;
pub use structs::*;
