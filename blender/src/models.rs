pub mod args;
pub mod device;
pub mod engine;
pub mod format;
pub mod mode;
pub mod naming;
pub mod render_setting;
pub mod script;
pub mod status;
