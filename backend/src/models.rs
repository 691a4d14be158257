pub mod error;
pub mod job;
pub mod render_result;
pub mod server_setting;
