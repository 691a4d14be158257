pub mod data_store;
pub mod orchestrator;
pub mod validator;
