pub mod output_store;
pub mod scene_store;
