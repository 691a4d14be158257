pub mod fs_output_store;
pub mod fs_scene_store;
