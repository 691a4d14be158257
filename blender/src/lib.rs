// container for blender executable and the process that runs a job
pub mod blender;

// locate the file blender wrote for a job
pub mod artifact;

// argument, script and format definitions passed to blender
pub mod models;
