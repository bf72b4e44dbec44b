mod build;
mod manifest;
mod platforms;

pub use build::cmd_build;
pub use manifest::cmd_manifest;
pub use platforms::cmd_platforms;
