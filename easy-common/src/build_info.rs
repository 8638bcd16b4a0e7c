//! Build identification recorded by the build script

pub const GIT_REVISION: &str = env!("EASY_GIT_REVISION");
pub const BUILD_TIMESTAMP: &str = env!("EASY_BUILD_TIMESTAMP");
pub const BUILD_PROFILE: &str = env!("EASY_BUILD_PROFILE");

/// Version line for [`HttpWith::build_info`](crate::HttpWith::build_info)
///
/// `version` is the caller's `CARGO_PKG_VERSION`.
pub fn version_line(version: &str) -> String {
    format!("v{} [{}] built {} ({})", version, GIT_REVISION, BUILD_TIMESTAMP, BUILD_PROFILE)
}
