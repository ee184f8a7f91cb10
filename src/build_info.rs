//! Version details baked in by `build.rs`.

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Seven-character git commit, or `unknown` outside a checkout.
pub const BUILD_HASH: &str = env!("BUILD_HASH");

const DIRTY: bool = matches!(env!("BUILD_DIRTY").as_bytes(), b"true");

/// `0.1.0 (abc1234)`, with a trailing `*` on the hash for uncommitted builds.
#[must_use]
pub fn version_string() -> String {
    let marker = if DIRTY { "*" } else { "" };
    format!("{VERSION} ({BUILD_HASH}{marker})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_starts_with_package_version() {
        let version = version_string();
        assert!(version.starts_with(VERSION));
        assert!(version.contains(BUILD_HASH));
    }
}
