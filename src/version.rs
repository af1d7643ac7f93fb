// Copyright (c) 2024 Mike Tsao. All rights reserved.

/// Build identification for logs and `--version`. Release builds set
/// `GIT_DESCRIBE`; otherwise the crate version is used.
pub fn app_version() -> &'static str {
    match option_env!("GIT_DESCRIBE") {
        Some(describe) => describe,
        None => concat!("v", env!("CARGO_PKG_VERSION")),
    }
}
