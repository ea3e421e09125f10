//! Environment probes that let integration suites skip cleanly.

use std::path::Path;
use std::process::Command;

/// Environment variable naming an externally managed Redis instance.
pub const REDIS_URL_ENV: &str = "QUILL_TEST_REDIS_URL";

/// Returns `true` if a Docker daemon is reachable for container-backed tests.
#[must_use]
pub fn docker_available() -> bool {
    docker_reachable(std::env::var("DOCKER_HOST").ok().as_deref())
}

/// Redis URL supplied by the environment, if any.
#[must_use]
pub fn external_redis_url() -> Option<String> {
    std::env::var(REDIS_URL_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn docker_reachable(host: Option<&str>) -> bool {
    match host {
        Some(host) => host
            .strip_prefix("unix://")
            .is_none_or(|socket| Path::new(socket).exists()),
        None => {
            Path::new("/var/run/docker.sock").exists()
                || Command::new("docker")
                    .arg("info")
                    .output()
                    .is_ok_and(|output| output.status.success())
        }
    }
}
