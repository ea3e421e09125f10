//! Disposable Postgres databases for integration tests.
//!
//! An external server is used when `QUILL_TEST_DATABASE_URL` is set; a fresh
//! database is created on it per test. Otherwise local server binaries
//! (`initdb`, `postgres`, `pg_isready`) are used to spawn a throwaway cluster.
//! Callers decide whether to skip when [`start_postgres`] fails.

use std::fs;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::str::FromStr;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, anyhow, bail};
use postgres::NoTls;
use url::Url;

/// Environment variable naming an externally managed Postgres server.
pub const DATABASE_URL_ENV: &str = "QUILL_TEST_DATABASE_URL";

const READY_ATTEMPTS: u32 = 30;
const READY_INTERVAL: Duration = Duration::from_millis(200);

/// Handle to a disposable database; dropping it removes the database and any
/// spawned server.
pub struct TestDatabase {
    connection_string: String,
    admin_url: String,
    database: String,
    server: Option<LocalServer>,
}

struct LocalServer {
    process: Child,
    data_dir: PathBuf,
}

impl TestDatabase {
    /// Connection string that can be passed to `sqlx` or other Postgres clients.
    #[must_use]
    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }
}

impl Drop for TestDatabase {
    fn drop(&mut self) {
        let _ = run_admin(
            &self.admin_url,
            format!("DROP DATABASE IF EXISTS \"{}\"", self.database),
        );
        if let Some(server) = &mut self.server {
            let _ = server.process.kill();
            let _ = server.process.wait();
            let _ = fs::remove_dir_all(&server.data_dir);
        }
    }
}

/// Create a disposable database.
///
/// # Errors
///
/// Returns an error if no external URL is configured and local Postgres
/// binaries are unavailable or fail to start.
pub fn start_postgres() -> Result<TestDatabase> {
    if let Ok(url) = std::env::var(DATABASE_URL_ENV) {
        return create_database_on(&url, None);
    }

    let server = spawn_local_server()?;
    let base_url = format!("postgres://postgres@127.0.0.1:{}/postgres", server.1);
    create_database_on(&base_url, Some(server.0))
}

fn create_database_on(base_url: &str, server: Option<LocalServer>) -> Result<TestDatabase> {
    let parsed = Url::parse(base_url).context("invalid postgres connection url")?;
    let database = unique_name("quill_test");

    let mut admin = parsed.clone();
    admin.set_path("/postgres");
    let mut candidates = vec![admin.to_string()];
    // Fall back to the supplied database when `postgres` is not reachable.
    if admin.path() != parsed.path() {
        candidates.push(parsed.to_string());
    }

    let mut last_error = None;
    for admin_url in candidates {
        match run_admin(&admin_url, format!("CREATE DATABASE \"{database}\"")) {
            Ok(()) => {
                let mut connection = parsed.clone();
                connection.set_path(&format!("/{database}"));
                return Ok(TestDatabase {
                    connection_string: connection.to_string(),
                    admin_url,
                    database,
                    server,
                });
            }
            Err(err) => last_error = Some(err),
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow!("failed to create test database")))
}

fn spawn_local_server() -> Result<(LocalServer, u16)> {
    let initdb = find_binary("initdb")?;
    let postgres = find_binary("postgres")?;
    let pg_isready = find_binary("pg_isready")?;

    let port = free_port()?;
    let data_dir = std::env::temp_dir().join(unique_name("quill-pg"));
    fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data dir {}", data_dir.display()))?;
    let data_arg = data_dir
        .to_str()
        .context("data dir contains non-utf8 characters")?;

    let status = Command::new(&initdb)
        .args(["-D", data_arg, "--username=postgres", "--auth=trust"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .context("failed to run initdb")?;
    if !status.success() {
        bail!("initdb exited with failure status");
    }

    let port_arg = port.to_string();
    let process = Command::new(&postgres)
        .args(["-D", data_arg, "-p", &port_arg, "-h", "127.0.0.1"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .context("failed to start postgres process")?;
    let mut server = LocalServer { process, data_dir };

    if let Err(err) = wait_until_ready(&pg_isready, &port_arg) {
        let _ = server.process.kill();
        let _ = fs::remove_dir_all(&server.data_dir);
        return Err(err);
    }
    Ok((server, port))
}

fn find_binary(name: &str) -> Result<PathBuf> {
    let preferred = [
        PathBuf::from("/usr/lib/postgresql/16/bin"),
        PathBuf::from("/opt/homebrew/opt/postgresql@16/bin"),
        PathBuf::from("/usr/local/opt/postgresql@16/bin"),
    ];
    let from_path = std::env::var_os("PATH")
        .map_or_else(Vec::new, |paths| std::env::split_paths(&paths).collect());

    preferred
        .into_iter()
        .chain(from_path)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.exists())
        .ok_or_else(|| anyhow!("{name} binary is required for Postgres tests"))
}

fn free_port() -> Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").context("failed to reserve port")?;
    Ok(listener
        .local_addr()
        .context("failed to read listener address")?
        .port())
}

fn wait_until_ready(pg_isready: &Path, port: &str) -> Result<()> {
    for _ in 0..READY_ATTEMPTS {
        let ready = Command::new(pg_isready)
            .args(["-h", "127.0.0.1", "-p", port, "-U", "postgres"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|status| status.success());
        if ready {
            return Ok(());
        }
        thread::sleep(READY_INTERVAL);
    }
    bail!("postgres process did not become ready in time")
}

// The sync client spins up its own runtime, so keep it off any async test thread.
fn run_admin(admin_url: &str, statement: String) -> Result<()> {
    let admin_url = admin_url.to_string();
    thread::spawn(move || -> Result<()> {
        let mut client = postgres::Config::from_str(&admin_url)?.connect(NoTls)?;
        client
            .simple_query(&statement)
            .map(|_| ())
            .with_context(|| format!("failed to run `{statement}`"))
    })
    .join()
    .unwrap_or_else(|_| Err(anyhow!("admin statement thread panicked")))
}

fn unique_name(prefix: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    format!("{prefix}_{}_{nanos}", std::process::id())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_names_carry_prefix_and_pid() {
        let name = unique_name("quill_test");
        assert!(name.starts_with("quill_test_"));
        assert!(name.contains(&std::process::id().to_string()));
    }

    #[test]
    fn free_port_is_nonzero() {
        assert_ne!(free_port().expect("port"), 0);
    }
}
