use anyhow::{Context, Result};
use clap::Parser;
use std::env;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Roles that bypass per-bucket grants.
    pub override_roles: Vec<String>,
    /// Character created with the `Admin` role on startup if missing.
    pub bootstrap_admin: Option<String>,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Job bucket access-control service")]
pub struct Args {
    /// Host to bind to (overrides JOB_BUCKETS_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides JOB_BUCKETS_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides JOB_BUCKETS_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Comma-separated override roles (overrides JOB_BUCKETS_OVERRIDE_ROLES)
    #[arg(long)]
    pub override_roles: Option<String>,

    /// Admin character to create if missing (overrides JOB_BUCKETS_BOOTSTRAP_ADMIN)
    #[arg(long)]
    pub bootstrap_admin: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

const DEFAULT_OVERRIDE_ROLES: &str = "Admin,BucketCreator";

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        Ok((Self::merge(args)?, migrate))
    }

    fn merge(args: Args) -> Result<Self> {
        // --- Environment fallback ---
        let env_host = env::var("JOB_BUCKETS_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match env::var("JOB_BUCKETS_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing JOB_BUCKETS_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 3000,
            Err(err) => return Err(err).context("reading JOB_BUCKETS_PORT"),
        };
        let env_db = env::var("JOB_BUCKETS_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/job_buckets.db".into());
        let env_roles = env::var("JOB_BUCKETS_OVERRIDE_ROLES")
            .unwrap_or_else(|_| DEFAULT_OVERRIDE_ROLES.into());
        let env_admin = env::var("JOB_BUCKETS_BOOTSTRAP_ADMIN").ok();

        // --- Merge ---
        let override_roles = parse_roles(&args.override_roles.unwrap_or(env_roles));
        if override_roles.is_empty() {
            anyhow::bail!("at least one override role must be configured");
        }

        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            override_roles,
            bootstrap_admin: args
                .bootstrap_admin
                .or(env_admin)
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_roles(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_are_split_and_trimmed() {
        assert_eq!(
            parse_roles(" Admin , ,BucketCreator"),
            vec!["Admin".to_string(), "BucketCreator".to_string()]
        );
        assert!(parse_roles(" , ").is_empty());
    }

    #[test]
    fn cli_values_win_over_defaults() {
        let args = Args::parse_from([
            "job-buckets",
            "--host",
            "127.0.0.1",
            "--port",
            "4100",
            "--database-url",
            "sqlite::memory:",
            "--override-roles",
            "Wizard",
            "--bootstrap-admin",
            " Wiz ",
        ]);
        let cfg = AppConfig::merge(args).unwrap();
        assert_eq!(cfg.addr(), "127.0.0.1:4100");
        assert_eq!(cfg.database_url, "sqlite::memory:");
        assert_eq!(cfg.override_roles, vec!["Wizard".to_string()]);
        assert_eq!(cfg.bootstrap_admin.as_deref(), Some("Wiz"));
    }

    #[test]
    fn empty_role_list_is_an_error() {
        let args = Args::parse_from(["job-buckets", "--port", "1", "--override-roles", ","]);
        assert!(AppConfig::merge(args).is_err());
    }
}
