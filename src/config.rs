use anyhow::{anyhow, Result};
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct PictoriaConfig {
    pub api_port: u16,
    pub paths: PictoriaPaths,
    pub auth: AuthConfig,
}

impl PictoriaConfig {
    pub fn from_env() -> Result<Self> {
        let paths = PictoriaPaths::discover()?;
        let api_port = env::var("PICTORIA_API_PORT")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(8080);
        let auth = AuthConfig::from_env()?;
        Ok(Self {
            api_port,
            paths,
            auth,
        })
    }

    pub fn new(api_port: u16, paths: PictoriaPaths, auth: AuthConfig) -> Self {
        Self {
            api_port,
            paths,
            auth,
        }
    }
}

/// Token issuer parameters. When `shared_secret` is set the server verifies
/// HS256 tokens locally instead of fetching the issuer's JWKS, which is what
/// the integration tests use.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub issuer_base_url: Option<String>,
    pub audience: String,
    pub shared_secret: Option<String>,
}

impl AuthConfig {
    pub fn from_env() -> Result<Self> {
        let issuer_base_url = env::var("OAUTH_ISSUER_BASE_URL").ok().and_then(|raw| {
            let trimmed = raw.trim().trim_end_matches('/').to_string();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed)
            }
        });
        let audience = env::var("OAUTH_AUDIENCE").unwrap_or_default();
        let shared_secret = env::var("PICTORIA_AUTH_SECRET").ok().filter(|s| !s.is_empty());
        if issuer_base_url.is_none() && shared_secret.is_none() {
            return Err(anyhow!(
                "either OAUTH_ISSUER_BASE_URL or PICTORIA_AUTH_SECRET must be set"
            ));
        }
        Ok(Self {
            issuer_base_url,
            audience,
            shared_secret,
        })
    }

    pub fn with_secret(secret: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            issuer_base_url: None,
            audience: audience.into(),
            shared_secret: Some(secret.into()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PictoriaPaths {
    pub base: PathBuf,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub logs_dir: PathBuf,
}

impl PictoriaPaths {
    /// Resolves the data layout from `PICTORIA_DATA_DIR`, falling back to the
    /// directory the executable lives in. `PICTORIA_DB_PATH` overrides the
    /// database file location.
    pub fn discover() -> Result<Self> {
        let base = match env::var("PICTORIA_DATA_DIR") {
            Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => {
                let exe_path = std::env::current_exe()
                    .map_err(|err| anyhow!("failed to resolve current executable: {err}"))?;
                exe_path
                    .parent()
                    .ok_or_else(|| anyhow!("executable path missing parent"))?
                    .to_path_buf()
            }
        };
        let mut paths = Self::from_base_dir(base)?;
        if let Ok(db_path) = env::var("PICTORIA_DB_PATH") {
            if !db_path.trim().is_empty() {
                paths.db_path = PathBuf::from(db_path);
            }
        }
        Ok(paths)
    }

    pub fn from_base_dir<P: AsRef<Path>>(base: P) -> Result<Self> {
        let base = base.as_ref().to_path_buf();
        let data_dir = base.join("data");
        let db_path = data_dir.join("pictoria.db");
        let logs_dir = base.join("logs");
        Ok(Self {
            base,
            data_dir,
            db_path,
            logs_dir,
        })
    }
}
