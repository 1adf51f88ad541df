use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Read when `EDUCARE_CONFIG` is not set
pub const DEFAULT_CONFIG_FILE: &str = "educare.toml";

#[derive(Deserialize)]
struct ConfigFile {
    host: Option<String>,
    port: Option<u16>,
    data_file: Option<PathBuf>,
    session_file: Option<PathBuf>,
    supabase_url: Option<String>,
    supabase_anon_key: Option<String>,
    site_url: Option<String>,
    log_level: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cfg {
    pub addr: SocketAddr,
    /// Users, events and password requests
    pub data_file: PathBuf,
    /// Sessions kept with "remember me"
    pub session_file: PathBuf,
    /// Remote backend; offline when unset
    pub supabase_url: Option<String>,
    pub supabase_anon_key: String,
    /// Where confirmation emails send new accounts back to
    pub site_url: Option<String>,
    pub log_level: log::LevelFilter,
}

impl Default for Cfg {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 3030)),
            data_file: PathBuf::from("educare_data.json"),
            session_file: PathBuf::from("educare_session.json"),
            supabase_url: None,
            supabase_anon_key: String::new(),
            site_url: None,
            log_level: log::LevelFilter::Info,
        }
    }
}

impl Cfg {
    /// Reads the file named by `EDUCARE_CONFIG`, or `educare.toml`. A missing default file
    /// means the built-in defaults.
    pub fn load() -> Result<Self, String> {
        match std::env::var_os("EDUCARE_CONFIG") {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::from_file(DEFAULT_CONFIG_FILE),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();
        let file_contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Unable to read config file {:?}: {}", path, &e))?;

        Self::from_toml(&file_contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, String> {
        let cf: ConfigFile = toml::from_str(contents)
            .map_err(|e| format!("Unable to deserialize config file: {}", &e))?;

        let mut c = Self::default();

        if let Some(s) = cf.host {
            c.addr.set_ip(
                s.parse()
                    .map_err(|e| format!("Error parsing {:?} as IP address: {}", &s, &e))?,
            );
        }
        if let Some(n) = cf.port {
            c.addr.set_port(n);
        }
        if let Some(p) = cf.data_file {
            c.data_file = p;
        }
        if let Some(p) = cf.session_file {
            c.session_file = p;
        }
        if let Some(s) = cf.supabase_url.filter(|s| !s.trim().is_empty()) {
            c.supabase_url = Some(s);
        }
        if let Some(s) = cf.supabase_anon_key {
            c.supabase_anon_key = s;
        }
        if let Some(s) = cf.site_url {
            c.site_url = Some(s);
        }
        if let Some(s) = cf.log_level {
            c.log_level = s
                .parse()
                .map_err(|_| format!("Unknown log level {:?}", &s))?;
        }

        Ok(c)
    }
}
