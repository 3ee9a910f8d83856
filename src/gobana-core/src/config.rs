use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::handler::DEFAULT_ENDPOINT;
use crate::query::QuerySource;

/// Settings shared by `gobana` and `elastui`, read from `gobana.yml` /
/// `elastui.yml` and overridden by command-line flags.
///
/// Keys are lowercase without separators to stay compatible with existing
/// config files.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub ssl: bool,
    pub validatessl: bool,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// 0 = off, 1-2 = error, 3 = warn, 4 = info, 5 = debug
    pub loglevel: u8,
    /// Log file; empty logs to the console
    pub logfile: String,
    pub proxy: String,
    pub socks: bool,

    // gobana
    pub query: String,
    pub queryfile: String,
    /// Render the query as a template (historical name)
    pub toml: bool,
    pub data: Vec<String>,
    pub endpoint: String,
    pub jsonoutput: String,
    pub singlevalue: String,
    pub aggregation: String,
    pub valueonly: bool,

    // elastui
    /// Listen address; empty picks `0.0.0.0:8443` with TLS, `0.0.0.0:8080` without
    pub listen: String,
    pub static_dir: String,
    pub tls_cert: String,
    pub tls_key: String,
}

/// Connection parameters for the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub use_ssl: bool,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub validate_ssl: bool,
    pub proxy: String,
    pub proxy_is_socks: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            use_ssl: false,
            host: "localhost".to_string(),
            port: 9200,
            user: String::new(),
            password: String::new(),
            validate_ssl: true,
            proxy: String::new(),
            proxy_is_socks: false,
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl Config {
    /// Load a YAML config file, or JSON when the extension is `.json`
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let config: Config = if is_json {
            serde_json::from_str(&contents)?
        } else if contents.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(&contents)?
        };
        Ok(config)
    }

    pub fn connection(&self) -> ConnectionConfig {
        ConnectionConfig {
            use_ssl: self.ssl,
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            password: self.password.clone(),
            validate_ssl: self.validatessl,
            proxy: self.proxy.clone(),
            proxy_is_socks: self.socks,
        }
    }

    pub fn query_source(&self) -> QuerySource {
        QuerySource {
            query: non_empty(&self.query),
            query_file: non_empty(&self.queryfile).map(PathBuf::from),
            use_template: self.toml,
            template_data: self.data.clone(),
        }
    }

    /// Verbose result dumps are tied to the highest log level
    pub fn verbose(&self) -> bool {
        self.loglevel >= 5
    }
}

impl Default for Config {
    fn default() -> Self {
        let connection = ConnectionConfig::default();
        Self {
            ssl: connection.use_ssl,
            validatessl: connection.validate_ssl,
            host: connection.host,
            port: connection.port,
            user: String::new(),
            password: String::new(),
            loglevel: 5,
            logfile: String::new(),
            proxy: String::new(),
            socks: false,
            query: String::new(),
            queryfile: String::new(),
            toml: false,
            data: Vec::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            jsonoutput: String::new(),
            singlevalue: String::new(),
            aggregation: String::new(),
            valueonly: false,
            listen: String::new(),
            static_dir: "static".to_string(),
            tls_cert: "server.crt".to_string(),
            tls_key: "server.key".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(!config.ssl);
        assert!(config.validatessl);
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 9200);
        assert_eq!(config.loglevel, 5);
        assert_eq!(config.endpoint, "_search");
        assert!(config.verbose());
        assert_eq!(config.connection(), ConnectionConfig::default());
    }

    #[test]
    fn test_load_yaml_partial() {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(
            file,
            "host: es.example.com\nport: 9243\nssl: true\nvalidatessl: false\ndata:\n  - env=prod\n  - size=5\nloglevel: 3"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.host, "es.example.com");
        assert_eq!(config.port, 9243);
        assert!(config.ssl);
        assert!(!config.validatessl);
        assert_eq!(config.data, vec!["env=prod", "size=5"]);
        assert!(!config.verbose());
        // untouched keys keep defaults
        assert_eq!(config.endpoint, "_search");
        assert_eq!(config.static_dir, "static");
    }

    #[test]
    fn test_load_json() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"user":"elastic","password":"secret","socks":true,"proxy":"127.0.0.1:1080"}}"#).unwrap();

        let connection = Config::load(file.path()).unwrap().connection();
        assert_eq!(connection.user, "elastic");
        assert_eq!(connection.password, "secret");
        assert!(connection.proxy_is_socks);
        assert_eq!(connection.proxy, "127.0.0.1:1080");
    }

    #[test]
    fn test_load_empty_yaml() {
        let file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.port, 9200);
    }

    #[test]
    fn test_load_errors() {
        assert!(Config::load("/definitely/not/here/gobana.yml").is_err());

        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(file, "port: not-a-number").unwrap();
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_query_source_treats_empty_as_absent() {
        let config = Config {
            queryfile: "query.json".to_string(),
            toml: true,
            data: vec!["a=1".to_string()],
            ..Default::default()
        };
        let source = config.query_source();
        assert!(source.query.is_none());
        assert_eq!(source.query_file, Some(PathBuf::from("query.json")));
        assert!(source.use_template);
        assert_eq!(source.template_data, vec!["a=1"]);
    }
}
