//! Command-line flags and the glue between flags, config file and handler

use anyhow::{Context, Result};
use clap::{Args, Parser};
use gobana_core::{Config, Gobana, HandlerOptions};
use gobana_rs::Connection;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Process exit codes
pub mod exit {
    pub const CONFIG: u8 = 10;
    pub const BUILD: u8 = 20;
    pub const EXECUTE: u8 = 21;
    pub const OUTPUT: u8 = 22;
}

/// Flags shared by `gobana` and `elastui`
#[derive(Args, Debug, Default)]
pub struct CommonArgs {
    /// Configuration file
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Use SSL
    #[arg(short = 's', long, num_args = 0..=1, default_missing_value = "true")]
    pub ssl: Option<bool>,

    /// Validate SSL certificate
    #[arg(short = 'v', long, num_args = 0..=1, default_missing_value = "true")]
    pub validatessl: Option<bool>,

    /// Hostname of the server
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// Network port
    #[arg(short = 'P', long)]
    pub port: Option<u16>,

    /// Username for Elasticsearch
    #[arg(short = 'u', long)]
    pub user: Option<String>,

    /// Password for the Elasticsearch user
    #[arg(short = 'p', long)]
    pub password: Option<String>,

    /// Log level (0 = off .. 5 = debug)
    #[arg(short = 'l', long)]
    pub loglevel: Option<u8>,

    /// Log file (defaults to the console)
    #[arg(short = 'L', long)]
    pub logfile: Option<String>,

    /// Proxy (defaults to none)
    #[arg(short = 'y', long)]
    pub proxy: Option<String>,

    /// This is a SOCKS proxy
    #[arg(short = 'Y', long, num_args = 0..=1, default_missing_value = "true")]
    pub socks: Option<bool>,
}

impl CommonArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(ssl) = self.ssl {
            config.ssl = ssl;
        }
        if let Some(validatessl) = self.validatessl {
            config.validatessl = validatessl;
        }
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(user) = &self.user {
            config.user = user.clone();
        }
        if let Some(password) = &self.password {
            config.password = password.clone();
        }
        if let Some(loglevel) = self.loglevel {
            config.loglevel = loglevel;
        }
        if let Some(logfile) = &self.logfile {
            config.logfile = logfile.clone();
        }
        if let Some(proxy) = &self.proxy {
            config.proxy = proxy.clone();
        }
        if let Some(socks) = self.socks {
            config.socks = socks;
        }
    }
}

/// Run a query against Elasticsearch and print values from the result
#[derive(Parser, Debug)]
#[command(name = "gobana", disable_version_flag = true)]
pub struct GobanaCli {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Query to pass along
    #[arg(short = 'q', long)]
    pub query: Option<String>,

    /// File containing a query
    #[arg(short = 'Q', long)]
    pub queryfile: Option<String>,

    /// Render the query as a template with --data
    #[arg(short = 't', long, alias = "template", num_args = 0..=1, default_missing_value = "true")]
    pub toml: Option<bool>,

    /// Data to pass to template rendering, use key=value
    #[arg(short = 'd', long, value_delimiter = ',')]
    pub data: Vec<String>,

    /// API endpoint
    #[arg(short = 'e', long)]
    pub endpoint: Option<String>,

    /// Output the result json into this file
    #[arg(short = 'J', long)]
    pub jsonoutput: Option<String>,

    /// Output one single result value from the hits
    #[arg(short = 'S', long)]
    pub singlevalue: Option<String>,

    /// Output one aggregation
    #[arg(short = 'A', long)]
    pub aggregation: Option<String>,

    /// Output only the value
    #[arg(short = 'V', long, num_args = 0..=1, default_missing_value = "true")]
    pub valueonly: Option<bool>,
}

impl GobanaCli {
    pub const DEFAULT_CONFIG: &'static str = "gobana.yml";

    /// Merge flags over the config file over defaults
    pub fn load_config(&self) -> Result<(Config, ConfigOrigin)> {
        let (mut config, origin) = read_config(self.common.config.as_deref(), Self::DEFAULT_CONFIG)?;
        self.common.apply(&mut config);

        if let Some(query) = &self.query {
            config.query = query.clone();
        }
        if let Some(queryfile) = &self.queryfile {
            config.queryfile = queryfile.clone();
        }
        if let Some(toml) = self.toml {
            config.toml = toml;
        }
        if !self.data.is_empty() {
            config.data = self.data.clone();
        }
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = endpoint.clone();
        }
        if let Some(jsonoutput) = &self.jsonoutput {
            config.jsonoutput = jsonoutput.clone();
        }
        if let Some(singlevalue) = &self.singlevalue {
            config.singlevalue = singlevalue.clone();
        }
        if let Some(aggregation) = &self.aggregation {
            config.aggregation = aggregation.clone();
        }
        if let Some(valueonly) = self.valueonly {
            config.valueonly = valueonly;
        }
        Ok((config, origin))
    }
}

/// Web front end proxying API calls to Elasticsearch
#[derive(Parser, Debug)]
#[command(name = "elastui", version)]
pub struct ElastuiCli {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Listen address (default 0.0.0.0:8443 with TLS, 0.0.0.0:8080 without)
    #[arg(long)]
    pub listen: Option<String>,

    /// Directory served under /static
    #[arg(long)]
    pub static_dir: Option<String>,

    /// TLS certificate; TLS is enabled when it exists
    #[arg(long)]
    pub tls_cert: Option<String>,

    /// TLS private key
    #[arg(long)]
    pub tls_key: Option<String>,
}

impl ElastuiCli {
    pub const DEFAULT_CONFIG: &'static str = "elastui.yml";

    pub fn load_config(&self) -> Result<(Config, ConfigOrigin)> {
        let (mut config, origin) = read_config(self.common.config.as_deref(), Self::DEFAULT_CONFIG)?;
        self.common.apply(&mut config);

        if let Some(listen) = &self.listen {
            config.listen = listen.clone();
        }
        if let Some(static_dir) = &self.static_dir {
            config.static_dir = static_dir.clone();
        }
        if let Some(tls_cert) = &self.tls_cert {
            config.tls_cert = tls_cert.clone();
        }
        if let Some(tls_key) = &self.tls_key {
            config.tls_key = tls_key.clone();
        }
        Ok((config, origin))
    }
}

/// Where the settings came from; reported once logging is up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    File(PathBuf),
    /// The default config file does not exist
    Defaults(PathBuf),
}

impl ConfigOrigin {
    pub fn log(&self) {
        match self {
            ConfigOrigin::File(path) => tracing::debug!(path = %path.display(), "Read config"),
            ConfigOrigin::Defaults(path) => {
                tracing::warn!(path = %path.display(), "Config file not found, using defaults")
            }
        }
    }
}

/// An explicit config file must be readable; a missing default one is not an error
fn read_config(explicit: Option<&Path>, default_name: &str) -> Result<(Config, ConfigOrigin)> {
    match explicit {
        Some(path) => {
            let config = Config::load(path)
                .with_context(|| format!("Can't read config '{}'", path.display()))?;
            Ok((config, ConfigOrigin::File(path.to_path_buf())))
        }
        None => {
            let path = PathBuf::from(default_name);
            if path.exists() {
                let config = Config::load(&path)
                    .with_context(|| format!("Can't read config '{}'", path.display()))?;
                Ok((config, ConfigOrigin::File(path)))
            } else {
                Ok((Config::default(), ConfigOrigin::Defaults(path)))
            }
        }
    }
}

/// Build the query handler from merged settings
pub fn build_handler(config: &Config) -> Result<Gobana> {
    let connection = Connection::new(&config.connection()).context("Can't create connection")?;
    let handler = Gobana::new(
        Arc::new(connection),
        &config.query_source(),
        config.endpoint.as_str(),
        HandlerOptions {
            verbose: config.verbose(),
        },
    )?;
    Ok(handler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn config_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    #[test]
    fn test_short_flags() {
        let cli = GobanaCli::try_parse_from([
            "gobana", "-s", "-H", "es.local", "-P", "9243", "-u", "elastic", "-p", "pw", "-l", "3",
            "-q", r#"{"size":0}"#, "-t", "-d", "a=1,b=2", "-d", "c=3", "-e", "logs/_search", "-S",
            "name", "-A", "by_status", "-V", "-J", "out.json",
        ])
        .unwrap();

        assert_eq!(cli.common.ssl, Some(true));
        assert_eq!(cli.common.host.as_deref(), Some("es.local"));
        assert_eq!(cli.common.port, Some(9243));
        assert_eq!(cli.toml, Some(true));
        assert_eq!(cli.data, vec!["a=1", "b=2", "c=3"]);
        assert_eq!(cli.valueonly, Some(true));
        assert_eq!(cli.jsonoutput.as_deref(), Some("out.json"));
    }

    #[test]
    fn test_bool_flag_accepts_explicit_value() {
        let cli = GobanaCli::try_parse_from(["gobana", "--validatessl=false", "--template"]).unwrap();
        assert_eq!(cli.common.validatessl, Some(false));
        assert_eq!(cli.toml, Some(true));
    }

    #[test]
    fn test_flags_override_config_file() {
        let file = config_file("host: from-file\nport: 9300\nuser: file-user\nquery: '{}'\nloglevel: 2\n");
        let cli = GobanaCli::try_parse_from([
            "gobana",
            "-c",
            file.path().to_str().unwrap(),
            "-H",
            "from-flag",
        ])
        .unwrap();

        let (config, origin) = cli.load_config().unwrap();
        assert_eq!(origin, ConfigOrigin::File(file.path().to_path_buf()));
        assert_eq!(config.host, "from-flag");
        assert_eq!(config.port, 9300);
        assert_eq!(config.user, "file-user");
        assert_eq!(config.query, "{}");
        assert_eq!(config.loglevel, 2);
        // neither file nor flag
        assert_eq!(config.endpoint, "_search");
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let cli = GobanaCli::try_parse_from(["gobana", "-c", "/definitely/not/here.yml"]).unwrap();
        assert!(cli.load_config().is_err());
    }

    #[test]
    fn test_elastui_flags() {
        let file = config_file("static_dir: /srv/ui\ntls_cert: none.crt\n");
        let cli = ElastuiCli::try_parse_from([
            "elastui",
            "--config",
            file.path().to_str().unwrap(),
            "--listen",
            "127.0.0.1:9000",
            "--socks",
            "--proxy",
            "127.0.0.1:1080",
        ])
        .unwrap();

        let (config, _) = cli.load_config().unwrap();
        assert_eq!(config.listen, "127.0.0.1:9000");
        assert_eq!(config.static_dir, "/srv/ui");
        assert_eq!(config.tls_cert, "none.crt");
        assert_eq!(config.tls_key, "server.key");
        assert!(config.connection().proxy_is_socks);
    }

    #[test]
    fn test_build_handler() {
        let config = Config {
            query: r#"{"query":{"match":{"user":"{{.user}}"}}}"#.to_string(),
            toml: true,
            data: vec!["user=bob".to_string()],
            endpoint: "/logs/_search".to_string(),
            ..Default::default()
        };
        let handler = build_handler(&config).unwrap();
        assert_eq!(handler.query(), r#"{"query":{"match":{"user":"bob"}}}"#);
        assert_eq!(handler.endpoint(), "logs/_search");

        let conflicting = Config {
            query: "{}".to_string(),
            queryfile: "query.json".to_string(),
            ..Default::default()
        };
        assert!(build_handler(&conflicting).is_err());
    }
}
