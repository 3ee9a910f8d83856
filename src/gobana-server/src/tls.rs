use anyhow::{anyhow, bail, Context, Result};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

/// Build the TLS config for elastui.
///
/// Returns `None` when the certificate file does not exist, which means
/// plain HTTP. A certificate without its key is an error.
pub fn load_server_config(cert_path: &str, key_path: &str) -> Result<Option<ServerConfig>> {
    if !Path::new(cert_path).exists() {
        tracing::debug!(cert = %cert_path, "No certificate, TLS disabled");
        return Ok(None);
    }
    if !Path::new(key_path).exists() {
        bail!("Certificate '{}' found but key '{}' is missing", cert_path, key_path);
    }

    let certs = load_certs(cert_path)?;
    let key = load_key(key_path)?;

    let config = ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .context("Failed to select TLS protocol versions")?
    .with_no_client_auth()
    .with_single_cert(certs, key)
    .context("Failed to build server TLS config")?;

    tracing::info!(cert = %cert_path, key = %key_path, "TLS enabled");
    Ok(Some(config))
}

fn load_certs(path: &str) -> Result<Vec<CertificateDer<'static>>> {
    let file = File::open(path).with_context(|| format!("Failed to open cert file '{}'", path))?;
    let certs = rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to parse certificates in '{}'", path))?;

    if certs.is_empty() {
        bail!("No certificates found in '{}'", path);
    }
    Ok(certs)
}

fn load_key(path: &str) -> Result<PrivateKeyDer<'static>> {
    let file = File::open(path).with_context(|| format!("Failed to open key file '{}'", path))?;
    rustls_pemfile::private_key(&mut BufReader::new(file))
        .with_context(|| format!("Failed to parse private key in '{}'", path))?
        .ok_or_else(|| anyhow!("No private key found in '{}'", path))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path_str(path: &Path) -> &str {
        path.to_str().unwrap()
    }

    #[test]
    fn test_no_certificate_means_plain_http() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("server.crt");
        let key = dir.path().join("server.key");
        assert!(load_server_config(path_str(&cert), path_str(&key)).unwrap().is_none());
    }

    #[test]
    fn test_certificate_without_key() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("server.crt");
        std::fs::write(&cert, "").unwrap();
        let key = dir.path().join("server.key");

        let err = load_server_config(path_str(&cert), path_str(&key)).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_empty_pem_files_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("server.crt");
        let key = dir.path().join("server.key");
        std::fs::write(&cert, "not a certificate\n").unwrap();
        std::fs::write(&key, "not a key\n").unwrap();

        let err = load_server_config(path_str(&cert), path_str(&key)).unwrap_err();
        assert!(err.to_string().contains("No certificates found"));
    }
}
