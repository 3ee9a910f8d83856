use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{GobanaError, Result};
use crate::template;

/// Where the query body comes from and how to prepare it
#[derive(Debug, Clone, Default)]
pub struct QuerySource {
    /// Literal query text
    pub query: Option<String>,
    /// File holding the query text
    pub query_file: Option<PathBuf>,
    /// Render the query as a template against `template_data`
    pub use_template: bool,
    /// `key=value` pairs for template rendering
    pub template_data: Vec<String>,
}

/// Build the final query string.
///
/// Empty strings count as absent, so a config file carrying `query: ""`
/// next to `--queryfile` is not a conflict.
pub fn build_query(source: &QuerySource) -> Result<String> {
    let literal = source.query.as_deref().filter(|q| !q.is_empty());
    let file = source
        .query_file
        .as_deref()
        .filter(|p| !p.as_os_str().is_empty());

    let query = match (literal, file) {
        (Some(query), Some(file)) => {
            tracing::error!(
                query = %query,
                query_file = %file.display(),
                "Can't use exclusive parameters query and queryfile at the same time"
            );
            return Err(GobanaError::ConflictingQuerySource);
        }
        (Some(query), None) => query.to_string(),
        (None, Some(file)) => read_query_file(file)?,
        (None, None) => String::new(),
    };

    if !source.use_template {
        return Ok(query);
    }

    let data = parse_template_data(&source.template_data)?;
    tracing::debug!(keys = data.len(), "Rendering query template");
    template::render(&query, &data)
}

/// Read the query text from `path`, resolved against the current directory
pub fn read_query_file(path: &Path) -> Result<String> {
    tracing::debug!(path = %path.display(), "Reading query from file");

    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|source| GobanaError::QueryFileRead {
                path: path.to_path_buf(),
                source,
            })?
            .join(path)
    };
    tracing::debug!(path = %absolute.display(), "Expand path");

    let query = std::fs::read_to_string(&absolute).map_err(|source| {
        tracing::error!(path = %absolute.display(), error = %source, "Failed to read query file");
        GobanaError::QueryFileRead {
            path: absolute.clone(),
            source,
        }
    })?;

    tracing::info!(path = %absolute.display(), "Read query from file");
    Ok(query)
}

/// Split `key=value` tokens on the first `=`; later keys overwrite earlier ones
pub fn parse_template_data(data: &[String]) -> Result<HashMap<String, String>> {
    let mut fields = HashMap::with_capacity(data.len());
    for datum in data {
        let (key, value) = datum
            .split_once('=')
            .ok_or_else(|| GobanaError::MalformedTemplateDatum(datum.clone()))?;
        fields.insert(key.to_string(), value.to_string());
    }
    Ok(fields)
}
