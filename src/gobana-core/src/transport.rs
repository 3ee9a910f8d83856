/// Transport sends a query body to the engine and returns the raw response.
///
/// A non-2xx status is not an error at this level; the body is returned
/// for the caller to interpret.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, path: &str, body: &[u8]) -> anyhow::Result<Vec<u8>>;
}
