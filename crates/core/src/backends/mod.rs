pub mod ollama;
pub mod perplexity;

pub use ollama::{OllamaBackend, SamplingOptions, DEFAULT_LOCAL_MODEL, DEFAULT_OLLAMA_URL};
pub use perplexity::{PerplexityBackend, TierModels, DEFAULT_PERPLEXITY_URL};

use url::Url;

/// Joins `path` under `base`, keeping any path prefix `base` carries.
pub fn endpoint_url(base: &Url, path: &str) -> Result<Url, url::ParseError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let prefixed = format!("{}/", base.path());
        base.set_path(&prefixed);
    }
    base.join(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_survives_join() -> Result<(), url::ParseError> {
        let bare = Url::parse("http://localhost:11434")?;
        assert_eq!(
            endpoint_url(&bare, "api/embed")?.as_str(),
            "http://localhost:11434/api/embed"
        );

        let prefixed = Url::parse("http://host/ollama")?;
        assert_eq!(
            endpoint_url(&prefixed, "api/generate")?.as_str(),
            "http://host/ollama/api/generate"
        );

        let slashed = Url::parse("http://host/ollama/")?;
        assert_eq!(
            endpoint_url(&slashed, "api/tags")?.as_str(),
            "http://host/ollama/api/tags"
        );
        Ok(())
    }
}
