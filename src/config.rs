use std::{net::SocketAddr, path::PathBuf};

pub const DEFAULT_UPLOAD_FOLDER: &str = "static/uploads";
pub const DEFAULT_CAPTION_API_URL: &str =
    "https://api-inference.huggingface.co/models/Salesforce/blip-image-captioning-base";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5000";

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("missing environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value {value:?} for {var}")]
    Invalid { var: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Where and how the captioning service is reached.
#[derive(Clone, Debug)]
pub struct CaptionConfig {
    pub endpoint: String,
    pub token: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub upload_root: PathBuf,
    pub caption: CaptionConfig,
    /// Cap on the whole request body, multipart framing included.
    pub max_upload_bytes: usize,
    pub bind_addr: SocketAddr,
}

impl Config {
    /// Reads the process environment, after loading `.env` if one exists.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_vars(|key| dotenv::var(key).ok())
    }

    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let upload_root = var("UPLOAD_FOLDER")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_FOLDER));
        let endpoint = var("CAPTION_API_URL").unwrap_or_else(|| DEFAULT_CAPTION_API_URL.to_string());
        let token = var("CAPTION_API_TOKEN").ok_or(Error::Missing("CAPTION_API_TOKEN"))?;
        let max_upload_bytes: usize = match var("MAX_UPLOAD_BYTES") {
            Some(value) => value.trim().parse().map_err(|_| Error::Invalid {
                var: "MAX_UPLOAD_BYTES",
                value,
            })?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };
        let bind_addr = var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr: SocketAddr = bind_addr.trim().parse().map_err(|_| Error::Invalid {
            var: "BIND_ADDR",
            value: bind_addr.clone(),
        })?;

        Ok(Self {
            upload_root,
            caption: CaptionConfig {
                endpoint: endpoint.trim().to_string(),
                token: token.trim().to_string(),
            },
            max_upload_bytes,
            bind_addr,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_token_is_set() {
        let config = Config::from_vars(lookup(&[("CAPTION_API_TOKEN", "hf_secret")])).unwrap();
        assert_eq!(config.upload_root, PathBuf::from(DEFAULT_UPLOAD_FOLDER));
        assert_eq!(config.caption.endpoint, DEFAULT_CAPTION_API_URL);
        assert_eq!(config.caption.token, "hf_secret");
        assert_eq!(config.max_upload_bytes, 16 * 1024 * 1024);
        assert_eq!(config.bind_addr, "127.0.0.1:5000".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn overrides_are_read() {
        let config = Config::from_vars(lookup(&[
            ("CAPTION_API_TOKEN", "t"),
            ("UPLOAD_FOLDER", "/srv/albums"),
            ("CAPTION_API_URL", "http://localhost:9000/caption"),
            ("MAX_UPLOAD_BYTES", "1024"),
            ("BIND_ADDR", "0.0.0.0:8080"),
        ]))
        .unwrap();
        assert_eq!(config.upload_root, PathBuf::from("/srv/albums"));
        assert_eq!(config.caption.endpoint, "http://localhost:9000/caption");
        assert_eq!(config.max_upload_bytes, 1024);
        assert_eq!(config.bind_addr.port(), 8080);
    }

    #[test]
    fn token_is_required() {
        let err = Config::from_vars(lookup(&[("CAPTION_API_TOKEN", "  ")])).unwrap_err();
        assert!(matches!(err, Error::Missing("CAPTION_API_TOKEN")));
    }

    #[test]
    fn bad_numbers_are_rejected() {
        let err = Config::from_vars(lookup(&[
            ("CAPTION_API_TOKEN", "t"),
            ("MAX_UPLOAD_BYTES", "lots"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Invalid { var: "MAX_UPLOAD_BYTES", .. }));
    }
}
