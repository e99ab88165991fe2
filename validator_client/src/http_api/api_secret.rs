use rand::{rngs::OsRng, RngCore};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use warp::Filter;

/// The name of the file which stores the API token.
pub const PK_FILENAME: &str = "api-token.txt";

pub const PK_LEN: usize = 32;

/// Every token starts with this prefix, followed by 32 random bytes in hex.
pub const TOKEN_PREFIX: &str = "api-token-0x";

/// Contains the bearer token that authorizes requests to the key-manager API.
///
/// A secret without a token accepts every request. This is only intended for tests and for
/// servers bound to a trusted interface.
#[derive(Clone)]
pub struct ApiSecret {
    token: Option<String>,
    token_path: Option<PathBuf>,
}

impl ApiSecret {
    /// If the token file exists in `dir`, read it. Otherwise generate a new token, write it to
    /// `dir` with owner-only permissions and return it.
    pub fn create_or_open<P: AsRef<Path>>(dir: P) -> Result<Self, String> {
        let token_path = dir.as_ref().join(PK_FILENAME);

        if !token_path.exists() {
            let mut bytes = [0; PK_LEN];
            OsRng.fill_bytes(&mut bytes);
            let token = format!("{}{}", TOKEN_PREFIX, hex::encode(bytes));
            write_token_file(&token_path, &token)
                .map_err(|e| format!("Unable to create {:?}: {:?}", token_path, e))?;
        }

        let contents = fs::read_to_string(&token_path)
            .map_err(|e| format!("Unable to read {:?}: {:?}", token_path, e))?;
        let token = contents.trim().to_string();
        if !token.starts_with(TOKEN_PREFIX) {
            return Err(format!("Invalid API token in {:?}", token_path));
        }

        Ok(Self {
            token: Some(token),
            token_path: Some(token_path),
        })
    }

    /// Use `token` without storing it anywhere.
    pub fn from_token(token: String) -> Self {
        Self {
            token: Some(token),
            token_path: None,
        }
    }

    /// Accept every request without authorization.
    pub fn disabled() -> Self {
        Self {
            token: None,
            token_path: None,
        }
    }

    pub fn api_token(&self) -> Option<String> {
        self.token.clone()
    }

    pub fn api_token_path(&self) -> Option<&Path> {
        self.token_path.as_deref()
    }

    /// Returns a filter that rejects any request without an `Authorization: Bearer <token>` header
    /// matching this secret.
    pub fn authorization_header_filter(&self) -> warp::filters::BoxedFilter<()> {
        let expected = match &self.token {
            Some(token) => format!("{}{}", eth2::lighthouse_vc::BEARER_PREFIX, token),
            None => return warp::any().boxed(),
        };

        warp::any()
            .map(move || expected.clone())
            .and(warp::filters::header::header("Authorization"))
            .and_then(move |expected: String, header: String| async move {
                if header == expected {
                    Ok(())
                } else {
                    Err(warp_utils::reject::invalid_auth(header))
                }
            })
            .untuple_one()
            .boxed()
    }
}

fn write_token_file(path: &Path, token: &str) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(token.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn token_is_persisted() {
        let dir = tempdir().unwrap();
        let first = ApiSecret::create_or_open(dir.path()).unwrap();
        let second = ApiSecret::create_or_open(dir.path()).unwrap();

        let token = first.api_token().unwrap();
        assert!(token.starts_with(TOKEN_PREFIX));
        assert_eq!(token.len(), TOKEN_PREFIX.len() + PK_LEN * 2);
        assert_eq!(first.api_token(), second.api_token());
        assert_eq!(first.api_token_path(), Some(dir.path().join(PK_FILENAME).as_path()));
    }

    #[test]
    fn invalid_token_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(PK_FILENAME), "hello").unwrap();
        assert!(ApiSecret::create_or_open(dir.path()).is_err());
    }

    #[tokio::test]
    async fn filter_checks_bearer_token() {
        let filter = ApiSecret::from_token("abc".to_string()).authorization_header_filter();

        assert!(warp::test::request()
            .header("Authorization", "Bearer abc")
            .matches(&filter)
            .await);
        assert!(!warp::test::request()
            .header("Authorization", "Bearer abd")
            .matches(&filter)
            .await);
        assert!(!warp::test::request().matches(&filter).await);

        let open = ApiSecret::disabled().authorization_header_filter();
        assert!(warp::test::request().matches(&open).await);
    }
}
