//! Resource fetching, shader compilation and device uploads.
//!
//! - `shader` compiles and links programs and resolves their locations
//! - `upload` turns float/index arrays and decoded images into device resources
//!
//! [`Fetcher`] is the asynchronous source of shader text and images. The
//! bundled [`AssetFetcher`] reads from the `assets/` directory on native
//! targets and from `<origin>/assets/` over HTTP on the web.

use std::future::Future;
#[cfg(not(target_arch = "wasm32"))]
use std::path::PathBuf;

use crate::errors::FetchError;

pub mod shader;
pub mod upload;

/// Asynchronous access to text and image resources.
///
/// Both calls fail with a [`FetchError`] naming the path when the resource is
/// missing, the transport reports a non-success status or the payload cannot
/// be decoded.
pub trait Fetcher {
    fn fetch_text(&self, path: &str) -> impl Future<Output = Result<String, FetchError>>;

    fn fetch_image(
        &self,
        path: &str,
    ) -> impl Future<Output = Result<image::DynamicImage, FetchError>>;
}

/// Fetches resources relative to an asset root.
#[derive(Clone, Debug)]
pub struct AssetFetcher {
    #[cfg(not(target_arch = "wasm32"))]
    root: PathBuf,
    #[cfg(target_arch = "wasm32")]
    root: String,
}

impl AssetFetcher {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            #[cfg(not(target_arch = "wasm32"))]
            root: PathBuf::from(root.into()),
            #[cfg(target_arch = "wasm32")]
            root: root.into(),
        }
    }

    async fn load_binary(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        #[cfg(target_arch = "wasm32")]
        let data = {
            let url = format_url(&self.root, path)?;
            let response = reqwest::get(url)
                .await
                .and_then(|response| response.error_for_status())
                .map_err(|e| FetchError::new(path, e))?;
            response
                .bytes()
                .await
                .map_err(|e| FetchError::new(path, e))?
                .to_vec()
        };
        #[cfg(not(target_arch = "wasm32"))]
        let data = tokio::fs::read(self.root.join(path))
            .await
            .map_err(|e| FetchError::new(path, e))?;

        Ok(data)
    }
}

impl Default for AssetFetcher {
    fn default() -> Self {
        Self::new("assets")
    }
}

impl Fetcher for AssetFetcher {
    async fn fetch_text(&self, path: &str) -> Result<String, FetchError> {
        let data = self.load_binary(path).await?;
        String::from_utf8(data).map_err(|e| FetchError::new(path, e))
    }

    async fn fetch_image(&self, path: &str) -> Result<image::DynamicImage, FetchError> {
        let data = self.load_binary(path).await?;
        image::load_from_memory(&data).map_err(|e| FetchError::new(path, e))
    }
}

#[cfg(target_arch = "wasm32")]
fn format_url(root: &str, file_name: &str) -> Result<reqwest::Url, FetchError> {
    let origin = web_sys::window()
        .and_then(|window| window.location().origin().ok())
        .ok_or_else(|| FetchError::new(file_name, "no window origin to resolve against"))?;
    let base = reqwest::Url::parse(&format!("{}/{}/", origin, root.trim_matches('/')))
        .map_err(|e| FetchError::new(file_name, e))?;
    base.join(file_name).map_err(|e| FetchError::new(file_name, e))
}
