use async_trait::async_trait;

use crate::views::View;
use crate::Error;

/// Converts stored bytes between views.
#[async_trait]
pub trait ViewTransformEngine: Send + Sync {
    /// Converts the object at `location` from view `from` into view `to`,
    /// and returns the location of the converted object.
    async fn transform(&self, location: &str, from: &str, to: &str) -> Result<String, Error>;
}

/// Serves every object as stored, and refuses actual conversions.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityTransform;

#[async_trait]
impl ViewTransformEngine for IdentityTransform {
    async fn transform(&self, location: &str, from: &str, to: &str) -> Result<String, Error> {
        if from == to || to == View::Default.uri() || to == View::Any.uri() {
            return Ok(location.to_string());
        }
        Err(Error::ViewNotSupported(format!(
            "cannot transform {} into {}",
            from, to
        )))
    }
}
