//! Per-owner private namespaces for stored files.
//!
//! Every owner gets `<root>/<owner>/`. A caller-supplied resource name resolves inside
//! that directory or not at all; any attempt to leave it is `Forbidden`.

use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

use crate::services::error::ServiceError;

#[derive(Debug, Clone)]
pub struct ResourceNamespace {
    root: PathBuf,
}

impl ResourceNamespace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding `owner`'s files.
    pub fn owner_dir(&self, owner: &str) -> Result<PathBuf, ServiceError> {
        let mut components = Path::new(owner).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(segment)), None) if segment == OsStr::new(owner) => {
                Ok(self.root.join(segment))
            }
            _ => Err(escape(owner, owner)),
        }
    }

    /// Lexically resolve `name` under `owner`'s namespace.
    ///
    /// Absolute names, parent segments and drive prefixes are refused. `.` segments are
    /// dropped. Nothing on disk is consulted.
    pub fn resolve(&self, owner: &str, name: &str) -> Result<PathBuf, ServiceError> {
        let mut resolved = self.owner_dir(owner)?;
        let mut depth = 0usize;

        for component in Path::new(name).components() {
            match component {
                Component::Normal(segment) => {
                    resolved.push(segment);
                    depth += 1;
                }
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(escape(owner, name));
                }
            }
        }

        if depth == 0 {
            return Err(escape(owner, name));
        }
        Ok(resolved)
    }

    /// Resolve `name` and confirm the file exists and, after following symlinks, still
    /// lies inside the owner's directory.
    pub async fn resolve_existing(&self, owner: &str, name: &str) -> Result<PathBuf, ServiceError> {
        let lexical = self.resolve(owner, name)?;

        let owner_dir = tokio::fs::canonicalize(self.owner_dir(owner)?)
            .await
            .map_err(|e| missing(owner, name, e))?;
        let target = tokio::fs::canonicalize(&lexical)
            .await
            .map_err(|e| missing(owner, name, e))?;

        if !target.starts_with(&owner_dir) || target == owner_dir {
            return Err(escape(owner, name));
        }
        Ok(target)
    }
}

fn escape(owner: &str, name: &str) -> ServiceError {
    tracing::warn!(owner = %owner, name = %name, "Resource name escapes owner namespace");
    ServiceError::Forbidden(format!("resource {:?} is outside {:?}'s namespace", name, owner))
}

fn missing(owner: &str, name: &str, err: std::io::Error) -> ServiceError {
    if err.kind() == std::io::ErrorKind::NotFound {
        ServiceError::NotFound(format!("resource {:?} of {:?}", name, owner))
    } else {
        ServiceError::Storage(anyhow::Error::new(err))
    }
}
