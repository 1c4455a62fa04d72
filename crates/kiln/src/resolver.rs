//! # Specifier Resolvers
//!
//! Turns version-specifier candidates into installable asset sources.
//! Candidates are tried in order against the resolver chain; the first
//! resolver to accept one wins. A resolver declines a candidate by
//! returning `Ok(None)`, which is not an error, and signals "applicable
//! but failed" by returning `Err`, which is recorded before the next
//! candidate is tried. Exhausting every candidate fails with all collected
//! errors attached.

use std::sync::Arc;

use tracing::debug;

use depot::AssetSource;
use depot::LoadedAsset;
use depot::StaticSource;

use crate::specifier::VersionSpecifier;

/// Failure from a resolver that accepted a candidate but could not
/// produce its payload.
#[derive(Debug, Clone)]
pub struct ResolverError(pub String);

impl std::fmt::Display for ResolverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ResolverError {}

/// All candidates exhausted without acceptance.
#[derive(Debug, Clone)]
pub struct ResolutionError {
    pub attempts: Vec<(VersionSpecifier, String)>,
}

impl std::fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "no candidate was accepted:")?;
        for (candidate, error) in &self.attempts {
            write!(f, " [{}: {}]", candidate, error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ResolutionError {}

/// The dependency a version change applies to.
#[derive(Debug, Clone)]
pub struct DependencyRequest {
    pub key: String,
    pub package_id: String,
    pub package_folder: String,
}

/// Package-feed collaborator: returns a raw binary blob for a released
/// package version.
#[async_trait::async_trait]
pub trait PackageFeed: Send + Sync + 'static {
    async fn download(
        &self,
        package_id: &str,
        version: &str,
        folder: &str,
    ) -> Result<Vec<u8>, ResolverError>;
}

/// Build-artifact collaborator: returns raw binary blobs for CI builds,
/// pull requests, and branches.
#[async_trait::async_trait]
pub trait ArtifactStore: Send + Sync + 'static {
    async fn download_build(&self, build: u64) -> Result<Vec<u8>, ResolverError>;

    async fn download_pull_request(&self, pull_request: u64) -> Result<Vec<u8>, ResolverError>;

    async fn download_branch(&self, branch: &str) -> Result<Vec<u8>, ResolverError>;
}

/// Tries to turn one candidate into an asset source.
#[async_trait::async_trait]
pub trait SpecifierResolver: Send + Sync + 'static {
    async fn resolve(
        &self,
        candidate: &VersionSpecifier,
        request: &DependencyRequest,
    ) -> Result<Option<Arc<dyn AssetSource>>, ResolverError>;
}

fn component_source(name: &str, bytes: Vec<u8>) -> Arc<dyn AssetSource> {
    Arc::new(StaticSource::new(vec![LoadedAsset::component(name, bytes)]))
}

/// Serves the built-in specifier from a configured default source.
pub struct BuiltInResolver {
    source: Arc<dyn AssetSource>,
}

impl BuiltInResolver {
    pub fn new(source: Arc<dyn AssetSource>) -> Self {
        Self { source }
    }
}

#[async_trait::async_trait]
impl SpecifierResolver for BuiltInResolver {
    async fn resolve(
        &self,
        candidate: &VersionSpecifier,
        _request: &DependencyRequest,
    ) -> Result<Option<Arc<dyn AssetSource>>, ResolverError> {
        match candidate {
            VersionSpecifier::BuiltIn => Ok(Some(self.source.clone())),
            _ => Ok(None),
        }
    }
}

/// Serves exact and latest versions through the package feed.
pub struct FeedResolver {
    feed: Arc<dyn PackageFeed>,
}

impl FeedResolver {
    pub fn new(feed: Arc<dyn PackageFeed>) -> Self {
        Self { feed }
    }
}

#[async_trait::async_trait]
impl SpecifierResolver for FeedResolver {
    async fn resolve(
        &self,
        candidate: &VersionSpecifier,
        request: &DependencyRequest,
    ) -> Result<Option<Arc<dyn AssetSource>>, ResolverError> {
        let version = match candidate {
            VersionSpecifier::Exact(version) => version.to_string(),
            VersionSpecifier::Latest => "latest".to_string(),
            _ => return Ok(None),
        };

        let bytes = self
            .feed
            .download(&request.package_id, &version, &request.package_folder)
            .await?;
        debug!(package = %request.package_id, version = %version, "feed package downloaded");
        Ok(Some(component_source(&request.package_id, bytes)))
    }
}

/// Serves builds, pull requests, and branches through the artifact store.
pub struct ArtifactResolver {
    store: Arc<dyn ArtifactStore>,
}

impl ArtifactResolver {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl SpecifierResolver for ArtifactResolver {
    async fn resolve(
        &self,
        candidate: &VersionSpecifier,
        request: &DependencyRequest,
    ) -> Result<Option<Arc<dyn AssetSource>>, ResolverError> {
        let bytes = match candidate {
            VersionSpecifier::Build(n) => self.store.download_build(*n).await?,
            VersionSpecifier::PullRequest(n) => self.store.download_pull_request(*n).await?,
            VersionSpecifier::Branch(name) => self.store.download_branch(name).await?,
            _ => return Ok(None),
        };
        debug!(candidate = %candidate, "artifact downloaded");
        Ok(Some(component_source(&request.package_id, bytes)))
    }
}

/// Walks candidates in order against the resolver chain.
///
/// Returns the first accepted source. A candidate's resolver error ends
/// that candidate (the error is recorded and the next candidate is
/// tried); a candidate no resolver takes is recorded as unsupported.
pub async fn resolve_candidates(
    candidates: &[VersionSpecifier],
    request: &DependencyRequest,
    resolvers: &[Arc<dyn SpecifierResolver>],
) -> Result<Arc<dyn AssetSource>, ResolutionError> {
    let mut attempts = Vec::new();

    for candidate in candidates {
        let mut error: Option<String> = None;

        for resolver in resolvers {
            match resolver.resolve(candidate, request).await {
                Ok(Some(source)) => return Ok(source),
                Ok(None) => continue,
                Err(e) => {
                    error = Some(e.to_string());
                    break;
                }
            }
        }

        let error = error.unwrap_or_else(|| "no resolver supports this specifier".to_string());
        attempts.push((candidate.clone(), error));
    }

    Err(ResolutionError { attempts })
}
