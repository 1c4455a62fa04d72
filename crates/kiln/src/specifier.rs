//! # Version Specifiers
//!
//! Parses a user-supplied version string into the ordered list of candidate
//! interpretations, tried in priority order against the resolver chain.

/// One interpretation of a requested version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSpecifier {
    /// The compiled-in default payload set.
    BuiltIn,
    /// An exact released version.
    Exact(semver::Version),
    /// The newest released version.
    Latest,
    /// A CI build id.
    Build(u64),
    /// The latest build of a pull request.
    PullRequest(u64),
    /// The latest build of a branch.
    Branch(String),
}

impl std::fmt::Display for VersionSpecifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BuiltIn => write!(f, "built-in"),
            Self::Exact(v) => write!(f, "version {}", v),
            Self::Latest => write!(f, "latest"),
            Self::Build(n) => write!(f, "build {}", n),
            Self::PullRequest(n) => write!(f, "pull request {}", n),
            Self::Branch(name) => write!(f, "branch '{}'", name),
        }
    }
}

/// Expands a raw version string into candidates, most specific first.
///
/// - empty/blank: the built-in payload set
/// - `latest`: the newest release
/// - a positive integer: a pull request, then a raw build id
/// - a semantic version: that exact release, then a branch of that name
/// - anything else: a branch name
pub fn parse(raw: &str) -> Vec<VersionSpecifier> {
    let raw = raw.trim();

    if raw.is_empty() {
        return vec![VersionSpecifier::BuiltIn];
    }

    if raw == "latest" {
        return vec![VersionSpecifier::Latest];
    }

    if let Ok(n) = raw.parse::<u64>() {
        if n > 0 {
            return vec![VersionSpecifier::PullRequest(n), VersionSpecifier::Build(n)];
        }
    }

    let mut candidates = Vec::new();
    if let Ok(version) = semver::Version::parse(raw) {
        candidates.push(VersionSpecifier::Exact(version));
    }
    candidates.push(VersionSpecifier::Branch(raw.to_string()));
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_maps_to_built_in() {
        assert_eq!(parse(""), vec![VersionSpecifier::BuiltIn]);
        assert_eq!(parse("   "), vec![VersionSpecifier::BuiltIn]);
    }

    #[test]
    fn latest_is_literal() {
        assert_eq!(parse("latest"), vec![VersionSpecifier::Latest]);
    }

    #[test]
    fn positive_integer_tries_pull_request_then_build() {
        assert_eq!(
            parse("42"),
            vec![VersionSpecifier::PullRequest(42), VersionSpecifier::Build(42)]
        );
    }

    #[test]
    fn zero_is_not_a_build_number() {
        assert_eq!(parse("0"), vec![VersionSpecifier::Branch("0".into())]);
    }

    #[test]
    fn semver_falls_through_to_branch() {
        let version = semver::Version::parse("4.12.0").unwrap();
        assert_eq!(
            parse("4.12.0"),
            vec![
                VersionSpecifier::Exact(version),
                VersionSpecifier::Branch("4.12.0".into())
            ]
        );
    }

    #[test]
    fn anything_else_is_a_branch() {
        assert_eq!(parse("main"), vec![VersionSpecifier::Branch("main".into())]);
    }
}
