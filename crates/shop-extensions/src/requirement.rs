//! Evaluation of the `requires` map declared in a manifest.
//!
//! Requirements are informational: the lifecycle layer logs the issues this
//! module reports but never blocks on them. Constraints use Cargo-style
//! semver ranges (`>=1.2`, `^0.3`, `>=1.0, <2.0`). Versions may omit the patch
//! component (`3.12` is read as `3.12.0`).

use std::fmt;

use semver::{Version, VersionReq};

use crate::manifest::ExtensionManifest;

/// One unmet or unreadable requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequirementIssue {
    /// The dependency is not known to the host.
    Missing { dependency: String, constraint: String },
    /// The dependency is present at a version outside the constraint.
    Unsatisfied {
        dependency: String,
        constraint: String,
        found: String,
    },
    /// The constraint string is not a valid semver range.
    InvalidConstraint {
        dependency: String,
        constraint: String,
        reason: String,
    },
    /// The dependency reports a version that cannot be compared.
    InvalidVersion { dependency: String, version: String },
}

impl fmt::Display for RequirementIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing {
                dependency,
                constraint,
            } => write!(f, "requires {dependency} {constraint}, which is not available"),
            Self::Unsatisfied {
                dependency,
                constraint,
                found,
            } => write!(f, "requires {dependency} {constraint}, found {found}"),
            Self::InvalidConstraint {
                dependency,
                constraint,
                reason,
            } => write!(f, "invalid constraint '{constraint}' for {dependency}: {reason}"),
            Self::InvalidVersion {
                dependency,
                version,
            } => write!(f, "{dependency} reports unparseable version '{version}'"),
        }
    }
}

/// Check every declared requirement of `manifest`.
///
/// `resolve` maps a dependency name to the version currently available, or
/// `None` if the host knows nothing by that name.
pub fn check_requirements<F>(manifest: &ExtensionManifest, resolve: F) -> Vec<RequirementIssue>
where
    F: Fn(&str) -> Option<String>,
{
    let mut issues = Vec::new();

    for (dependency, constraint) in &manifest.requires {
        let req = match VersionReq::parse(constraint.trim()) {
            Ok(req) => req,
            Err(e) => {
                issues.push(RequirementIssue::InvalidConstraint {
                    dependency: dependency.clone(),
                    constraint: constraint.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let Some(found) = resolve(dependency) else {
            issues.push(RequirementIssue::Missing {
                dependency: dependency.clone(),
                constraint: constraint.clone(),
            });
            continue;
        };

        match parse_version(&found) {
            Some(version) if req.matches(&version) => {}
            Some(_) => issues.push(RequirementIssue::Unsatisfied {
                dependency: dependency.clone(),
                constraint: constraint.clone(),
                found,
            }),
            None => issues.push(RequirementIssue::InvalidVersion {
                dependency: dependency.clone(),
                version: found,
            }),
        }
    }

    issues
}

/// Parse a version, appending `.0` for a missing patch component.
///
/// - `"3.12"` -> `3.12.0`
/// - `"3.12.1"` -> `3.12.1`
/// - `"3"` -> `None`
pub fn parse_version(s: &str) -> Option<Version> {
    let s = s.trim();
    Version::parse(s)
        .or_else(|_| Version::parse(&format!("{s}.0")))
        .ok()
}
