//! Test identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A test function qualified by the package that declares it.
///
/// The qualified name `package:Name` is the only identity key used for
/// maps, report output and baseline matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TestId {
    /// Package import path (e.g. `github.com/foo/bar/pkg`).
    pub package: String,
    /// Test function name (e.g. `TestParse`).
    pub name: String,
}

impl TestId {
    /// Create a new test identity.
    pub fn new(package: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            name: name.into(),
        }
    }

    /// The package-qualified name (`package:Name`).
    pub fn qualified_name(&self) -> String {
        format!("{}:{}", self.package, self.name)
    }

    /// Last path segment of the package.
    pub fn package_base(&self) -> &str {
        self.package
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&self.package)
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.package, self.name)
    }
}
