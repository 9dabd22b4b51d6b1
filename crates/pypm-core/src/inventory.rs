use crate::{same_package, Environment, PackageRecord};

/// Installed packages of one environment as of its last refresh, in the order
/// the installer reported them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inventory {
    environment: Environment,
    packages: Vec<PackageRecord>,
}

impl Inventory {
    pub fn new(environment: Environment, packages: Vec<PackageRecord>) -> Self {
        Self {
            environment,
            packages,
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn packages(&self) -> &[PackageRecord] {
        &self.packages
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn find(&self, name: &str) -> Option<&PackageRecord> {
        self.packages
            .iter()
            .find(|package| same_package(&package.name, name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }
}
