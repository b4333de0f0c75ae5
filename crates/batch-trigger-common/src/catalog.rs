//! Workload instance catalog
//!
//! The compute environment's `maxvCpus` is derived from the requested
//! instance type and count, so only types listed here are accepted.

use crate::defaults::MAX_WORKLOAD_INSTANCES;
use thiserror::Error;

/// Instance types accepted for the workload, with their vCPU counts
const INSTANCE_VCPUS: &[(&str, u32)] = &[
    ("m5.large", 2),
    ("m5.xlarge", 4),
    ("m5.2xlarge", 8),
    ("m5.4xlarge", 16),
    ("m5.8xlarge", 32),
    ("m5.12xlarge", 48),
    ("m5.16xlarge", 64),
    ("m5.24xlarge", 96),
    ("m5.metal", 96),
    ("m5d.large", 2),
    ("m5d.xlarge", 4),
    ("m5d.2xlarge", 8),
    ("m5d.4xlarge", 16),
    ("m5d.8xlarge", 32),
    ("m5d.12xlarge", 48),
    ("m5d.16xlarge", 64),
    ("m5d.24xlarge", 96),
    ("m5d.metal", 96),
];

/// Errors from sizing the compute environment
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    /// Instance type is not in the catalog
    #[error("Not a valid instance type: {0}")]
    UnknownInstanceType(String),

    /// Requested more instances than allowed
    #[error("Maximum instance limit reached: requested {requested}, limit {limit}")]
    TooManyInstances { requested: u32, limit: u32 },

    /// Requested zero instances
    #[error("Number of instances must be at least 1")]
    NoInstances,
}

/// Look up the vCPU count of a workload instance type.
pub fn vcpus_for(instance_type: &str) -> Option<u32> {
    INSTANCE_VCPUS
        .iter()
        .find(|(name, _)| *name == instance_type)
        .map(|(_, vcpus)| *vcpus)
}

/// Compute the compute environment's `maxvCpus` for `count` instances of `instance_type`.
pub fn max_vcpus(instance_type: &str, count: u32) -> Result<u32, CatalogError> {
    let vcpus = vcpus_for(instance_type)
        .ok_or_else(|| CatalogError::UnknownInstanceType(instance_type.to_string()))?;

    if count == 0 {
        return Err(CatalogError::NoInstances);
    }
    if count > MAX_WORKLOAD_INSTANCES {
        return Err(CatalogError::TooManyInstances {
            requested: count,
            limit: MAX_WORKLOAD_INSTANCES,
        });
    }

    Ok(count * vcpus)
}

/// All instance types in the catalog.
pub fn known_instance_types() -> impl Iterator<Item = &'static str> {
    INSTANCE_VCPUS.iter().map(|(name, _)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_vcpus_multiplies() {
        assert_eq!(max_vcpus("m5.xlarge", 3), Ok(12));
        assert_eq!(max_vcpus("m5d.metal", 1), Ok(96));
    }

    #[test]
    fn test_max_vcpus_at_limit() {
        assert_eq!(max_vcpus("m5.large", 100), Ok(200));
        assert_eq!(
            max_vcpus("m5.large", 101),
            Err(CatalogError::TooManyInstances {
                requested: 101,
                limit: 100
            })
        );
    }

    #[test]
    fn test_unknown_type() {
        assert_eq!(
            max_vcpus("t2.micro", 1),
            Err(CatalogError::UnknownInstanceType("t2.micro".to_string()))
        );
    }

    #[test]
    fn test_zero_instances() {
        assert_eq!(max_vcpus("m5.large", 0), Err(CatalogError::NoInstances));
    }

    #[test]
    fn test_every_known_type_resolves() {
        for name in known_instance_types() {
            assert!(vcpus_for(name).is_some(), "{name} missing");
        }
    }
}
