use log::info;

use crate::OrchestratorError;

/// Where the replicas run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cluster {
    /// One blocking task per replica inside this process.
    Local,
}

impl Cluster {
    pub const LOCAL_ADDRESS: &'static str = "local";

    /// Resolves a cluster address.
    ///
    /// # Arguments
    /// * `address` - The cluster to connect to, in process if unset or `local`.
    ///
    /// # Errors
    /// `OrchestratorError::UnsupportedAddress` for any other address.
    pub fn connect(address: Option<&str>) -> Result<Self, OrchestratorError> {
        match address.map(str::trim) {
            None | Some("") => {
                info!("no cluster address given, running workers in process");
                Ok(Self::Local)
            }
            Some(Self::LOCAL_ADDRESS) => {
                info!("running workers in process");
                Ok(Self::Local)
            }
            Some(other) => Err(OrchestratorError::UnsupportedAddress(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_local_clusters_connect() {
        assert_eq!(Cluster::connect(None).unwrap(), Cluster::Local);
        assert_eq!(Cluster::connect(Some(" local ")).unwrap(), Cluster::Local);
        assert!(matches!(
            Cluster::connect(Some("10.0.0.1:6379")),
            Err(OrchestratorError::UnsupportedAddress(addr)) if addr == "10.0.0.1:6379"
        ));
    }
}
