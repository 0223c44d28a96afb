//! Member backend client lookup.

use std::collections::HashMap;
use std::sync::Arc;

use url::Url;

use crate::client::FhirClient;
use crate::config::{ConfigError, MemberConfig};

/// One [`FhirClient`] per federation member, keyed by member id.
///
/// All clients share one HTTP connection pool.
#[derive(Debug, Clone)]
pub struct ClientRegistry {
    clients: HashMap<String, Arc<FhirClient>>,
}

impl ClientRegistry {
    /// Builds clients for every member over a shared HTTP pool.
    pub fn from_members(
        members: &[MemberConfig],
        http: reqwest::Client,
    ) -> Result<Self, ConfigError> {
        let mut clients = HashMap::with_capacity(members.len());
        for member in members {
            let base_url = Url::parse(&member.url).map_err(|_| ConfigError::InvalidMemberUrl {
                member: member.id.clone(),
                url: member.url.clone(),
            })?;
            clients.insert(
                member.id.clone(),
                Arc::new(FhirClient::new(member.id.clone(), base_url, http.clone())),
            );
        }
        Ok(Self { clients })
    }

    /// Returns the client for a member id.
    pub fn client(&self, member: &str) -> Option<Arc<FhirClient>> {
        self.clients.get(member).cloned()
    }

    /// Number of registered members.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Whether no members are registered.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Iterates over all clients, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<FhirClient>)> {
        self.clients.iter().map(|(id, client)| (id.as_str(), client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn members() -> Vec<MemberConfig> {
        vec![
            MemberConfig {
                id: "alpha".to_string(),
                url: "http://backend-a.example/fhir".to_string(),
            },
            MemberConfig {
                id: "beta".to_string(),
                url: "http://backend-b.example/fhir/".to_string(),
            },
        ]
    }

    #[test]
    fn test_registry_holds_all_members() {
        let registry = ClientRegistry::from_members(&members(), reqwest::Client::new()).unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.client("alpha").is_some());
        assert!(registry.client("gamma").is_none());
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let members = vec![MemberConfig {
            id: "broken".to_string(),
            url: "not a url".to_string(),
        }];
        let err = ClientRegistry::from_members(&members, reqwest::Client::new()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidMemberUrl { .. }));
    }
}
