//! Configuration service over `/config-gtm/v1`
//!
//! ```http
//! GET /config-gtm/v1/domains/{domain}
//! GET /config-gtm/v1/domains/{domain}/properties/{property}
//! PUT /config-gtm/v1/domains/{domain}/properties/{property}
//! GET /config-gtm/v1/domains/{domain}/status/current
//! GET /config-gtm/v1/domains/{domain}/datacenters
//! GET /config-gtm/v1/domains/{domain}/datacenters/{id}
//! ```

use async_trait::async_trait;
use gtm_core::config::ServiceConfig;
use gtm_core::model::{Datacenter, DatacenterId, Domain, Property};
use gtm_core::traits::{ConfigService, DeploymentStatus};
use gtm_core::Result;
use reqwest::Method;
use serde::Deserialize;
use tracing::{debug, info};

use crate::client::ApiClient;

const SERVICE: &str = "config-gtm";
const BASE_PATH: [&str; 3] = ["config-gtm", "v1", "domains"];

/// Body of a successful property PUT
#[derive(Debug, Deserialize)]
struct PropertyUpdateResponse {
    status: DeploymentStatus,
}

/// Body of the datacenter list
#[derive(Debug, Deserialize)]
struct DatacenterList {
    #[serde(default)]
    items: Vec<Datacenter>,
}

/// HTTP configuration service
#[derive(Debug, Clone)]
pub struct HttpConfigService {
    client: ApiClient,
}

impl HttpConfigService {
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        Ok(Self {
            client: ApiClient::new(config)?,
        })
    }

    /// Share an existing client
    pub fn with_client(client: ApiClient) -> Self {
        Self { client }
    }
}

fn domain_path(domain: &str) -> Vec<&str> {
    let mut path: Vec<&str> = BASE_PATH.to_vec();
    path.push(domain);
    path
}

fn property_path<'a>(domain: &'a str, property: &'a str) -> Vec<&'a str> {
    let mut path = domain_path(domain);
    path.extend(["properties", property]);
    path
}

fn status_path(domain: &str) -> Vec<&str> {
    let mut path = domain_path(domain);
    path.extend(["status", "current"]);
    path
}

fn datacenters_path(domain: &str) -> Vec<&str> {
    let mut path = domain_path(domain);
    path.push("datacenters");
    path
}

#[async_trait]
impl ConfigService for HttpConfigService {
    async fn get_domain(&self, name: &str) -> Result<Domain> {
        debug!("Fetching domain {}", name);
        let request = self.client.request(Method::GET, &domain_path(name));
        self.client
            .send_json(request, SERVICE, &format!("domain {}", name))
            .await
    }

    async fn get_property(&self, name: &str, domain: &str) -> Result<Property> {
        debug!("Fetching property {} in {}", name, domain);
        let request = self.client.request(Method::GET, &property_path(domain, name));
        self.client
            .send_json(request, SERVICE, &format!("property {} in domain {}", name, domain))
            .await
    }

    async fn update_property(&self, property: &Property, domain: &str) -> Result<DeploymentStatus> {
        info!("Submitting property {} in {}", property.name, domain);
        let request = self
            .client
            .request(Method::PUT, &property_path(domain, &property.name))
            .json(property);
        let response: PropertyUpdateResponse = self
            .client
            .send_json(
                request,
                SERVICE,
                &format!("property {} in domain {}", property.name, domain),
            )
            .await?;
        Ok(response.status)
    }

    async fn get_domain_status(&self, domain: &str) -> Result<DeploymentStatus> {
        let request = self.client.request(Method::GET, &status_path(domain));
        self.client
            .send_json(request, SERVICE, &format!("status of domain {}", domain))
            .await
    }

    async fn get_datacenter(&self, id: DatacenterId, domain: &str) -> Result<Datacenter> {
        let id_segment = id.to_string();
        let mut path = datacenters_path(domain);
        path.push(id_segment.as_str());
        let request = self.client.request(Method::GET, &path);
        self.client
            .send_json(
                request,
                SERVICE,
                &format!("datacenter {} in domain {}", id, domain),
            )
            .await
    }

    async fn list_datacenters(&self, domain: &str) -> Result<Vec<Datacenter>> {
        let request = self.client.request(Method::GET, &datacenters_path(domain));
        let list: DatacenterList = self
            .client
            .send_json(request, SERVICE, &format!("datacenters of domain {}", domain))
            .await?;
        Ok(list.items)
    }

    fn service_name(&self) -> &'static str {
        SERVICE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gtm_core::traits::PropagationStatus;

    fn client() -> ApiClient {
        ApiClient::new(&ServiceConfig::new("https://host", "token")).unwrap()
    }

    #[test]
    fn test_paths() {
        let client = client();
        assert_eq!(
            client.url(&property_path("example.akadns.net", "www")).as_str(),
            "https://host/config-gtm/v1/domains/example.akadns.net/properties/www"
        );
        assert_eq!(
            client.url(&status_path("example.akadns.net")).as_str(),
            "https://host/config-gtm/v1/domains/example.akadns.net/status/current"
        );
        assert_eq!(
            client.url(&datacenters_path("example.akadns.net")).as_str(),
            "https://host/config-gtm/v1/domains/example.akadns.net/datacenters"
        );
    }

    #[test]
    fn test_property_name_stays_one_segment() {
        let url = client().url(&property_path("example.akadns.net", "www/api v2"));
        assert_eq!(
            url.as_str(),
            "https://host/config-gtm/v1/domains/example.akadns.net/properties/www%2Fapi%20v2"
        );
    }

    #[test]
    fn test_update_response_decoding() {
        let json = r#"{
            "resource": {"name": "www", "trafficTargets": []},
            "status": {
                "changeId": "93a48b86-4fc3-4a5f-9ca2-036835034cc6",
                "message": "Change Pending",
                "passingValidation": true,
                "propagationStatus": "PENDING",
                "propagationStatusDate": "2019-04-25T14:54:00.000+00:00"
            }
        }"#;

        let response: PropertyUpdateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.status.propagation_status, PropagationStatus::Pending);
        assert_eq!(response.status.message, "Change Pending");
    }

    #[test]
    fn test_datacenter_list_decoding() {
        let json = r#"{"items": [
            {"datacenterId": 3131, "nickname": "east", "city": "Boston"},
            {"datacenterId": 3132, "nickname": "west"}
        ]}"#;

        let list: DatacenterList = serde_json::from_str(json).unwrap();
        assert_eq!(list.items.len(), 2);
        assert_eq!(list.items[0].nickname, "east");
        assert!(list.items[0].extra.contains_key("city"));
    }

    #[test]
    fn test_service_name() {
        let service =
            HttpConfigService::new(&ServiceConfig::new("https://host", "token")).unwrap();
        assert_eq!(service.service_name(), "config-gtm");
    }
}
