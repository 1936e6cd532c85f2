//! Datacenter selector resolution
//!
//! Operators select datacenters by numeric id or by nickname. Numeric
//! selectors are taken as ids without a lookup; nicknames are resolved
//! against the domain's datacenter list, fetched at most once.

use std::collections::HashSet;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{Datacenter, DatacenterId};
use crate::traits::ConfigService;

/// Resolve selectors to datacenter ids, keeping first-seen order
///
/// # Returns
///
/// - `Ok(ids)`: one id per distinct datacenter
/// - `Err(Error::NotFound)`: a nickname matches no datacenter
pub async fn resolve_datacenters(
    config: &dyn ConfigService,
    domain: &str,
    selectors: &[String],
) -> Result<Vec<DatacenterId>> {
    let mut known: Option<Vec<Datacenter>> = None;
    let mut seen = HashSet::new();
    let mut ids = Vec::with_capacity(selectors.len());

    for selector in selectors {
        let selector = selector.trim();
        let id = match selector.parse::<DatacenterId>() {
            Ok(id) => id,
            Err(_) => {
                if known.is_none() {
                    debug!("Listing datacenters of {} to resolve nicknames", domain);
                    known = Some(config.list_datacenters(domain).await?);
                }
                known
                    .iter()
                    .flatten()
                    .find(|dc| dc.nickname == selector)
                    .map(|dc| dc.datacenter_id)
                    .ok_or_else(|| {
                        Error::not_found(format!(
                            "datacenter {} not found in domain {}",
                            selector, domain
                        ))
                    })?
            }
        };

        if seen.insert(id) {
            ids.push(id);
        }
    }

    Ok(ids)
}
