use chrono::{DateTime, NaiveDate};
use std::collections::{BTreeMap, HashSet};

use crate::models::datasets::entities::{DeploymentMap, Entity, Mint, PerformUpkeep, UpkeepCheck};
use crate::models::errors::StorageError;
use crate::storage::{EntityStore, load_all};

/// The oldest `first` entities of one kind, ordered by block timestamp ascending (ties broken by id).
pub fn first_by_timestamp<E: Entity>(
    store: &dyn EntityStore,
    first: usize,
) -> Result<Vec<E>, StorageError> {
    let mut entities = load_all::<E>(store)?;
    entities.sort_by_key(|entity| (entity.provenance().block_timestamp, entity.id()));
    entities.truncate(first);
    Ok(entities)
}

/// Headline numbers shown on the deployments dashboard.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardStats {
    pub total_mints: usize,
    pub total_deployments: usize,
    pub unique_owners: usize,
    /// Deployments per mint. `None` until something has been minted.
    pub deployment_rate: Option<f64>,
    pub upkeep_runs: usize,
    pub upkeep_checks: usize,
    pub deployments_per_day: BTreeMap<NaiveDate, usize>,
}

impl DashboardStats {
    pub fn collect(store: &dyn EntityStore) -> Result<Self, StorageError> {
        let mints = load_all::<Mint>(store)?;
        let deployments = load_all::<DeploymentMap>(store)?;
        let upkeep_runs = load_all::<PerformUpkeep>(store)?.len();
        let upkeep_checks = load_all::<UpkeepCheck>(store)?.len();

        let unique_owners = deployments
            .iter()
            .map(|deployment| deployment.record_owner)
            .collect::<HashSet<_>>()
            .len();

        let deployment_rate = if mints.is_empty() {
            None
        } else {
            Some(deployments.len() as f64 / mints.len() as f64)
        };

        let mut deployments_per_day = BTreeMap::new();
        for deployment in &deployments {
            let day = i64::try_from(deployment.provenance.block_timestamp)
                .ok()
                .and_then(|ts| DateTime::from_timestamp(ts, 0))
                .map(|dt| dt.date_naive());
            if let Some(day) = day {
                *deployments_per_day.entry(day).or_insert(0) += 1;
            }
        }

        Ok(Self {
            total_mints: mints.len(),
            total_deployments: deployments.len(),
            unique_owners,
            deployment_rate,
            upkeep_runs,
            upkeep_checks,
            deployments_per_day,
        })
    }
}
