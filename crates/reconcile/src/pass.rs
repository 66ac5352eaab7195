use crate::owner::{OwnerReconciler, OwnerReport};
use crate::system::{SystemReconciler, SystemReport};
use std::sync::Arc;
use std::time::Duration;
use tarifsync_core::common::time::TimeProvider;
use tarifsync_core::config::SyncConfig;
use tarifsync_core::store::port::{AuthProvider, OwnerDirectory, PersistenceSink, WatermarkSource};
use tarifsync_core::sync::entity::{ChargeOwnerState, Watermark};
use tarifsync_core::sync::error::SyncError;
use tarifsync_core::tariff::port::TariffSource;
use tracing::{error, info};

/// Adapters a sync pass runs against.
pub struct SyncPorts {
    pub auth: Arc<dyn AuthProvider>,
    pub watermarks: Arc<dyn WatermarkSource>,
    pub owners: Arc<dyn OwnerDirectory>,
    pub source: Arc<dyn TariffSource>,
    pub sink: Arc<dyn PersistenceSink>,
    pub clock: Arc<dyn TimeProvider>,
}

/// What one pass did.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub watermark: Watermark,
    pub owners: Vec<OwnerReport>,
    // owner windows as they stood when the pass ended
    pub final_states: Vec<ChargeOwnerState>,
    pub system: Option<SystemReport>,
}

impl SyncReport {
    pub fn charges_inserted(&self) -> usize {
        self.owners.iter().map(OwnerReport::inserted).sum()
    }

    pub fn failed_writes(&self) -> usize {
        self.owners.iter().map(OwnerReport::failed_writes).sum::<usize>()
            + self.system.as_ref().map_or(0, |s| s.failed_writes)
    }
}

/// # Summary
/// One complete synchronization run.
///
/// # Invariants
/// - Only login, watermark and owner directory failures abort the pass;
///   everything after that is isolated per owner or per date.
/// - Owners are processed one after another.
pub struct SyncPass {
    auth: Arc<dyn AuthProvider>,
    watermarks: Arc<dyn WatermarkSource>,
    owners: Arc<dyn OwnerDirectory>,
    owner_reconciler: OwnerReconciler,
    system_reconciler: SystemReconciler,
    settings: SyncConfig,
}

impl SyncPass {
    pub fn new(ports: SyncPorts, settings: SyncConfig) -> Self {
        let owner_reconciler = OwnerReconciler::new(
            ports.source.clone(),
            ports.sink.clone(),
            ports.clock.clone(),
            Duration::from_millis(settings.insert_delay_ms),
        );
        let system_reconciler = SystemReconciler::new(ports.source, ports.sink, ports.clock);
        Self {
            auth: ports.auth,
            watermarks: ports.watermarks,
            owners: ports.owners,
            owner_reconciler,
            system_reconciler,
            settings,
        }
    }

    /// # Summary
    /// Runs login, owner catch-up and the system tariff loop.
    ///
    /// # Logic
    /// 1. Log in and read the watermark.
    /// 2. When charges are enabled, load the owners and reconcile each.
    /// 3. When system tariffs are enabled, run the system loop.
    ///
    /// # Returns
    /// The report, or `SyncError` when the pass could not start.
    pub async fn run(&self) -> Result<SyncReport, SyncError> {
        let token = self.auth.login().await.map_err(|e| {
            error!("Login failed: {}", e);
            SyncError::AuthFailure(e)
        })?;
        info!("Token received");

        let watermark = self.watermarks.watermark(&token).await.map_err(|e| {
            error!("Failed to retrieve watermark: {}", e);
            SyncError::WatermarkUnavailable(e)
        })?;
        info!(
            "Watermark: charges {:?}, taxes {:?}, tarifs {:?}",
            watermark.charges_max_date, watermark.taxes_max_date, watermark.tarifs_max_date
        );

        let mut owner_reports = Vec::new();
        let mut final_states = Vec::new();
        if self.settings.charges {
            let mut states = self
                .owners
                .charge_owners_with_last_charge(&token)
                .await
                .map_err(|e| {
                    error!("Failed to retrieve charge owners: {}", e);
                    SyncError::OwnerDirectory(e)
                })?;
            info!("Reconciling {} charge owners", states.len());
            for state in &mut states {
                owner_reports.push(self.owner_reconciler.reconcile(state, &token).await);
            }
            final_states = states;
        }

        let system = if self.settings.system_tariffs {
            Some(self.system_reconciler.reconcile(&token).await)
        } else {
            None
        };

        let report = SyncReport {
            watermark,
            owners: owner_reports,
            final_states,
            system,
        };
        info!(
            "Sync pass finished: {} charges inserted, {} failed writes, system {:?}",
            report.charges_inserted(),
            report.failed_writes(),
            report.system.as_ref().map(|s| &s.outcome)
        );
        Ok(report)
    }
}
