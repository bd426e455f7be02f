/*
 * Copyright © 2025, United States Government, as represented by the Administrator of 
 * the National Aeronautics and Space Administration. All rights reserved.
 *
 * The “ODIN” software is licensed under the Apache License, Version 2.0 (the "License"); 
 * you may not use this file except in compliance with the License. You may obtain a copy 
 * of the License at http://www.apache.org/licenses/LICENSE-2.0.
 *
 * Unless required by applicable law or agreed to in writing, software distributed under
 * the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND,
 * either express or implied. See the License for the specific language governing permissions
 * and limitations under the License.
 */

//! the export acquisition state machine: find or create an export, poll it until it is complete,
//! then retrieve its archive and extract the raster
//!
//! ```text
//! None ──> FoundInFlight | Requested ──> Polling ──> Complete ──> Retrieved
//! ```
//! Note that finding an in-flight export and creating a new one are not atomic. Concurrent
//! acquisitions for the same plan and resolution can still create duplicate exports.

use std::{path::{Path,PathBuf}, time::Duration};
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug,info,warn};
use mapcrop_common::{
    fs::extract_first_raster,
    net::{DownloadProgress, ProgressBar}
};

use crate::{
    ARCHIVE_NAME, DroneDeployConfig, Export, ExportId, ExportStatus, PlanId,
    client::DroneDeployClient,
    errors::{DroneDeployError, Result},
    gateway::QueryGateway
};

/// how often and how long we poll an export
#[derive(Debug,Clone,PartialEq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: Option<u32>,
    pub deadline: Option<Duration>
}

impl Default for PollPolicy {
    fn default()->Self {
        PollPolicy { interval: Duration::from_secs(5), max_attempts: None, deadline: None }
    }
}

impl From<&DroneDeployConfig> for PollPolicy {
    fn from (config: &DroneDeployConfig)->Self {
        PollPolicy { interval: config.poll_interval, max_attempts: config.max_poll_attempts, deadline: config.poll_timeout }
    }
}

#[derive(Debug,Clone,PartialEq)]
pub enum AcquisitionState {
    None,
    /// reusing an export with matching parameters that was already queued or processing
    FoundInFlight(ExportId),
    /// created a new export
    Requested(ExportId),
    Polling { id: ExportId, attempts: u32 },
    Complete(Export),
    /// archive retrieved into the contained path
    Retrieved(PathBuf)
}

pub struct ExportAcquisition<G: QueryGateway> {
    client: DroneDeployClient<G>,
    policy: PollPolicy,
    export_limit: u32,
    cancel: CancellationToken,
    state: AcquisitionState
}

impl<G: QueryGateway> ExportAcquisition<G> {
    pub fn new (gateway: G, policy: PollPolicy, export_limit: u32, cancel: CancellationToken)->Self {
        ExportAcquisition { client: DroneDeployClient::new( gateway), policy, export_limit, cancel, state: AcquisitionState::None }
    }

    pub fn from_config (gateway: G, config: &DroneDeployConfig, cancel: CancellationToken)->Self {
        Self::new( gateway, PollPolicy::from(config), config.export_limit, cancel)
    }

    pub fn state (&self)->&AcquisitionState { &self.state }

    pub fn cancel_token (&self)->&CancellationToken { &self.cancel }

    pub fn client (&self)->&DroneDeployClient<G> { &self.client }

    /// reuse an in-flight GeoTIFF orthomosaic export of `plan` with `resolution` or request a new one
    pub async fn acquire (&mut self, plan: &PlanId, resolution: u32) -> Result<ExportId> {
        if self.cancel.is_cancelled() {
            return Err( DroneDeployError::Cancelled)
        }
        let in_flight = [ExportStatus::Processing, ExportStatus::Queued];

        if let Some(export) = self.client.find_export( plan, resolution, &in_flight, self.export_limit).await? {
            let id = export.export_id()?;
            info!("export job {} with identical parameters already {}, using that one", id, export.status);
            self.state = AcquisitionState::FoundInFlight( id.clone());
            Ok(id)

        } else {
            let id = self.client.create_export( plan, resolution).await?;
            info!("export job {} started", id);
            self.state = AcquisitionState::Requested( id.clone());
            Ok(id)
        }
    }

    /// fetch the export until it is COMPLETE. Any failed fetch aborts polling. Polling also ends with an error
    /// if the export FAILED, on cancellation, or when the policy attempt or deadline limits are exceeded
    pub async fn poll (&mut self, id: &ExportId) -> Result<Export> {
        let start = Instant::now();
        let mut attempts: u32 = 0;

        loop {
            if self.cancel.is_cancelled() {
                return Err( DroneDeployError::Cancelled)
            }

            let export = self.client.get_export( id).await?;
            attempts += 1;
            self.state = AcquisitionState::Polling { id: id.clone(), attempts };

            match export.status {
                ExportStatus::Complete => {
                    info!("export job {} complete after {} polls", id, attempts);
                    self.state = AcquisitionState::Complete( export.clone());
                    return Ok(export)
                }
                ExportStatus::Failed => {
                    warn!("export job {} failed", id);
                    return Err( DroneDeployError::ExportFailed( id.to_string()))
                }
                status => {
                    if let Some(max_attempts) = self.policy.max_attempts && attempts >= max_attempts {
                        return Err( DroneDeployError::PollLimitExceeded { attempts })
                    }
                    if let Some(deadline) = self.policy.deadline && start.elapsed() + self.policy.interval > deadline {
                        return Err( DroneDeployError::PollDeadlineExceeded( deadline))
                    }

                    info!("export job {} {}, waiting {:?}...{}", id, status, self.policy.interval, ".".repeat(attempts as usize));
                    tokio::select! {
                        _ = self.cancel.cancelled() => return Err( DroneDeployError::Cancelled),
                        _ = sleep( self.policy.interval) => {}
                    }
                }
            }
        }
    }

    /// download the archive of a COMPLETE export to `path`. This re-fetches the export and fails
    /// with IncompleteExport for any other status. Cancellation aborts the download and removes the partial file
    pub async fn retrieve (&mut self, id: &ExportId, path: &Path, progress: &mut (dyn DownloadProgress + Send)) -> Result<u64> {
        if self.cancel.is_cancelled() {
            return Err( DroneDeployError::Cancelled)
        }

        let len = tokio::select! {
            _ = self.cancel.cancelled() => {
                warn!("download of export {} cancelled", id);
                remove_partial( path);
                return Err( DroneDeployError::Cancelled)
            }
            res = self.client.download_export( id, path, progress) => res?
        };
        debug!("retrieved {} bytes for export {}", len, id);
        self.state = AcquisitionState::Retrieved( path.to_path_buf());
        Ok(len)
    }

    /// the complete acquisition of a GeoTIFF orthomosaic: acquire, poll, retrieve to `<dst_dir>/dronedeploy.zip`
    /// and extract the first raster, returning its path
    pub async fn get_geotiff (&mut self, plan: &PlanId, resolution: u32, dst_dir: &Path) -> Result<PathBuf> {
        let id = self.acquire( plan, resolution).await?;
        self.poll( &id).await?;

        let zip_path = dst_dir.join( ARCHIVE_NAME);
        let mut progress = ProgressBar::default();
        self.retrieve( &id, &zip_path, &mut progress).await?;

        if self.cancel.is_cancelled() {
            return Err( DroneDeployError::Cancelled)
        }
        info!("unzipping {:?}", zip_path);
        let path = extract_first_raster( &zip_path, dst_dir)?;
        info!("extracted {:?}", path);
        Ok(path)
    }
}

fn remove_partial (path: &Path) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file( path) {
            warn!("failed to remove partial download {:?}: {}", path, e);
        }
    }
}
