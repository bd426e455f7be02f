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

use std::path::Path;
use serde_json::Value;
use tracing::{debug,info,warn};
use mapcrop_common::net::DownloadProgress;

use crate::{
    Export, ExportId, ExportStatus, PlanId, 
    errors::{DroneDeployError, Result, shape_error},
    gateway::{QueryGateway, extract},
    query::{get_exports_query, create_export_mutation, get_export_query}
};

/// typed DroneDeploy export operations on top of a [QueryGateway]
pub struct DroneDeployClient<G: QueryGateway> {
    gateway: G
}

impl<G: QueryGateway> DroneDeployClient<G> {
    pub fn new (gateway: G)->Self {
        DroneDeployClient { gateway }
    }

    pub fn gateway (&self)->&G { &self.gateway }

    /// the first `limit` exports of `plan`. Exports we can't decode are skipped since they can't match
    /// what we are looking for
    pub async fn get_exports (&self, plan: &PlanId, limit: u32) -> Result<Vec<Export>> {
        let query = get_exports_query( plan, limit)?;
        let response = self.gateway.execute( &query).await?;

        let edges: Vec<Value> = extract( &response, "data.node.exports.edges")?;
        let mut exports = Vec::with_capacity( edges.len());
        for edge in &edges {
            match extract::<Export>( edge, "node") {
                Ok(export) => exports.push( export),
                Err(e) => warn!("skipping export of plan {}: {}", plan, e)
            }
        }
        Ok(exports)
    }

    /// the first of the (first `limit`) plan exports that is a GeoTIFF orthomosaic of given resolution
    /// and has one of the provided `statuses`
    pub async fn find_export (&self, plan: &PlanId, resolution: u32, statuses: &[ExportStatus], limit: u32) -> Result<Option<Export>> {
        let exports = self.get_exports( plan, limit).await?;
        debug!("plan {} has {} exports", plan, exports.len());

        Ok( exports.into_iter().find( |e| e.is_orthomosaic_geotiff( resolution) && statuses.contains( &e.status)) )
    }

    /// request a new orthomosaic export, returning its id
    pub async fn create_export (&self, plan: &PlanId, resolution: u32) -> Result<ExportId> {
        let query = create_export_mutation( plan, resolution)?;
        let response = self.gateway.execute( &query).await?;

        let id: String = extract( &response, "data.createExport.export.id")?;
        ExportId::new( &id).map_err( |_| shape_error!("invalid export id {:?}", id))
    }

    pub async fn get_export (&self, id: &ExportId) -> Result<Export> {
        let query = get_export_query( id)?;
        let response = self.gateway.execute( &query).await?;
        extract( &response, "data.export")
    }

    /// download the artifact of a COMPLETE export to `path`. Any other status is an IncompleteExport error
    /// and does not download anything
    pub async fn download_export (&self, id: &ExportId, path: &Path, progress: &mut (dyn DownloadProgress + Send)) -> Result<u64> {
        let export = self.get_export( id).await?;
        if export.status != ExportStatus::Complete {
            return Err( DroneDeployError::IncompleteExport { id: id.to_string(), status: export.status.to_string() })
        }

        let url = export.download_path.as_deref().ok_or_else( || shape_error!("no downloadPath for complete export {}", id))?;
        info!("downloading export {} to {:?}", id, path);
        self.gateway.fetch_artifact( url, path, progress).await
    }
}
