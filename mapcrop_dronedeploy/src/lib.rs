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
#![allow(unused)]

//! access to DroneDeploy orthomosaic exports through its GraphQL API

use std::{fmt, path::Path, time::Duration};
use serde::{Serialize,Deserialize,Deserializer};
use lazy_static::lazy_static;
use regex::Regex;
use mapcrop_common::{
    config::load_config_path,
    datetime::{secs, deserialize_duration, serialize_duration, deserialize_optional_duration, serialize_optional_duration}
};

pub mod errors;
pub use errors::{Result,DroneDeployError};

pub mod query;
pub mod gateway;
pub use gateway::{QueryGateway,LiveGateway};

pub mod client;
pub use client::DroneDeployClient;

pub mod acquisition;
pub use acquisition::{ExportAcquisition,AcquisitionState,PollPolicy};

pub const DEFAULT_URL: &str = "https://api.dronedeploy.com/graphql";
pub const ORTHOMOSAIC: &str = "ORTHOMOSAIC";
pub const GEO_TIFF: &str = "GEO_TIFF";
pub const EPSG_4326: u32 = 4326;

/// name of the downloaded export archive within the destination dir
pub const ARCHIVE_NAME: &str = "dronedeploy.zip";

/// deserialized from config file
#[derive(Debug,Clone,Serialize,Deserialize)]
#[serde(default)]
pub struct DroneDeployConfig {
    pub url: String,
    pub api_key: Option<String>,

    /// number of exports we search for in-flight duplicates
    pub export_limit: u32,

    #[serde(deserialize_with="deserialize_duration", serialize_with="serialize_duration")]
    pub poll_interval: Duration,

    pub max_poll_attempts: Option<u32>,

    #[serde(deserialize_with="deserialize_optional_duration", serialize_with="serialize_optional_duration")]
    pub poll_timeout: Option<Duration>,
}

impl Default for DroneDeployConfig {
    fn default()->Self {
        DroneDeployConfig {
            url: DEFAULT_URL.to_string(),
            api_key: None,
            export_limit: 100,
            poll_interval: secs(5),
            max_poll_attempts: None,
            poll_timeout: None
        }
    }
}

impl DroneDeployConfig {
    pub fn load (path: impl AsRef<Path>) -> Result<Self> {
        Ok( load_config_path( path)? )
    }
}

/* #region identifiers **************************************************************************/

lazy_static! {
    static ref ID_RE: Regex = Regex::new( r"^[A-Za-z0-9_-]+$").unwrap();
}

fn normalize_id (id: &str, prefix: &str) -> Result<String> {
    let id = id.trim();
    let bare = id.strip_prefix(prefix).unwrap_or(id);
    if ID_RE.is_match( bare) {
        Ok( bare.to_string() )
    } else {
        Err( DroneDeployError::InvalidId( id.to_string()))
    }
}

/// a map plan identifier, with or without "MapPlan:" type prefix
#[derive(Debug,Clone,PartialEq,Eq,Hash)]
pub struct PlanId(String);

impl PlanId {
    pub const PREFIX: &'static str = "MapPlan:";

    pub fn new (id: &str) -> Result<Self> { Ok( PlanId( normalize_id( id, Self::PREFIX)?)) }

    pub fn as_str (&self)->&str { self.0.as_str() }

    /// the global node id used in queries
    pub fn node_id (&self)->String { format!("{}{}", Self::PREFIX, self.0) }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// an export identifier, with or without "Export:" type prefix
#[derive(Debug,Clone,PartialEq,Eq,Hash)]
pub struct ExportId(String);

impl ExportId {
    pub const PREFIX: &'static str = "Export:";

    pub fn new (id: &str) -> Result<Self> { Ok( ExportId( normalize_id( id, Self::PREFIX)?)) }

    pub fn as_str (&self)->&str { self.0.as_str() }

    pub fn node_id (&self)->String { format!("{}{}", Self::PREFIX, self.0) }
}

impl fmt::Display for ExportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/* #endregion identifiers */

/* #region export model *************************************************************************/

#[derive(Debug,Clone,Copy,PartialEq,Eq,Serialize,Deserialize)]
#[serde(rename_all="SCREAMING_SNAKE_CASE")]
pub enum ExportStatus {
    Queued,
    Processing,
    Complete,
    Failed,
    #[serde(other)]
    Unknown
}

impl ExportStatus {
    pub fn is_in_flight (&self)->bool {
        matches!( self, ExportStatus::Queued | ExportStatus::Processing)
    }
}

impl fmt::Display for ExportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExportStatus::Queued => "QUEUED",
            ExportStatus::Processing => "PROCESSING",
            ExportStatus::Complete => "COMPLETE",
            ExportStatus::Failed => "FAILED",
            ExportStatus::Unknown => "UNKNOWN",
        };
        write!(f, "{s}")
    }
}

/// the export parameters we query. All are optional since the field set differs between queries.
/// Exports created by other clients can have fractional resolutions
#[derive(Debug,Clone,Default,PartialEq,Serialize,Deserialize)]
#[serde(rename_all="camelCase")]
pub struct ExportParameters {
    pub resolution: Option<f64>,
    pub layer: Option<String>,
    pub file_format: Option<String>,
    pub projection: Option<u32>,
    pub merge: Option<bool>,
    pub contour_interval: Option<f64>,
}

#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
#[serde(rename_all="camelCase")]
pub struct Export {
    pub id: String,
    pub status: ExportStatus,
    #[serde(default,deserialize_with="null_as_default")]
    pub parameters: ExportParameters,
    #[serde(default)]
    pub download_path: Option<String>,
}

fn null_as_default<'de,D,T> (deserializer: D) -> std::result::Result<T,D::Error>
    where D: Deserializer<'de>, T: Default + Deserialize<'de>
{
    Ok( Option::<T>::deserialize( deserializer)?.unwrap_or_default() )
}

impl Export {
    pub fn export_id (&self) -> Result<ExportId> { ExportId::new( &self.id) }

    /// is this a GeoTIFF orthomosaic with the given resolution
    pub fn is_orthomosaic_geotiff (&self, resolution: u32)->bool {
        let p = &self.parameters;
        p.resolution == Some(resolution as f64)
            && p.layer.as_deref() == Some(ORTHOMOSAIC) 
            && p.file_format.as_deref() == Some(GEO_TIFF)
    }
}

/* #endregion export model */
