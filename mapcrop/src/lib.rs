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

//! the mapcrop pipeline: acquire a DroneDeploy orthomosaic export, construct a geodesic boundary around
//! a location of interest, then bound and clip the downloaded GeoTIFF with it. Each step writes its result
//! into the destination dir:
//! ```text
//!   <dst>/dronedeploy.zip   the export archive
//!   <dst>/<raster>.tif      the first raster extracted from it
//!   <dst>/boundary.json     the boundary GeoJSON feature
//!   <dst>/bounded.tif       the raster re-framed to the boundary bbox
//!   <dst>/clipped.tif       the bounded raster with all pixels outside the boundary set to 0
//! ```

use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};

use mapcrop_common::{define_error, fs::{ensure_unique_dir, ensure_writable_dir}, geo::{Boundary, CornerDistance, GeoError}};
use mapcrop_raster::{bound_file, clip_file, RasterError};
use mapcrop_dronedeploy::{DroneDeployError, ExportAcquisition, PlanId, QueryGateway};

pub const BOUNDARY_NAME: &str = "boundary.json";
pub const BOUNDED_NAME: &str = "bounded.tif";
pub const CLIPPED_NAME: &str = "clipped.tif";

define_error!{ pub MapCropError =
    IOError(#[from] std::io::Error) : "IO error: {0}",
    DroneDeployError(#[from] DroneDeployError) : "DroneDeploy error: {0}",
    GeoError(#[from] GeoError) : "boundary error: {0}",
    RasterError(#[from] RasterError) : "raster error: {0}",
    JoinError(#[from] tokio::task::JoinError) : "raster task failed: {0}",
    InvalidLogLevel(String) : "invalid log level: {0}"
}

pub type Result<T> = std::result::Result<T,MapCropError>;

/// what to acquire and how to crop it
#[derive(Debug,Clone)]
pub struct MapCropOptions {
    pub plan: PlanId,
    /// cm per pixel
    pub resolution: u32,
    pub lon: f64,
    pub lat: f64,
    /// boundary width in meters
    pub size_x: f64,
    /// boundary height in meters
    pub size_y: f64,
    pub corner_distance: CornerDistance,
    /// if this already exists we use the first free `<dst_folder>_<n>`
    pub dst_folder: PathBuf,
}

/// the files produced by a pipeline run
#[derive(Debug,Clone,PartialEq)]
pub struct MapCropOutput {
    pub dst_dir: PathBuf,
    pub raster_path: PathBuf,
    pub boundary_path: PathBuf,
    pub bounded_path: PathBuf,
    pub clipped_path: PathBuf,
}

/// run the whole pipeline. Steps are strictly sequential and every failure aborts the run, leaving
/// whatever files were already written in the destination dir
pub async fn run_pipeline<G: QueryGateway> (acquisition: &mut ExportAcquisition<G>, opts: &MapCropOptions) -> Result<MapCropOutput> {
    let dst_dir = ensure_unique_dir( &opts.dst_folder)?;
    ensure_writable_dir( &dst_dir)?;
    info!("writing results to {:?}", dst_dir);

    // no need to acquire anything if we can't build the boundary
    let boundary = Boundary::from_center_size( opts.lon, opts.lat, opts.size_x, opts.size_y, opts.corner_distance)?;

    let raster_path = acquisition.get_geotiff( &opts.plan, opts.resolution, &dst_dir).await?;

    let boundary_path = dst_dir.join( BOUNDARY_NAME);
    boundary.write_geojson( &boundary_path)?;
    info!("boundary written to {:?}", boundary_path);

    // raster processing is CPU and file bound so we keep it off the async workers
    let cancel = acquisition.cancel_token().clone();
    let bounded_path = dst_dir.join( BOUNDED_NAME);
    let clipped_path = dst_dir.join( CLIPPED_NAME);
    {
        let (raster_path, bounded_path, clipped_path) = (raster_path.clone(), bounded_path.clone(), clipped_path.clone());
        tokio::task::spawn_blocking( move || crop_raster( &raster_path, &boundary, &bounded_path, &clipped_path, &cancel)).await??;
    }

    Ok( MapCropOutput { dst_dir, raster_path, boundary_path, bounded_path, clipped_path } )
}

/// bound `raster_path` to the bbox of `boundary`, then clip the bounded raster to the boundary polygon
pub fn crop_raster (raster_path: &Path, boundary: &Boundary, bounded_path: &Path, clipped_path: &Path, cancel: &CancellationToken) -> Result<()> {
    check_cancelled( cancel)?;
    bound_file( raster_path, boundary, bounded_path)?;

    check_cancelled( cancel)?;
    clip_file( bounded_path, boundary, clipped_path)?;
    Ok(())
}

fn check_cancelled (cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() { Err( DroneDeployError::Cancelled.into()) } else { Ok(()) }
}

/// parse DEBUG|INFO|WARNING|WARN|ERROR (case insensitive)
pub fn parse_log_level (s: &str) -> Result<Level> {
    match s.trim().to_uppercase().as_str() {
        "TRACE" => Ok(Level::TRACE),
        "DEBUG" => Ok(Level::DEBUG),
        "INFO" => Ok(Level::INFO),
        "WARN" | "WARNING" => Ok(Level::WARN),
        "ERROR" => Ok(Level::ERROR),
        _ => Err( MapCropError::InvalidLogLevel( s.to_string()))
    }
}
