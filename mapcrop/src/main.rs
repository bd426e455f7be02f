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

use std::path::PathBuf;
use anyhow::{anyhow, Result};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use mapcrop_common::{define_cli, check_cli, config::load_config_or_default, geo::{parse_lon_lat, CornerDistance}};
use mapcrop_dronedeploy::{DroneDeployConfig, ExportAcquisition, LiveGateway, PlanId};
use mapcrop::{parse_log_level, run_pipeline, MapCropOptions};

const API_KEY_ENV: &str = "DRONEDEPLOY_API_KEY";
const EXIT_INTERRUPTED: i32 = 130;

define_cli! { ARGS [about="mapcrop - retrieve a DroneDeploy orthomosaic export and crop it to a geodesic boundary around a location"] =
    plan_id: String [help="DroneDeploy plan id (with or without 'MapPlan:' prefix)", long],
    resolution: u32 [help="export resolution in cm/pixel", long, default_value="5"],
    api_key: Option<String> [help="DroneDeploy API key (default is DRONEDEPLOY_API_KEY env or config)", long],
    dst_folder: String [help="destination folder for all produced files (made unique if it exists)", long],
    sizex: f64 [help="boundary width in meters", long, default_value="100"],
    sizey: f64 [help="boundary height in meters", long, default_value="100"],
    location: String [help="boundary center as \"(lon,lat)\" in degrees", long, allow_hyphen_values=true],
    log_level: String [help="log level {DEBUG,INFO,WARNING,ERROR}", long, default_value="INFO"],
    config: Option<String> [help="pathname of DroneDeploy RON config", long],
    half_diagonal: bool [help="project corners at half the rectangle diagonal, i.e. a boundary of exactly sizex by sizey", long],
    max_poll_attempts: Option<u32> [help="give up after this many export status polls", long]
}

#[tokio::main]
async fn main() -> Result<()> {
    check_cli!(ARGS);

    let level = parse_log_level( &ARGS.log_level)?;
    tracing_subscriber::fmt().with_max_level( level).init();

    let mut config: DroneDeployConfig = load_config_or_default( ARGS.config.as_ref())?;
    if let Some(api_key) = ARGS.api_key.clone().or_else( || std::env::var( API_KEY_ENV).ok()) {
        config.api_key = Some(api_key);
    }
    if ARGS.max_poll_attempts.is_some() {
        config.max_poll_attempts = ARGS.max_poll_attempts;
    }

    let (lon,lat) = parse_lon_lat( &ARGS.location).ok_or_else( || anyhow!("invalid location {:?}, expected \"(lon,lat)\"", ARGS.location))?;
    let opts = MapCropOptions {
        plan: PlanId::new( &ARGS.plan_id)?,
        resolution: ARGS.resolution,
        lon, lat,
        size_x: ARGS.sizex,
        size_y: ARGS.sizey,
        corner_distance: if ARGS.half_diagonal { CornerDistance::HalfDiagonal } else { CornerDistance::FullDiagonal },
        dst_folder: PathBuf::from( &ARGS.dst_folder),
    };

    // first Ctrl-C cancels the running step, the second one terminates right away
    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn( async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if ctrl_c_cancel.is_cancelled() {
                warn!("interrupted again, exiting");
                std::process::exit( EXIT_INTERRUPTED);
            }
            warn!("interrupted, cancelling (press Ctrl-C again to exit immediately)");
            ctrl_c_cancel.cancel();
        }
    });

    let gateway = LiveGateway::from_config( &config)?;
    let mut acquisition = ExportAcquisition::from_config( gateway, &config, cancel);
    let output = run_pipeline( &mut acquisition, &opts).await?;

    println!("boundary: {:?}", output.boundary_path);
    println!("bounded:  {:?}", output.bounded_path);
    println!("clipped:  {:?}", output.clipped_path);
    Ok(())
}
