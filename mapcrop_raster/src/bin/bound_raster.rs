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
use anyhow::Result;
use mapcrop_common::{define_cli, check_cli, geo::Boundary};
use mapcrop_raster::bound_file;

define_cli! { ARGS [about="bound_raster - re-frame GeoTIFF to the bounding box of a GeoJSON boundary, filling with nodata"] =
    src_path: String [help="input GeoTIFF"],
    boundary_path: String [help="GeoJSON boundary feature"],
    tgt_path: String [help="output GeoTIFF"]
}

fn main()->Result<()> {
    check_cli!(ARGS);
    tracing_subscriber::fmt::init();

    let boundary = Boundary::read_geojson( Path::new( ARGS.boundary_path.as_str()))?;
    let raster = bound_file( Path::new( ARGS.src_path.as_str()), &boundary, Path::new( ARGS.tgt_path.as_str()))?;

    println!("bounded raster: {}x{} pixels, {} bands, transform {:?}", raster.width, raster.height, raster.band_count, raster.transform);
    Ok(())
}
