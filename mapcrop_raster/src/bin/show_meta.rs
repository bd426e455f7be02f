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

use std::path::Path;
use anyhow::Result;
use mapcrop_common::define_cli;
use mapcrop_raster::{read_geotiff, get_raster_info, Raster};

define_cli! { ARGS [about="show_meta - show georeference and band information of a GeoTIFF"] =
    path: String [help="path to GeoTIFF to analyze"]
}

fn main ()->Result<()> {
    let path = Path::new( &ARGS.path).to_path_buf();
    let raster = read_geotiff(&path)?;

    println!("raster size: {},{}", raster.width, raster.height);
    println!("sample type: {}", raster.data.type_name());
    println!("transform:   {:?}", raster.transform);

    let info = get_raster_info( &raster);
    println!("bounds:      left={} right={} top={} bottom={}", info.left, info.right, info.top, info.bottom);

    if let Some(nodata) = raster.nodata {
        println!("nodata:      {}", nodata);
    }
    show_geokeys( &raster, 0);

    for i in 0..raster.band_count {
        let band_id = i+1;
        println!("--- band {}", band_id);
        match &raster.colormaps[i] {
            Some(cmap) => println!("    colormap: {} entries", cmap.len()),
            None => println!("    no colormap")
        }
    }

    Ok(())
}

fn show_geokeys (raster: &Raster, level: usize) {
    let indent = " ".repeat(level);

    if let Some(gk) = &raster.geokeys {
        if let Some(epsg) = gk.epsg() {
            println!("{}crs: EPSG:{}", indent, epsg);
        }
        println!("{}geokeys:", indent);
        for (k,v) in gk.short_keys() {
            println!("{}    {} = {}", indent, k, v);
        }
        if let Some(ascii) = &gk.ascii_params {
            println!("{}    ascii: {}", indent, ascii);
        }
    } else {
        println!("{}no geokeys", indent);
    }
}
