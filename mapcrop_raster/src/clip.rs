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

//! mask raster pixels outside of a polygon, without changing the raster extent

use std::path::Path;
use bit_set::BitSet;
use geo::{Coord, Polygon};
use tracing::{debug,info};
use mapcrop_common::geo::Boundary;

use crate::{
    Raster, Result, RasterError, SampleValue, GeoTransform, 
    copy_colormaps, check_lon_lat_crs, north_up_resolution, map_samples,
    geotiff::{read_geotiff,write_geotiff}
};

/// value of clipped samples
pub const CLIP_VALUE: f64 = 0.0;

/// a width x height set of pixels (row major)
#[derive(Debug,Clone)]
pub struct PixelMask {
    width: usize,
    height: usize,
    data: BitSet
}

impl PixelMask {
    pub fn new (width: usize, height: usize)->Self {
        let data = BitSet::with_capacity(width*height);
        PixelMask{width,height,data}
    }

    pub fn dimensions (&self)->(usize,usize) {
        (self.width,self.height)
    }

    pub fn get (&self, x: usize, y: usize)->bool {
        self.data.contains( y*self.width + x)
    }

    pub fn set (&mut self, x: usize, y: usize) {
        self.data.insert( y*self.width + x);
    }

    pub fn count (&self)->usize {
        self.data.len()
    }

    pub fn print (&self) {
        for y in 0..self.height {
            let line: String = (0..self.width).map( |x| if self.get(x,y) {'◼'} else {'·'}).collect();
            println!("{:4} {}", y, line);
        }
    }
}

/// x coordinates where the horizontal line at `y` crosses the rings of `polygon`, sorted.
/// Edges are half-open in y so that vertices on the line are counted once
fn crossings (polygon: &Polygon<f64>, y: f64) -> Vec<f64> {
    let mut xs = Vec::new();
    for ring in std::iter::once( polygon.exterior()).chain( polygon.interiors().iter()) {
        for line in ring.lines() {
            let (a,b) = (line.start, line.end);
            if (a.y > y) != (b.y > y) {
                xs.push( a.x + (y - a.y) * (b.x - a.x) / (b.y - a.y));
            }
        }
    }
    xs.sort_by( |a,b| a.total_cmp(b));
    xs
}

/// pixels of a north-up grid whose centers are inside the polygon (even-odd rule). A center exactly
/// on a left edge is inside, on a right edge outside
pub fn polygon_mask (polygon: &Polygon<f64>, gt: &GeoTransform, width: usize, height: usize) -> Result<PixelMask> {
    north_up_resolution( gt)?;
    let mut mask = PixelMask::new( width, height);

    for row in 0..height {
        let y = gt[3] + (row as f64 + 0.5) * gt[5];
        let xs = crossings( polygon, y);

        for span in xs.chunks_exact(2) {
            // fractional column of the span ends in pixel-center space
            let c0 = ((span[0] - gt[0]) / gt[1] - 0.5).ceil().max(0.0);
            let c1 = ((span[1] - gt[0]) / gt[1] - 0.5).ceil().min( width as f64);
            if c1 > c0 {
                for col in c0 as usize..c1 as usize {
                    mask.set( col, row);
                }
            }
        }
    }

    Ok(mask)
}

fn clip_samples<T: SampleValue> (src: &[T], width: usize, bands: usize, mask: &PixelMask, clip_value: T) -> Vec<T> {
    let mut out = src.to_vec();
    for (p,px) in out.chunks_exact_mut(bands).enumerate() {
        if !mask.get( p % width, p / width) {
            px.fill( clip_value);
        }
    }
    out
}

/// set all samples of pixels outside `polygon` to 0. Extent and metadata are unchanged
pub fn clip_raster (src: &Raster, polygon: &Polygon<f64>) -> Result<Raster> {
    let mask = polygon_mask( polygon, &src.transform, src.width, src.height)?;
    debug!("clip mask has {} of {} pixels inside", mask.count(), src.width * src.height);

    let data = map_samples!( &src.data, v => clip_samples( v, src.width, src.band_count, &mask, SampleValue::from_f64(CLIP_VALUE)));
    let mut raster = src.with_data( src.width, src.height, src.transform, data)?;
    copy_colormaps( src, &mut raster);

    Ok(raster)
}

/// read GeoTIFF `src_path`, clip it with `boundary` and write the result to `dst_path`
pub fn clip_file (src_path: impl AsRef<Path>, boundary: &Boundary, dst_path: impl AsRef<Path>) -> Result<Raster> {
    let src = read_geotiff( src_path.as_ref())?;
    check_lon_lat_crs( &src.geokeys);

    let clipped = clip_raster( &src, boundary.polygon())?;
    write_geotiff( &clipped, dst_path.as_ref())?;

    info!("clipped {:?} to {:?}", src_path.as_ref(), dst_path.as_ref());
    Ok(clipped)
}
