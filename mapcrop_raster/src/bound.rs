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

//! re-frame a raster onto a new (axis aligned) extent, keeping its resolution

use std::path::Path;
use tracing::{debug,info};
use mapcrop_common::{BoundingBox, geo::Boundary};

use crate::{
    Raster, RasterData, RasterError, Result, SampleValue, GeoTransform,
    copy_colormaps, check_lon_lat_crs, geotransform_from_bbox, north_up_resolution, map_samples,
    geotiff::{GeoTiffReader,write_geotiff}
};

/// upper limit for the number of output pixels (16k x 16k)
pub const MAX_BOUND_PIXELS: usize = 1 << 28;

/// output grid of a bound operation: size, transform and the (col,row) offset of its origin in the source grid
#[derive(Debug,Clone,Copy,PartialEq)]
pub struct BoundGrid {
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
    pub col_offset: i64,
    pub row_offset: i64
}

/// compute the output grid for re-framing a raster with transform `src_gt` onto `bbox`
pub fn bound_grid (src_gt: &GeoTransform, bbox: &BoundingBox<f64>) -> Result<BoundGrid> {
    let (res_x, res_y) = north_up_resolution( src_gt)?;

    if bbox.is_empty() || !bbox.to_minmax_array().iter().all(|v| v.is_finite()) {
        return Err( RasterError::InvalidExtent( format!("{:?}", bbox)))
    }

    let width = ((bbox.east - bbox.west) / res_x).round();
    let height = ((bbox.north - bbox.south) / res_y).round();
    if width < 1.0 || height < 1.0 {
        return Err( RasterError::InvalidExtent( format!("{:?} is smaller than a pixel", bbox)))
    }

    if width * height > MAX_BOUND_PIXELS as f64 {
        return Err( RasterError::InvalidExtent( format!("{:?} would need {}x{} pixels", bbox, width, height)))
    }

    let transform = geotransform_from_bbox( bbox, res_x, res_y);
    let col_offset = ((bbox.west - src_gt[0]) / res_x).round() as i64;
    let row_offset = ((src_gt[3] - bbox.north) / res_y).round() as i64;

    Ok( BoundGrid { width: width as usize, height: height as usize, transform, col_offset, row_offset } )
}

impl BoundGrid {
    /// number of output samples for `bands` bands, failing if that exceeds our limits
    pub fn sample_count (&self, bands: usize) -> Result<usize> {
        self.width.checked_mul( self.height)
            .filter( |n| *n <= MAX_BOUND_PIXELS)
            .and_then( |n| n.checked_mul( bands))
            .ok_or_else( || RasterError::InvalidExtent( format!("{}x{}x{} output samples", self.width, self.height, bands)))
    }

    /// the (col,row,width,height) window of a src_width x src_height source that is covered by this grid,
    /// or None if they don't overlap
    pub fn source_window (&self, src_width: usize, src_height: usize) -> Option<(usize,usize,usize,usize)> {
        let c0 = self.col_offset.max(0);
        let c1 = (self.col_offset + self.width as i64).min( src_width as i64);
        let r0 = self.row_offset.max(0);
        let r1 = (self.row_offset + self.height as i64).min( src_height as i64);

        if c1 > c0 && r1 > r0 {
            Some( (c0 as usize, r0 as usize, (c1 - c0) as usize, (r1 - r0) as usize) )
        } else {
            None
        }
    }

    /// the same grid with offsets relative to a source window at (col,row)
    pub fn relative_to (&self, col: usize, row: usize)->Self {
        BoundGrid { col_offset: self.col_offset - col as i64, row_offset: self.row_offset - row as i64, ..*self }
    }
}

fn bound_samples<T: SampleValue> (src: &[T], src_width: usize, src_height: usize, bands: usize, grid: &BoundGrid, fill: T) -> Vec<T> {
    let mut out = vec![fill; grid.width * grid.height * bands];

    // the column range of the output that overlaps the source
    let c0 = (-grid.col_offset).max(0);
    let c1 = (src_width as i64 - grid.col_offset).min( grid.width as i64);
    if c1 <= c0 { return out }
    let n = (c1 - c0) as usize * bands;

    for r in 0..grid.height {
        let sr = r as i64 + grid.row_offset;
        if sr >= 0 && (sr as usize) < src_height {
            let sc0 = (c0 + grid.col_offset) as usize;
            let si = (sr as usize * src_width + sc0) * bands;
            let di = (r * grid.width + c0 as usize) * bands;
            out[di..di+n].copy_from_slice( &src[si..si+n]);
        }
    }
    out
}

/// re-frame `src` onto `grid`, whose offsets refer to the `src` grid
pub fn bound_to_grid (src: &Raster, grid: &BoundGrid) -> Result<Raster> {
    grid.sample_count( src.band_count)?;
    let fill = src.nodata.unwrap_or(0.0);
    debug!("bound grid {}x{} at offset ({},{}), fill {}", grid.width, grid.height, grid.col_offset, grid.row_offset, fill);

    let data = map_samples!( &src.data, v => bound_samples( v, src.width, src.height, src.band_count, grid, SampleValue::from_f64(fill)));
    let mut raster = src.with_data( grid.width, grid.height, grid.transform, data)?;
    copy_colormaps( src, &mut raster);

    Ok(raster)
}

/// produce a new raster covering `bbox` at the source resolution. Cells outside the source
/// are filled with the source nodata value (or 0), colormaps and CRS are copied
pub fn bound_raster (src: &Raster, bbox: &BoundingBox<f64>) -> Result<Raster> {
    let grid = bound_grid( &src.transform, bbox)?;
    bound_to_grid( src, &grid)
}

/// read the part of GeoTIFF `src_path` that overlaps the bounding box of `boundary`, bound it
/// and write the result to `dst_path`
pub fn bound_file (src_path: impl AsRef<Path>, boundary: &Boundary, dst_path: impl AsRef<Path>) -> Result<Raster> {
    let mut reader = GeoTiffReader::open( src_path.as_ref())?;
    check_lon_lat_crs( &reader.geokeys);

    let grid = bound_grid( &reader.transform, &boundary.bounds())?;
    grid.sample_count( reader.band_count)?;

    // without overlap we still need a pixel to know the sample type
    let (col,row,w,h) = grid.source_window( reader.width, reader.height).unwrap_or( (0,0,1,1));
    let window = reader.read_window( col, row, w, h)?;

    let bounded = bound_to_grid( &window, &grid.relative_to( col, row))?;
    write_geotiff( &bounded, dst_path.as_ref())?;

    info!("bounded {:?} ({}x{}) to {:?} ({}x{})", src_path.as_ref(), reader.width, reader.height, dst_path.as_ref(), bounded.width, bounded.height);
    Ok(bounded)
}
