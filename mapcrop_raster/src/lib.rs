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

//! a minimal georeferenced raster model (GeoTIFF based) with operations to re-frame
//! rasters onto a new extent ([`bound`]) and to mask pixels outside of a polygon ([`clip`])

use std::fmt::Debug;
use tracing::debug;
use mapcrop_common::BoundingBox;

pub mod errors;
pub mod geotiff;
pub mod bound;
pub mod clip;

pub use errors::{Result,RasterError};
pub use geotiff::{read_geotiff,write_geotiff,write_geotiff_strips,GeoTiffReader};
pub use bound::{bound_raster,bound_file};
pub use clip::{clip_raster,clip_file,polygon_mask,PixelMask};

/// affine transform in GDAL order: [x_upper_left, x_res, row_rotation, y_upper_left, col_rotation, y_res]
pub type GeoTransform = [f64;6];

pub fn new_geotransform (x_upper_left: f64, x_resolution: f64, row_rotation: f64,
                         y_upper_left: f64, col_rotation: f64, y_resolution: f64) -> GeoTransform {
    [x_upper_left,x_resolution,row_rotation,y_upper_left,col_rotation,y_resolution]
}

/// north-up transform with origin at (west,north). Note that y_resolution is positive here
pub fn geotransform_from_bbox (bbox: &BoundingBox<f64>, x_resolution: f64, y_resolution: f64) -> GeoTransform {
    new_geotransform(bbox.west, x_resolution, 0.0,
                     bbox.north, 0.0, -y_resolution)
}

/// return (res_x,res_y) (both positive) of a north-up transform, or an error if it is rotated or degenerate
pub fn north_up_resolution (gt: &GeoTransform) -> Result<(f64,f64)> {
    if gt[2] != 0.0 || gt[4] != 0.0 {
        return Err( RasterError::RotatedTransform( format!("{:?}", gt)))
    }
    let res_x = gt[1];
    let res_y = -gt[5];
    if !(res_x.is_finite() && res_x > 0.0 && res_y.is_finite() && res_y > 0.0) {
        return Err( RasterError::InvalidTransform( format!("pixel size {} x {}", gt[1], gt[5])))
    }
    Ok( (res_x,res_y) )
}

#[derive(Debug)]
pub struct RasterInfo {
    pub cols: usize,
    pub left: f64,
    pub right: f64,
    pub dx: f64,

    pub rows: usize,
    pub top: f64,
    pub bottom: f64,
    pub dy: f64
}

pub fn get_raster_info (raster: &Raster)->RasterInfo {
    let cols = raster.width;
    let rows = raster.height;
    let a = &raster.transform;

    let left = a[0];
    let dx = a[1];
    let right = left + (dx * cols as f64); 

    let top = a[3];
    let dy = a[5];
    let bottom = top + (dy * rows as f64);

    RasterInfo { cols, left, right, dx, rows, top, bottom, dy }
}

/* #region sample types ************************************************************************/

/// the numeric sample types we can read and write
pub trait SampleValue: Copy + Default + PartialEq + Debug + Send + Sync + 'static {
    /// TIFF SampleFormat (1: uint, 2: int, 3: float)
    const SAMPLE_FORMAT: u16;
    const BITS: u16;

    fn from_f64 (v: f64)->Self;
    fn to_f64 (self)->f64;
    fn extend_le_bytes (self, buf: &mut Vec<u8>);
}

macro_rules! impl_sample_value {
    ($t:ty, $fmt:expr) => {
        impl SampleValue for $t {
            const SAMPLE_FORMAT: u16 = $fmt;
            const BITS: u16 = (std::mem::size_of::<$t>() * 8) as u16;

            // 'as' saturates for float->int which is what we want for fill values
            #[inline] fn from_f64 (v: f64)->Self { v as $t }
            #[inline] fn to_f64 (self)->f64 { self as f64 }
            #[inline] fn extend_le_bytes (self, buf: &mut Vec<u8>) { buf.extend_from_slice( &self.to_le_bytes()) }
        }
    }
}

impl_sample_value!(u8, 1);
impl_sample_value!(u16, 1);
impl_sample_value!(u32, 1);
impl_sample_value!(i16, 2);
impl_sample_value!(i32, 2);
impl_sample_value!(f32, 3);
impl_sample_value!(f64, 3);

/// pixel interleaved (chunky) sample data of all bands
#[derive(Debug,Clone,PartialEq)]
pub enum RasterData {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    F32(Vec<f32>),
    F64(Vec<f64>)
}

/// run `$e` with `$v` bound to the typed sample vector of a RasterData reference
#[macro_export]
macro_rules! with_samples {
    ($data:expr, $v:ident => $e:expr) => {
        match $data {
            $crate::RasterData::U8($v) => $e,
            $crate::RasterData::U16($v) => $e,
            $crate::RasterData::U32($v) => $e,
            $crate::RasterData::I16($v) => $e,
            $crate::RasterData::I32($v) => $e,
            $crate::RasterData::F32($v) => $e,
            $crate::RasterData::F64($v) => $e,
        }
    }
}

/// like [`with_samples`] but wraps the (same typed) result vector back into a RasterData variant
#[macro_export]
macro_rules! map_samples {
    ($data:expr, $v:ident => $e:expr) => {
        match $data {
            $crate::RasterData::U8($v) => $crate::RasterData::U8($e),
            $crate::RasterData::U16($v) => $crate::RasterData::U16($e),
            $crate::RasterData::U32($v) => $crate::RasterData::U32($e),
            $crate::RasterData::I16($v) => $crate::RasterData::I16($e),
            $crate::RasterData::I32($v) => $crate::RasterData::I32($e),
            $crate::RasterData::F32($v) => $crate::RasterData::F32($e),
            $crate::RasterData::F64($v) => $crate::RasterData::F64($e),
        }
    }
}

impl RasterData {
    pub fn len (&self)->usize { with_samples!(self, v => v.len()) }

    pub fn is_empty (&self)->bool { self.len() == 0 }

    pub fn sample_format (&self)->u16 { with_samples!(self, v => sample_format_of(v)) }

    pub fn bits_per_sample (&self)->u16 { with_samples!(self, v => bits_of(v)) }

    pub fn type_name (&self)->&'static str {
        match self {
            RasterData::U8(_) => "u8",
            RasterData::U16(_) => "u16",
            RasterData::U32(_) => "u32",
            RasterData::I16(_) => "i16",
            RasterData::I32(_) => "i32",
            RasterData::F32(_) => "f32",
            RasterData::F64(_) => "f64",
        }
    }

    pub fn get_f64 (&self, idx: usize)->Option<f64> {
        with_samples!(self, v => v.get(idx).map(|s| s.to_f64()))
    }

    /// little endian byte representation of all samples
    pub fn to_le_bytes (&self)->Vec<u8> {
        with_samples!(self, v => {
            let mut buf = Vec::with_capacity( v.len() * (bits_of(v) as usize / 8));
            for s in v.iter() { s.extend_le_bytes( &mut buf) }
            buf
        })
    }
}

fn sample_format_of<T: SampleValue> (_v: &[T])->u16 { T::SAMPLE_FORMAT }
fn bits_of<T: SampleValue> (_v: &[T])->u16 { T::BITS }

/* #endregion sample types */

/// a palette with 16 bit (r,g,b) entries, as stored in TIFF ColorMap tags
#[derive(Debug,Clone,PartialEq)]
pub struct ColorMap {
    pub entries: Vec<[u16;3]>
}

impl ColorMap {
    /// from TIFF layout (all reds, then all greens, then all blues)
    pub fn from_tiff_values (values: &[u16]) -> Result<Self> {
        if values.is_empty() || values.len() % 3 != 0 {
            return Err( RasterError::UnsupportedFormat( format!("colormap with {} values", values.len())))
        }
        let n = values.len() / 3;
        let entries = (0..n).map( |i| [values[i], values[n+i], values[2*n+i]]).collect();
        Ok( ColorMap { entries } )
    }

    pub fn to_tiff_values (&self) -> Vec<u16> {
        let mut values = Vec::with_capacity( self.entries.len() * 3);
        for c in 0..3 {
            values.extend( self.entries.iter().map(|e| e[c]));
        }
        values
    }

    pub fn len (&self)->usize { self.entries.len() }
}

/// the GeoTIFF keys defining the CRS, which are carried over verbatim
#[derive(Debug,Clone,PartialEq,Default)]
pub struct GeoKeys {
    pub directory: Vec<u16>,
    pub double_params: Option<Vec<f64>>,
    pub ascii_params: Option<String>
}

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;

impl GeoKeys {
    /// minimal key directory for EPSG:4326 (lon/lat WGS84)
    pub fn epsg_4326 ()->Self {
        GeoKeys {
            directory: vec![ 
                1, 1, 0, 3,                     // version, revision, minor, number of keys
                GT_MODEL_TYPE_KEY, 0, 1, 2,     // ModelTypeGeographic
                1025, 0, 1, 1,                  // RasterPixelIsArea
                GEOGRAPHIC_TYPE_KEY, 0, 1, 4326 
            ],
            double_params: None,
            ascii_params: None
        }
    }

    /// short key values (stored inline, location 0) as (key,value) pairs
    pub fn short_keys (&self)->Vec<(u16,u16)> {
        let mut keys = Vec::new();
        if self.directory.len() >= 4 {
            let n = self.directory[3] as usize;
            for k in 0..n {
                let i = 4 + k*4;
                if i + 3 < self.directory.len() && self.directory[i+1] == 0 {
                    keys.push( (self.directory[i], self.directory[i+3]) );
                }
            }
        }
        keys
    }

    /// EPSG code of the geographic or projected CRS, if it is given as a code
    pub fn epsg (&self)->Option<u16> {
        let keys = self.short_keys();
        keys.iter().find( |(k,v)| *k == PROJECTED_CS_TYPE_KEY && *v != 32767).map(|(_,v)| *v)
            .or_else( || keys.iter().find( |(k,v)| *k == GEOGRAPHIC_TYPE_KEY && *v != 32767).map(|(_,v)| *v))
    }
}

/// a north-up or affine georeferenced multi-band raster held in memory
#[derive(Debug,Clone,PartialEq)]
pub struct Raster {
    pub width: usize,
    pub height: usize,
    pub band_count: usize,
    pub transform: GeoTransform,
    pub geokeys: Option<GeoKeys>,
    /// TIFF PhotometricInterpretation
    pub photometric: u16,
    pub extra_samples: Option<Vec<u16>>,
    /// one slot per band
    pub colormaps: Vec<Option<ColorMap>>,
    pub nodata: Option<f64>,
    pub data: RasterData
}

impl Raster {
    pub fn new (width: usize, height: usize, band_count: usize, transform: GeoTransform, data: RasterData) -> Result<Self> {
        if width == 0 || height == 0 || band_count == 0 {
            return Err( RasterError::InvalidDimensions( format!("{width}x{height}x{band_count}")))
        }
        if data.len() != width * height * band_count {
            return Err( RasterError::InvalidDimensions( format!("{} samples for {width}x{height}x{band_count}", data.len())))
        }
        let photometric = if band_count >= 3 { 2 } else { 1 };
        let extra_samples = match band_count {
            1 | 3 => None,
            2 => Some( vec![0]),
            n => Some( vec![0; n-3]),
        };

        Ok( Raster { 
            width, height, band_count, transform, 
            geokeys: None, photometric, extra_samples,
            colormaps: vec![None; band_count], 
            nodata: None, data 
        })
    }

    pub fn sample_index (&self, x: usize, y: usize, band: usize)->usize {
        (y * self.width + x) * self.band_count + band
    }

    pub fn get_f64 (&self, x: usize, y: usize, band: usize)->Option<f64> {
        if x < self.width && y < self.height && band < self.band_count {
            self.data.get_f64( self.sample_index( x, y, band))
        } else {
            None
        }
    }

    pub fn bounds (&self)->BoundingBox<f64> {
        let info = get_raster_info(self);
        BoundingBox::new( info.left.min(info.right), info.bottom.min(info.top), info.left.max(info.right), info.top.max(info.bottom))
    }

    /// metadata-only copy with a new size, transform and data
    pub fn with_data (&self, width: usize, height: usize, transform: GeoTransform, data: RasterData) -> Result<Self> {
        if data.len() != width * height * self.band_count {
            return Err( RasterError::InvalidDimensions( format!("{} samples for {width}x{height}x{}", data.len(), self.band_count)))
        }
        Ok( Raster {
            width, height, band_count: self.band_count, transform,
            geokeys: self.geokeys.clone(),
            photometric: self.photometric,
            extra_samples: self.extra_samples.clone(),
            colormaps: vec![None; self.band_count],
            nodata: self.nodata,
            data
        })
    }
}

/// copy per-band colormaps from src to dst. Bands without colormap are skipped (and logged), this is not an error
pub fn copy_colormaps (src: &Raster, dst: &mut Raster) {
    for band in 0..dst.band_count {
        match src.colormaps.get(band) {
            Some(Some(cmap)) => dst.colormaps[band] = Some(cmap.clone()),
            _ => {
                debug!("{}, skipping", RasterError::ColormapAbsent(band+1));
                dst.colormaps[band] = None;
            }
        }
    }
}

/// warn if the raster CRS is not lon/lat, since boundaries are always in WGS84 degrees
pub fn check_lon_lat_crs (geokeys: &Option<GeoKeys>) {
    match geokeys.as_ref().and_then( |gk| gk.epsg()) {
        Some(4326) => {}
        Some(epsg) => tracing::warn!("raster CRS is EPSG:{epsg}, boundary coordinates are WGS84 lon/lat"),
        None => tracing::warn!("raster CRS unknown, assuming WGS84 lon/lat")
    }
}
