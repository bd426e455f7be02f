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

//! GeoTIFF reading and writing based on the pure Rust `tiff` crate.
//! We support single image, uncompressed or compressed (reading), chunky files with
//! 8..64 bit integer or float samples. Output is always uncompressed, stripped, little endian.

use std::{fs::File, io::{BufReader,BufWriter}, path::{Path,PathBuf}};
use tiff::{
    decoder::{Decoder,DecodingResult,Limits},
    encoder::TiffEncoder,
    tags::Tag
};
use tracing::{debug,warn};

use crate::{ColorMap, GeoKeys, GeoTransform, Raster, RasterData, Result, RasterError, SampleValue, map_samples, north_up_resolution};

/// keeps strips at a few MB for typical orthomosaic widths so that windows can be read without the whole image
pub const DEFAULT_ROWS_PER_STRIP: usize = 64;

const PHOTOMETRIC_MIN_IS_BLACK: u16 = 1;
const PHOTOMETRIC_RGB: u16 = 2;
const PHOTOMETRIC_PALETTE: u16 = 3;

const RASTER_TYPE_KEY: u16 = 1025;
const RASTER_PIXEL_IS_POINT: u16 = 2;

fn is_pixel_is_point (geokeys: &Option<GeoKeys>)->bool {
    geokeys.as_ref()
        .map( |gk| gk.short_keys().iter().any( |(k,v)| *k == RASTER_TYPE_KEY && *v == RASTER_PIXEL_IS_POINT))
        .unwrap_or(false)
}

/// an open GeoTIFF with its decoded metadata. Sample data is read either as a whole ([`GeoTiffReader::read`])
/// or as a pixel window ([`GeoTiffReader::read_window`]), which only decodes the strips or tiles that
/// intersect the window
pub struct GeoTiffReader {
    pub width: usize,
    pub height: usize,
    pub band_count: usize,
    pub transform: GeoTransform,
    pub geokeys: Option<GeoKeys>,
    pub photometric: u16,
    pub extra_samples: Option<Vec<u16>>,
    pub colormaps: Vec<Option<ColorMap>>,
    pub nodata: Option<f64>,

    path: PathBuf,
    decoder: Decoder<BufReader<File>>
}

impl GeoTiffReader {
    pub fn open (path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new( File::open(path)?);
        let mut decoder = Decoder::new( reader)?.with_limits( Limits::unlimited());

        let (w,h) = decoder.dimensions()?;
        let width = w as usize;
        let height = h as usize;

        let band_count = match decoder.find_tag( Tag::SamplesPerPixel)? {
            Some(v) => v.into_u16()? as usize,
            None => 1
        };
        let photometric = match decoder.find_tag( Tag::PhotometricInterpretation)? {
            Some(v) => v.into_u16()?,
            None => PHOTOMETRIC_MIN_IS_BLACK
        };
        let extra_samples = decoder.find_tag( Tag::ExtraSamples)?.map( |v| v.into_u16_vec()).transpose()?;

        let geokeys = match decoder.find_tag( Tag::GeoKeyDirectoryTag)? {
            Some(v) => {
                let directory = v.into_u16_vec()?;
                let double_params = decoder.find_tag( Tag::GeoDoubleParamsTag)?.map( |v| v.into_f64_vec()).transpose()?;
                let ascii_params = decoder.find_tag( Tag::GeoAsciiParamsTag)?.map( |v| v.into_string()).transpose()?;
                Some( GeoKeys { directory, double_params, ascii_params })
            }
            None => None
        };

        let mut transform = read_transform( &mut decoder, path)?;
        if is_pixel_is_point( &geokeys) { // we always use area (upper left corner) semantics
            transform[0] -= 0.5 * (transform[1] + transform[2]);
            transform[3] -= 0.5 * (transform[4] + transform[5]);
        }

        let nodata = match decoder.find_tag( Tag::GdalNodata)? {
            Some(v) => {
                let s = v.into_string()?;
                let s = s.trim_matches(|c: char| c == '\0' || c.is_whitespace());
                match s.parse::<f64>() {
                    Ok(nd) => Some(nd),
                    Err(_) => { warn!("ignoring unparsable nodata value {:?}", s); None }
                }
            }
            None => None
        };

        let mut colormaps: Vec<Option<ColorMap>> = vec![None; band_count];
        if photometric == PHOTOMETRIC_PALETTE {
            if let Some(v) = decoder.find_tag( Tag::ColorMap)? {
                colormaps[0] = Some( ColorMap::from_tiff_values( &v.into_u16_vec()?)?);
            }
        }

        Ok( GeoTiffReader { width, height, band_count, transform, geokeys, photometric, extra_samples, colormaps, nodata, path: path.to_path_buf(), decoder } )
    }

    pub fn path (&self)->&Path { &self.path }

    /// (width,height) of strips or tiles
    pub fn chunk_dimensions (&self)->(usize,usize) {
        let (cw,ch) = self.decoder.chunk_dimensions();
        (cw as usize, ch as usize)
    }

    /// indices of the strips or tiles that intersect the pixel window, in row major order
    pub fn window_chunks (&self, col: usize, row: usize, width: usize, height: usize) -> Vec<u32> {
        let (cw,ch) = self.chunk_dimensions();
        if width == 0 || height == 0 || cw == 0 || ch == 0 { return Vec::new() }

        let chunks_across = self.width.div_ceil( cw);
        let mut chunks = Vec::new();
        for ty in row/ch ..= (row + height - 1)/ch {
            for tx in col/cw ..= (col + width - 1)/cw {
                chunks.push( (ty * chunks_across + tx) as u32);
            }
        }
        chunks
    }

    fn raster (&self, width: usize, height: usize, transform: GeoTransform, data: RasterData) -> Raster {
        Raster {
            width, height, band_count: self.band_count, transform,
            geokeys: self.geokeys.clone(),
            photometric: self.photometric,
            extra_samples: self.extra_samples.clone(),
            colormaps: self.colormaps.clone(),
            nodata: self.nodata,
            data
        }
    }

    /// decode the whole image
    pub fn read (mut self) -> Result<Raster> {
        let data = raster_data( self.decoder.read_image()?, &self.path)?;
        if data.len() != self.width * self.height * self.band_count {
            return Err( RasterError::UnsupportedFormat( format!("{:?} is not a single chunky {}x{}x{} image", self.path, self.width, self.height, self.band_count)))
        }

        debug!("read {:?}: {}x{}x{} {} transform={:?} nodata={:?}", self.path, self.width, self.height, self.band_count, data.type_name(), self.transform, self.nodata);
        Ok( self.raster( self.width, self.height, self.transform, data) )
    }

    /// decode the pixel window with upper left corner (col,row) into a raster of its own, with a transform
    /// that is shifted accordingly. The window has to be inside the image
    pub fn read_window (&mut self, col: usize, row: usize, width: usize, height: usize) -> Result<Raster> {
        if width == 0 || height == 0 || col + width > self.width || row + height > self.height {
            return Err( RasterError::InvalidDimensions( format!("window {width}x{height}+{col}+{row} outside of {}x{} image", self.width, self.height)))
        }

        let bands = self.band_count;
        let (cw,ch) = self.chunk_dimensions();
        let chunks_across = self.width.div_ceil( cw);
        let mut data: Option<RasterData> = None;

        let chunks = self.window_chunks( col, row, width, height);
        for idx in &chunks {
            let chunk = raster_data( self.decoder.read_chunk( *idx)?, &self.path)?;
            let (x0, y0) = ((*idx as usize % chunks_across) * cw, (*idx as usize / chunks_across) * ch);

            // edge chunks might be cropped or padded
            let dw = cw.min( self.width - x0);
            let dh = ch.min( self.height - y0);
            let stride = if chunk.len() >= cw * dh * bands {
                cw
            } else if chunk.len() >= dw * dh * bands {
                dw
            } else {
                return Err( RasterError::UnsupportedFormat( format!("chunk {} of {:?} has {} samples", idx, self.path, chunk.len())))
            };

            let xa = x0.max( col);
            let xb = (x0 + dw).min( col + width);
            let ya = y0.max( row);
            let yb = (y0 + dh).min( row + height);
            let rect = PasteRect {
                src_x: xa - x0, src_y: ya - y0, src_stride: stride,
                dst_x: xa - col, dst_y: ya - row, dst_stride: width,
                width: xb - xa, height: yb - ya, bands
            };

            let dst = data.get_or_insert_with( || map_samples!( &chunk, v => zeroed( v, width * height * bands)));
            paste( dst, &chunk, &rect, &self.path)?;
        }

        let data = data.ok_or_else( || RasterError::UnsupportedFormat( format!("no chunks for window in {:?}", self.path)))?;
        let gt = &self.transform;
        let transform = [ gt[0] + col as f64 * gt[1] + row as f64 * gt[2], gt[1], gt[2],
                          gt[3] + col as f64 * gt[4] + row as f64 * gt[5], gt[4], gt[5] ];

        debug!("read window {}x{}+{}+{} of {:?} from {} of {} chunks", width, height, col, row, self.path, chunks.len(),
               self.width.div_ceil(cw) * self.height.div_ceil(ch));
        Ok( self.raster( width, height, transform, data) )
    }
}

pub fn read_geotiff (path: impl AsRef<Path>) -> Result<Raster> {
    GeoTiffReader::open( path)?.read()
}

fn raster_data (res: DecodingResult, path: &Path) -> Result<RasterData> {
    match res {
        DecodingResult::U8(v) => Ok( RasterData::U8(v)),
        DecodingResult::U16(v) => Ok( RasterData::U16(v)),
        DecodingResult::U32(v) => Ok( RasterData::U32(v)),
        DecodingResult::I16(v) => Ok( RasterData::I16(v)),
        DecodingResult::I32(v) => Ok( RasterData::I32(v)),
        DecodingResult::F32(v) => Ok( RasterData::F32(v)),
        DecodingResult::F64(v) => Ok( RasterData::F64(v)),
        _ => Err( RasterError::UnsupportedFormat( format!("sample type of {:?}", path)))
    }
}

fn zeroed<T: SampleValue> (_like: &[T], len: usize)->Vec<T> { vec![T::default(); len] }

/// source and destination placement of a pixel rectangle, strides in pixels
struct PasteRect {
    src_x: usize, src_y: usize, src_stride: usize,
    dst_x: usize, dst_y: usize, dst_stride: usize,
    width: usize, height: usize, bands: usize
}

fn paste_rows<T: Copy> (dst: &mut [T], src: &[T], r: &PasteRect) {
    let n = r.width * r.bands;
    for y in 0..r.height {
        let si = ((r.src_y + y) * r.src_stride + r.src_x) * r.bands;
        let di = ((r.dst_y + y) * r.dst_stride + r.dst_x) * r.bands;
        dst[di..di+n].copy_from_slice( &src[si..si+n]);
    }
}

fn paste (dst: &mut RasterData, src: &RasterData, rect: &PasteRect, path: &Path) -> Result<()> {
    match (dst, src) {
        (RasterData::U8(d), RasterData::U8(s)) => paste_rows( d, s, rect),
        (RasterData::U16(d), RasterData::U16(s)) => paste_rows( d, s, rect),
        (RasterData::U32(d), RasterData::U32(s)) => paste_rows( d, s, rect),
        (RasterData::I16(d), RasterData::I16(s)) => paste_rows( d, s, rect),
        (RasterData::I32(d), RasterData::I32(s)) => paste_rows( d, s, rect),
        (RasterData::F32(d), RasterData::F32(s)) => paste_rows( d, s, rect),
        (RasterData::F64(d), RasterData::F64(s)) => paste_rows( d, s, rect),
        _ => return Err( RasterError::UnsupportedFormat( format!("mixed sample types in {:?}", path)))
    }
    Ok(())
}

fn read_transform<R> (decoder: &mut Decoder<R>, path: &Path) -> Result<GeoTransform> where R: std::io::Read + std::io::Seek {
    if let Some(v) = decoder.find_tag( Tag::ModelTransformationTag)? {
        let m = v.into_f64_vec()?;
        if m.len() < 8 {
            return Err( RasterError::InvalidTransform( format!("ModelTransformation with {} values", m.len())))
        }
        return Ok( [m[3], m[0], m[1], m[7], m[4], m[5]] )
    }

    let scale = decoder.find_tag( Tag::ModelPixelScaleTag)?.map( |v| v.into_f64_vec()).transpose()?;
    let tiepoint = decoder.find_tag( Tag::ModelTiepointTag)?.map( |v| v.into_f64_vec()).transpose()?;

    match (scale,tiepoint) {
        (Some(s), Some(t)) if s.len() >= 2 && t.len() >= 6 => {
            let (sx, sy) = (s[0], s[1]);
            let (i, j, x, y) = (t[0], t[1], t[3], t[4]);
            Ok( [x - i*sx, sx, 0.0, y + j*sy, 0.0, -sy] )
        }
        _ => Err( RasterError::MissingGeoreference( format!("{:?}", path)))
    }
}

/// the photometric interpretation and palette we can encode for this raster. A TIFF carries at most
/// one palette which applies to a single band integer image, colormaps of other bands get dropped
fn encodable_palette (raster: &Raster) -> (u16, Option<Vec<u16>>) {
    for band in 1..raster.band_count {
        if raster.colormaps.get(band).map(|c| c.is_some()).unwrap_or(false) {
            warn!("colormap of band {} cannot be stored in GeoTIFF, dropped", band+1);
        }
    }

    if let Some(Some(cmap)) = raster.colormaps.first() {
        let bits = raster.data.bits_per_sample();
        let integer = raster.data.sample_format() == 1;
        if raster.band_count == 1 && integer && bits <= 16 {
            let n = 1usize << bits;
            let mut cmap = cmap.clone();
            cmap.entries.resize( n, [0,0,0]);
            return (PHOTOMETRIC_PALETTE, Some( cmap.to_tiff_values()))
        } else {
            warn!("colormap of band 1 requires a single band u8/u16 raster, dropped");
        }
    }

    let photometric = match raster.photometric {
        PHOTOMETRIC_RGB if raster.band_count >= 3 => PHOTOMETRIC_RGB,
        PHOTOMETRIC_PALETTE | PHOTOMETRIC_RGB => PHOTOMETRIC_MIN_IS_BLACK,
        p => p
    };
    (photometric, None)
}

fn extra_sample_values (raster: &Raster, photometric: u16) -> Option<Vec<u16>> {
    let base = if photometric == PHOTOMETRIC_RGB { 3 } else { 1 };
    let n_extra = raster.band_count.saturating_sub( base);
    if n_extra == 0 {
        None
    } else {
        match &raster.extra_samples {
            Some(es) if es.len() == n_extra => Some( es.clone()),
            _ => Some( vec![0; n_extra])
        }
    }
}

/// write an uncompressed GeoTIFF with strips of up to [`DEFAULT_ROWS_PER_STRIP`] rows
pub fn write_geotiff (raster: &Raster, path: impl AsRef<Path>) -> Result<()> {
    write_geotiff_strips( raster, path, DEFAULT_ROWS_PER_STRIP)
}

pub fn write_geotiff_strips (raster: &Raster, path: impl AsRef<Path>, rows_per_strip: usize) -> Result<()> {
    let path = path.as_ref();
    let rows_per_strip = rows_per_strip.clamp( 1, raster.height.max(1));
    let bands = raster.band_count;
    let bits = raster.data.bits_per_sample();
    let (photometric, palette) = encodable_palette( raster);

    let writer = BufWriter::new( File::create(path)?);
    let mut encoder = TiffEncoder::new( writer)?;
    let mut dir = encoder.image_directory()?;

    dir.write_tag( Tag::ImageWidth, raster.width as u32)?;
    dir.write_tag( Tag::ImageLength, raster.height as u32)?;
    dir.write_tag( Tag::BitsPerSample, vec![bits; bands].as_slice())?;
    dir.write_tag( Tag::Compression, 1u16)?;
    dir.write_tag( Tag::PhotometricInterpretation, photometric)?;
    dir.write_tag( Tag::SamplesPerPixel, bands as u16)?;
    dir.write_tag( Tag::SampleFormat, vec![raster.data.sample_format(); bands].as_slice())?;
    dir.write_tag( Tag::PlanarConfiguration, 1u16)?;
    dir.write_tag( Tag::RowsPerStrip, rows_per_strip as u32)?;

    if let Some(es) = extra_sample_values( raster, photometric) {
        dir.write_tag( Tag::ExtraSamples, es.as_slice())?;
    }
    if let Some(cmap) = &palette {
        dir.write_tag( Tag::ColorMap, cmap.as_slice())?;
    }

    //--- georeference
    let mut gt = raster.transform;
    if is_pixel_is_point( &raster.geokeys) {
        gt[0] += 0.5 * (gt[1] + gt[2]);
        gt[3] += 0.5 * (gt[4] + gt[5]);
    }
    if north_up_resolution( &gt).is_ok() {
        dir.write_tag( Tag::ModelPixelScaleTag, [gt[1], -gt[5], 0.0].as_slice())?;
        dir.write_tag( Tag::ModelTiepointTag, [0.0, 0.0, 0.0, gt[0], gt[3], 0.0].as_slice())?;
    } else {
        let m = [ gt[1], gt[2], 0.0, gt[0],
                  gt[4], gt[5], 0.0, gt[3],
                  0.0,   0.0,   0.0, 0.0,
                  0.0,   0.0,   0.0, 1.0 ];
        dir.write_tag( Tag::ModelTransformationTag, m.as_slice())?;
    }

    if let Some(gk) = &raster.geokeys {
        dir.write_tag( Tag::GeoKeyDirectoryTag, gk.directory.as_slice())?;
        if let Some(dp) = &gk.double_params {
            dir.write_tag( Tag::GeoDoubleParamsTag, dp.as_slice())?;
        }
        if let Some(ap) = &gk.ascii_params {
            dir.write_tag( Tag::GeoAsciiParamsTag, ap.trim_end_matches('\0'))?;
        }
    }

    if let Some(nodata) = raster.nodata {
        dir.write_tag( Tag::GdalNodata, format!("{nodata}").as_str())?;
    }

    //--- sample data in strips
    let bytes = raster.data.to_le_bytes();
    let strip_len = rows_per_strip * raster.width * bands * (bits as usize / 8);
    let mut offsets: Vec<u32> = Vec::with_capacity( raster.height.div_ceil( rows_per_strip));
    let mut byte_counts: Vec<u32> = Vec::with_capacity( offsets.capacity());

    for strip in bytes.chunks( strip_len.max(1)) {
        let offset = dir.write_data( strip)?;
        offsets.push( u32::try_from( offset).map_err( |_| RasterError::InvalidDimensions( "raster exceeds 4GB".into()))?);
        byte_counts.push( strip.len() as u32);
    }
    dir.write_tag( Tag::StripOffsets, offsets.as_slice())?;
    dir.write_tag( Tag::StripByteCounts, byte_counts.as_slice())?;

    dir.finish()?;

    debug!("wrote {:?}: {}x{}x{} {}", path, raster.width, raster.height, bands, raster.data.type_name());
    Ok(())
}
