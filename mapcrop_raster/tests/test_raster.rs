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

use anyhow::Result;
use geo::{Contains, Point, polygon};
use mapcrop_common::geo::{Boundary, CornerDistance};
use mapcrop_raster::*;
use mapcrop_raster::bound::bound_grid;

// run with "cargo test test_bound_clip -- --nocapture"

const LON: f64 = -99.55057;
const LAT: f64 = 28.7803;
const RES: f64 = 0.00001; // ~1m

fn sample (x: usize, y: usize, band: usize)->u8 {
    match band {
        0 => ((x + y) % 251) as u8,
        1 => (x % 256) as u8,
        _ => (y % 256) as u8
    }
}

/// 500x500 RGB test raster with upper left corner at (west,north)
fn make_source (west: f64, north: f64) -> Result<Raster> {
    let (w,h,bands) = (500, 500, 3);
    let mut data = Vec::with_capacity( w*h*bands);
    for y in 0..h {
        for x in 0..w {
            for b in 0..bands { data.push( sample(x,y,b)) }
        }
    }
    let mut raster = Raster::new( w, h, bands, new_geotransform( west, RES, 0.0, north, 0.0, -RES), RasterData::U8(data))?;
    raster.geokeys = Some( GeoKeys::epsg_4326());
    Ok(raster)
}

fn centered_source () -> Result<Raster> {
    make_source( LON - 250.0 * RES, LAT + 250.0 * RES)
}

#[test]
fn test_geotiff_roundtrip() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("src.tif");

    let mut src = centered_source()?;
    src.nodata = Some(0.0);
    write_geotiff( &src, &path)?;

    let raster = read_geotiff( &path)?;
    println!("read {}x{}x{} transform={:?} crs={:?}", raster.width, raster.height, raster.band_count, raster.transform, raster.geokeys.as_ref().and_then(|gk| gk.epsg()));
    assert_eq!( raster, src);
    Ok(())
}

#[test]
fn test_bound_clip_end_to_end() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let src_path = dir.path().join("src.tif");
    let bounded_path = dir.path().join("bounded.tif");
    let clipped_path = dir.path().join("clipped.tif");

    let src = centered_source()?;
    write_geotiff( &src, &src_path)?;

    let boundary = Boundary::from_center_size( LON, LAT, 100.0, 100.0, CornerDistance::FullDiagonal)?;
    assert_eq!( boundary.points().len(), 5);
    assert_eq!( boundary.points()[0], boundary.points()[4]);

    //--- bound
    let bounded = bound_file( &src_path, &boundary, &bounded_path)?;
    let grid = bound_grid( &src.transform, &boundary.bounds())?;
    println!("bounded: {}x{} offset ({},{})", bounded.width, bounded.height, grid.col_offset, grid.row_offset);

    assert_eq!( (bounded.width, bounded.height), (grid.width, grid.height));
    assert_eq!( bounded.band_count, 3);
    assert!( bounded.width < src.width && bounded.height < src.height);

    let bounded = read_geotiff( &bounded_path)?;
    for y in 0..bounded.height {
        for x in 0..bounded.width {
            let sx = (x as i64 + grid.col_offset) as usize;
            let sy = (y as i64 + grid.row_offset) as usize;
            for b in 0..3 {
                assert_eq!( bounded.get_f64(x,y,b), Some( sample(sx,sy,b) as f64));
            }
        }
    }

    //--- clip
    let clipped = clip_file( &bounded_path, &boundary, &clipped_path)?;
    let clipped = read_geotiff( &clipped_path)?;
    assert_eq!( (clipped.width, clipped.height, clipped.band_count), (bounded.width, bounded.height, 3));
    assert_eq!( clipped.transform, bounded.transform);
    assert_eq!( clipped.geokeys, bounded.geokeys);

    let gt = clipped.transform;
    let mut n_inside = 0;
    for y in 0..clipped.height {
        for x in 0..clipped.width {
            let center = Point::new( gt[0] + (x as f64 + 0.5) * gt[1], gt[3] + (y as f64 + 0.5) * gt[5]);
            let inside = boundary.polygon().contains( &center);
            if inside { n_inside += 1 }
            for b in 0..3 {
                let expected = if inside { bounded.get_f64(x,y,b) } else { Some(0.0) };
                assert_eq!( clipped.get_f64(x,y,b), expected, "pixel {x},{y} band {b}");
            }
        }
    }
    println!("{} of {} pixels inside boundary", n_inside, clipped.width * clipped.height);
    assert!( n_inside > clipped.width * clipped.height / 2);
    Ok(())
}

#[test]
fn test_bound_fills_nodata() -> Result<()> {
    // source starts at the center, so the west half of the boundary box is not covered
    let mut src = make_source( LON, LAT + 250.0 * RES)?;
    src.nodata = Some(255.0);

    let boundary = Boundary::from_center_size( LON, LAT, 50.0, 50.0, CornerDistance::HalfDiagonal)?;
    let bbox = boundary.bounds();
    let bounded = bound_raster( &src, &bbox)?;
    let grid = bound_grid( &src.transform, &bbox)?;
    assert!( grid.col_offset < 0);

    let n_fill = (-grid.col_offset) as usize;
    for y in 0..bounded.height {
        for x in 0..bounded.width {
            let v = bounded.get_f64(x,y,0);
            if x < n_fill {
                assert_eq!( v, Some(255.0));
            } else {
                let sx = (x as i64 + grid.col_offset) as usize;
                let sy = (y as i64 + grid.row_offset) as usize;
                assert_eq!( v, Some( sample(sx,sy,0) as f64));
            }
        }
    }
    assert_eq!( bounded.nodata, Some(255.0));
    Ok(())
}

#[test]
fn test_bound_keeps_colormaps_per_band() -> Result<()> {
    let gt = new_geotransform( 0.0, 1.0, 0.0, 10.0, 0.0, -1.0);
    let mut src = Raster::new( 10, 10, 2, gt, RasterData::U16( vec![3; 200]))?;
    let cmap = ColorMap { entries: vec![[0,0,0], [65535,0,0], [0,65535,0], [0,0,65535]] };
    src.colormaps[1] = Some( cmap.clone());

    let bbox = mapcrop_common::BoundingBox::new( 2.0, 2.0, 14.0, 8.0);
    let bounded = bound_raster( &src, &bbox)?;
    assert_eq!( (bounded.width, bounded.height, bounded.band_count), (12, 6, 2));
    assert_eq!( bounded.colormaps, vec![None, Some(cmap.clone())]);
    assert_eq!( bounded.get_f64( 0, 0, 0), Some(3.0));
    assert_eq!( bounded.get_f64( 11, 0, 1), Some(0.0)); // east of source

    let clipped = clip_raster( &bounded, mapcrop_common::geo::Boundary::from_polygon( geo::polygon![
        (x: 2.0, y: 2.0), (x: 14.0, y: 2.0), (x: 14.0, y: 8.0), (x: 2.0, y: 8.0), (x: 2.0, y: 2.0)
    ])?.polygon())?;
    assert_eq!( clipped.colormaps, bounded.colormaps);
    assert_eq!( clipped.data, bounded.data);
    Ok(())
}

#[test]
fn test_single_band_palette_roundtrip() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("palette.tif");

    let gt = new_geotransform( LON, RES, 0.0, LAT, 0.0, -RES);
    let mut src = Raster::new( 4, 4, 1, gt, RasterData::U8( (0..16).collect()))?;
    let entries: Vec<[u16;3]> = (0..256u16).map( |i| [i*256, 0, 65535 - i*256]).collect();
    src.colormaps[0] = Some( ColorMap { entries });
    src.geokeys = Some( GeoKeys::epsg_4326());

    write_geotiff( &src, &path)?;
    let raster = read_geotiff( &path)?;
    assert_eq!( raster.colormaps, src.colormaps);
    assert_eq!( raster.data, src.data);
    Ok(())
}

#[test]
fn test_rotated_transform_rejected() -> Result<()> {
    let gt = new_geotransform( 0.0, 1.0, 0.2, 10.0, 0.1, -1.0);
    let src = Raster::new( 4, 4, 1, gt, RasterData::F32( vec![1.0; 16]))?;
    let poly = geo::polygon![ (x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 4.0), (x: 0.0, y: 4.0), (x: 0.0, y: 0.0) ];

    assert!( matches!( clip_raster( &src, &poly), Err(RasterError::RotatedTransform(_))));
    assert!( matches!( bound_raster( &src, &mapcrop_common::BoundingBox::new( 0.0, 0.0, 2.0, 2.0)), Err(RasterError::RotatedTransform(_))));
    Ok(())
}

#[test]
fn test_read_window_multi_strip() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("strips.tif");

    let src = centered_source()?;
    write_geotiff_strips( &src, &path, 16)?;

    let mut reader = GeoTiffReader::open( &path)?;
    assert_eq!( reader.chunk_dimensions(), (500, 16));

    let chunks = reader.window_chunks( 100, 40, 50, 20);
    println!("window 50x20+100+40 needs strips {:?} of {}", chunks, 500usize.div_ceil(16));
    assert_eq!( chunks, vec![2,3]);

    let window = reader.read_window( 100, 40, 50, 20)?;
    assert_eq!( (window.width, window.height, window.band_count), (50, 20, 3));
    assert_eq!( window.transform[0], src.transform[0] + 100.0 * RES);
    assert_eq!( window.transform[3], src.transform[3] - 40.0 * RES);
    for y in 0..20 {
        for x in 0..50 {
            for b in 0..3 {
                assert_eq!( window.get_f64(x,y,b), Some( sample(x+100, y+40, b) as f64));
            }
        }
    }

    // last strip is shorter than the others
    let tail = reader.read_window( 490, 495, 10, 5)?;
    assert_eq!( tail.get_f64(9,4,0), Some( sample(499,499,0) as f64));

    assert!( matches!( reader.read_window( 495, 0, 10, 1), Err(RasterError::InvalidDimensions(_))));
    Ok(())
}

#[test]
fn test_bound_file_reads_window() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let src_path = dir.path().join("src.tif");
    let bounded_path = dir.path().join("bounded.tif");

    // source only covers the east half of the boundary
    let src = make_source( LON, LAT + 250.0 * RES)?;
    write_geotiff_strips( &src, &src_path, 16)?;

    let boundary = Boundary::from_center_size( LON, LAT, 50.0, 50.0, CornerDistance::HalfDiagonal)?;
    let bounded = bound_file( &src_path, &boundary, &bounded_path)?;

    let full = read_geotiff( &src_path)?;
    let expected = bound_raster( &full, &boundary.bounds())?;
    assert_eq!( bounded, expected);
    assert_eq!( read_geotiff( &bounded_path)?, expected);

    // disjoint boundary gives an all fill raster
    let far = Boundary::from_center_size( LON - 1.0, LAT, 50.0, 50.0, CornerDistance::HalfDiagonal)?;
    let empty = bound_file( &src_path, &far, &bounded_path)?;
    assert!( (0..empty.height).all( |y| (0..empty.width).all( |x| empty.get_f64(x,y,0) == Some(0.0))));
    Ok(())
}
