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

//! geodesic construction of rectangular boundary polygons around a center location,
//! and their (single feature) GeoJSON representation.
//! All coordinates are WGS84 degrees in (lon,lat) order, distances are in meters.

use std::path::Path;
use serde::{Serialize,Deserialize};
use geo::{Coord, LineString, Point, Polygon};
use geo::algorithm::line_measures::Destination;
use geo::algorithm::line_measures::metric_spaces::Geodesic;
use geojson::{Feature, Geometry, JsonObject};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::{define_error, BoundingBox};

define_error!{ pub GeoError =
    IOError(#[from] std::io::Error) : "IO error: {0}",
    JsonError(#[from] serde_json::Error) : "JSON error: {0}",
    GeoJsonError(#[from] geojson::Error) : "GeoJSON error: {0}",
    InvalidSize(String) : "invalid boundary size: {0}",
    InvalidBoundary(String) : "invalid boundary: {0}"
}

pub type Result<T> = std::result::Result<T,GeoError>;

lazy_static! {
    // "(lon,lat)" with optional parens and whitespace
    static ref LON_LAT_RE: Regex = Regex::new( r"^\s*\(?\s*([-+]?[0-9]*\.?[0-9]+(?:[eE][-+]?[0-9]+)?)\s*,\s*([-+]?[0-9]*\.?[0-9]+(?:[eE][-+]?[0-9]+)?)\s*\)?\s*$").unwrap();
}

/// parse a location spec such as "(-99.55057,28.7803)" into (lon,lat) degrees
pub fn parse_lon_lat (s: &str) -> Option<(f64,f64)> {
    let cap = LON_LAT_RE.captures(s)?;
    let lon: f64 = cap.get(1)?.as_str().parse().ok()?;
    let lat: f64 = cap.get(2)?.as_str().parse().ok()?;
    if (-180.0..=180.0).contains(&lon) && (-90.0..=90.0).contains(&lat) { Some((lon,lat)) } else { None }
}

/// the distance from center to each corner used when projecting boundary corners
#[derive(Debug,Clone,Copy,PartialEq,Eq,Serialize,Deserialize,Default)]
pub enum CornerDistance {
    /// the complete rectangle diagonal, which yields a rectangle of twice the requested size
    #[default]
    FullDiagonal,
    /// half the diagonal, i.e. a rectangle of the requested size centered on the location
    HalfDiagonal
}

impl CornerDistance {
    pub fn distance (&self, size_x: f64, size_y: f64)->f64 {
        let diag = size_x.hypot(size_y);
        match self {
            CornerDistance::FullDiagonal => diag,
            CornerDistance::HalfDiagonal => diag / 2.0
        }
    }
}

/// corner bearings in degrees (clockwise from north) for a rectangle of size_x (east-west) and size_y (north-south),
/// in NE, NW, SW, SE order
pub fn corner_azimuths (size_x: f64, size_y: f64) -> [f64;4] {
    let a = (size_x / size_y).atan().to_degrees();
    [ a, -a, a + 180.0, -a + 180.0 ]
}

/// a closed 4-corner polygon (5 points, first == last) in lon/lat degrees
#[derive(Debug,Clone,PartialEq)]
pub struct Boundary {
    polygon: Polygon<f64>
}

impl Boundary {
    /// project the 4 corners of a size_x * size_y meter rectangle around (lon,lat) on the WGS84 ellipsoid
    pub fn from_center_size (lon: f64, lat: f64, size_x: f64, size_y: f64, corner_distance: CornerDistance) -> Result<Self> {
        if !(size_x.is_finite() && size_x > 0.0 && size_y.is_finite() && size_y > 0.0) {
            return Err( GeoError::InvalidSize( format!("{size_x} x {size_y}")))
        }
        if !(lon.is_finite() && lat.is_finite() && lat.abs() <= 90.0) {
            return Err( GeoError::InvalidBoundary( format!("center out of range ({lon},{lat})")))
        }

        let center = Point::new( lon, lat);
        let dist = corner_distance.distance( size_x, size_y);

        let mut coords: Vec<Coord<f64>> = corner_azimuths( size_x, size_y).iter()
            .map( |az| Geodesic.destination( center, *az, dist).0 )
            .collect();
        coords.push( coords[0]);

        debug!("boundary around ({},{}) for {}x{}m at corner distance {:.3}m: {:?}", lon, lat, size_x, size_y, dist, coords);
        Ok( Boundary { polygon: Polygon::new( LineString::new(coords), vec![]) } )
    }

    /// wrap an existing polygon, which has to be a closed ring of 4 distinct corners
    pub fn from_polygon (polygon: Polygon<f64>) -> Result<Self> {
        let ring = &polygon.exterior().0;
        if ring.len() != 5 {
            return Err( GeoError::InvalidBoundary( format!("expected 5 ring points, got {}", ring.len())))
        }
        if ring[0] != ring[4] {
            return Err( GeoError::InvalidBoundary( "ring not closed".into()))
        }
        if ring.iter().any( |c| !(c.x.is_finite() && c.y.is_finite())) {
            return Err( GeoError::InvalidBoundary( "non-finite coordinate".into()))
        }
        Ok( Boundary { polygon })
    }

    pub fn polygon (&self) -> &Polygon<f64> { &self.polygon }

    /// the closed ring, 5 points
    pub fn points (&self) -> &[Coord<f64>] { &self.polygon.exterior().0 }

    /// the 4 distinct corners
    pub fn corners (&self) -> [Coord<f64>;4] {
        let p = self.points();
        [ p[0], p[1], p[2], p[3] ]
    }

    /// planar (lon/lat) bounding box of the corners
    pub fn bounds (&self) -> BoundingBox<f64> {
        let cs = self.corners();
        let mut bb = BoundingBox::new( cs[0].x, cs[0].y, cs[0].x, cs[0].y);
        for c in &cs[1..] {
            bb.west = bb.west.min(c.x);
            bb.east = bb.east.max(c.x);
            bb.south = bb.south.min(c.y);
            bb.north = bb.north.max(c.y);
        }
        bb
    }

    /// single feature with polygon geometry and empty properties
    pub fn to_feature (&self) -> Feature {
        Feature {
            bbox: None,
            geometry: Some( Geometry::new( geojson::Value::from( &self.polygon))),
            id: None,
            properties: Some( JsonObject::new()),
            foreign_members: None
        }
    }

    pub fn from_feature (feature: Feature) -> Result<Self> {
        let geometry = feature.geometry.ok_or_else( || GeoError::InvalidBoundary( "feature has no geometry".into()))?;
        let polygon = Polygon::<f64>::try_from( geometry.value)?;
        Boundary::from_polygon( polygon)
    }

    pub fn to_geojson_string (&self) -> Result<String> {
        Ok( serde_json::to_string( &self.to_feature())? )
    }

    pub fn write_geojson (&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write( path, self.to_geojson_string()?)?;
        debug!("boundary written to {:?}", path);
        Ok(())
    }

    pub fn read_geojson (path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string( path)?;
        let feature: Feature = serde_json::from_str( &s)?;
        Boundary::from_feature( feature)
    }
}
