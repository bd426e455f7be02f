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

use mapcrop_common::define_error;

pub type Result<T> = std::result::Result<T, RasterError>;

define_error!{ pub RasterError = 
    IOError(#[from] std::io::Error) : "IO error: {0}",
    TiffError(#[from] tiff::TiffError) : "Tiff error: {0}",
    GeoError(#[from] mapcrop_common::geo::GeoError) : "boundary error: {0}",
    UnsupportedFormat(String) : "unsupported raster format: {0}",
    MissingGeoreference(String) : "no georeference: {0}",
    RotatedTransform(String) : "rotated geotransform not supported: {0}",
    InvalidTransform(String) : "invalid geotransform: {0}",
    InvalidExtent(String) : "invalid extent: {0}",
    InvalidDimensions(String) : "invalid dimension error: {0}",
    ColormapAbsent(usize) : "no colormap for band {0}"
}
