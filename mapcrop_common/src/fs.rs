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

use std::fs::{self,File};
use std::io::{self,Read,Write,BufWriter};
use std::path::{Path,PathBuf};
use io::ErrorKind::*;
use tracing::{debug,warn};
use zip::ZipArchive;

use crate::{define_error, macros::io_error};

/// file extensions (lower case, without '.') we recognize as raster archive members
pub const RASTER_EXTENSIONS: [&str; 2] = ["tif", "tiff"];

define_error!{ pub FsError =
    IOError(#[from] std::io::Error) : "IO error: {0}",
    ZipError(#[from] zip::result::ZipError) : "zip error: {0}",
    NoRasterInArchive(PathBuf) : "no raster member in archive {0:?}"
}

pub type Result<T> = std::result::Result<T,FsError>;

pub fn filename<'a,T: AsRef<Path>> (path: &'a T)->Option<&'a str> {
    path.as_ref().file_name().and_then(|ostr| ostr.to_str())
}

pub fn ensure_dir (path: impl AsRef<Path>)->io::Result<()> {
    let path = path.as_ref();
    if !path.is_dir() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// check if dir pathname exists and is writable, try to create dir otherwise
pub fn ensure_writable_dir (path: impl AsRef<Path>) -> io::Result<()> {
    let path = path.as_ref();
    if path.is_dir() {
        let md = fs::metadata(&path)?;
        if md.permissions().readonly() {
            Err(io_error!(PermissionDenied, "output_dir {:?} not writable", &path))
        } else {
            Ok(())
        }

    } else if path.exists() {
        Err(io_error!(NotADirectory, "not a directory {:?}", &path))
    } else {
        fs::create_dir_all(path)
    }
}

/// return `path` if nothing exists there yet, otherwise the first `<path>_<n>` (n = 0,1,..) that is free.
/// This does not create anything - use [`ensure_writable_dir`] on the result
pub fn ensure_unique_dir (path: impl AsRef<Path>) -> io::Result<PathBuf> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(path.to_path_buf())
    }

    let name = filename(&path).ok_or( io_error!(InvalidFilename, "not a valid dir name {:?}", path))?;
    let parent = path.parent().unwrap_or( Path::new(""));

    let mut n: usize = 0;
    loop {
        let candidate = parent.join( format!("{name}_{n}"));
        if !candidate.exists() {
            debug!("{:?} exists, using {:?}", path, candidate);
            return Ok(candidate)
        }
        n += 1;
    }
}

pub fn is_raster_filename (name: &str) -> bool {
    match name.rfind('.') {
        Some(idx) => {
            let ext = name[idx+1..].to_ascii_lowercase();
            RASTER_EXTENSIONS.contains(&ext.as_str())
        }
        None => false
    }
}

/// extract the first raster member (in stored order) of the zip archive at `zip_path` into `dst_dir`,
/// returning the path of the extracted file. Member paths are kept relative to `dst_dir`.
/// Other raster members are ignored (with a warning).
pub fn extract_first_raster (zip_path: impl AsRef<Path>, dst_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let zip_path = zip_path.as_ref();
    let dst_dir = dst_dir.as_ref();

    let mut archive = ZipArchive::new( File::open(zip_path)?)?;
    let mut selected: Option<usize> = None;
    let mut ignored: Vec<String> = Vec::new();

    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        if !entry.is_dir() && is_raster_filename( entry.name()) {
            if selected.is_none() {
                selected = Some(i);
            } else {
                ignored.push( entry.name().to_string());
            }
        }
    }

    if !ignored.is_empty() {
        warn!("archive {:?} contains more than one raster, ignoring {:?}", zip_path, ignored);
    }

    let idx = selected.ok_or_else( || FsError::NoRasterInArchive(zip_path.to_path_buf()))?;
    let mut entry = archive.by_index(idx)?;

    // reject names that would escape dst_dir
    let rel_path = entry.enclosed_name()
        .ok_or_else( || io_error!(InvalidFilename, "unsafe archive member name {:?}", entry.name()))?;
    let path = dst_dir.join(rel_path);
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    let mut out = BufWriter::new( File::create(&path)?);
    let len = io::copy( &mut entry, &mut out)?;
    out.flush()?;

    debug!("extracted {} bytes from {:?} to {:?}", len, zip_path, path);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raster_filename() {
        assert!( is_raster_filename("odm_orthophoto.tif"));
        assert!( is_raster_filename("sub/ORTHO.TIFF"));
        assert!( is_raster_filename("a.Tif"));
        assert!( !is_raster_filename("tif"));
        assert!( !is_raster_filename("ortho.tif.aux.xml"));
        assert!( !is_raster_filename("readme.txt"));
    }
}
