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

///! loading of RON configuration files

use std::path::Path;
use serde::Deserialize;

use crate::define_error;

define_error!{ pub ConfigError = 
    IOError(#[from] std::io::Error) : "IO error: {0}",
    RonError(#[from] ron::error::SpannedError) : "RON error: {0}"
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// load a RON config for type C from the given path
pub fn load_config_path<C,P> (path: P) -> Result<C> where C: for <'a> Deserialize<'a>, P: AsRef<Path> {
    let data = std::fs::read(path.as_ref())?;
    Ok( ron::de::from_bytes( data.as_slice())? )
}

/// load an optional config path, falling back to the `Default` of C if there is none
pub fn load_config_or_default<C,P> (opt_path: Option<P>) -> Result<C> where C: for <'a> Deserialize<'a> + Default, P: AsRef<Path> {
    match opt_path {
        Some(path) => load_config_path(path),
        None => Ok( C::default() )
    }
}
