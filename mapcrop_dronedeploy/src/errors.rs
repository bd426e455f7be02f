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

use thiserror::Error;
use std::time::Duration;
use mapcrop_common;

pub type Result<T> = std::result::Result<T,DroneDeployError>;

#[derive(Error,Debug)]
pub enum DroneDeployError {
    /// the endpoint answered with a non-success HTTP status
    #[error("query failed to run by returning code of {status}: {query}")]
    Transport { status: u16, query: String },

    /// a successful response did not have the expected structure
    #[error("unexpected response shape: {0}")]
    Shape(String),

    #[error("export {id} not complete (status {status})")]
    IncompleteExport { id: String, status: String },

    #[error("export {0} failed")]
    ExportFailed(String),

    #[error("export acquisition cancelled")]
    Cancelled,

    #[error("export not complete after {attempts} polls")]
    PollLimitExceeded { attempts: u32 },

    #[error("export not complete within {0:?}")]
    PollDeadlineExceeded(Duration),

    #[error("invalid identifier {0:?}")]
    InvalidId(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("no API key configured")]
    MissingApiKey,

    #[error("net error {0}")]
    NetError( #[from] mapcrop_common::net::NetError),

    #[error("file error {0}")]
    FsError( #[from] mapcrop_common::fs::FsError),

    #[error("IO error {0}")]
    IOError( #[from] std::io::Error),

    #[error("serde error {0}")]
    SerdeError( #[from] serde_json::Error),

    #[error("config error {0}")]
    ConfigError( #[from] mapcrop_common::config::ConfigError),
}

macro_rules! shape_error {
    ($fmt:literal $(, $arg:expr )* ) => {
        crate::errors::DroneDeployError::Shape( format!( $fmt $(, $arg)* ))
    };
}
pub (crate) use shape_error;

macro_rules! invalid_query {
    ($fmt:literal $(, $arg:expr )* ) => {
        crate::errors::DroneDeployError::InvalidQuery( format!( $fmt $(, $arg)* ))
    };
}
pub (crate) use invalid_query;
