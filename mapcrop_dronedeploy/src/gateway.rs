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

use std::path::Path;
use async_trait::async_trait;
use reqwest::{Client, header::HeaderMap};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;
use mapcrop_common::net::{self, NetError, DownloadProgress, bearer_headers, download_url, post_json_query};

use crate::{DroneDeployConfig, errors::{DroneDeployError, Result, shape_error}};

/// the remote side of DroneDeploy access. `QueryGateway` instances are injected into
/// [crate::DroneDeployClient] so that we can run acquisition against a simulated endpoint
#[async_trait]
pub trait QueryGateway: Send + Sync {
    /// run a GraphQL query or mutation and return the (uninterpreted) JSON response
    async fn execute (&self, query: &str) -> Result<Value>;

    /// stream the artifact at `url` into `path`, returning the number of bytes retrieved
    async fn fetch_artifact (&self, url: &str, path: &Path, progress: &mut (dyn DownloadProgress + Send)) -> Result<u64>;
}

/// the reqwest based gateway for the DroneDeploy GraphQL endpoint
pub struct LiveGateway {
    client: Client,
    url: String,
    headers: Option<HeaderMap>
}

impl LiveGateway {
    pub fn new (config: &DroneDeployConfig, api_key: &str) -> Result<Self> {
        let headers = Some( bearer_headers( api_key)?);
        Ok( LiveGateway { client: Client::new(), url: config.url.clone(), headers } )
    }

    /// use the api_key from the config
    pub fn from_config (config: &DroneDeployConfig) -> Result<Self> {
        let api_key = config.api_key.as_deref().ok_or( DroneDeployError::MissingApiKey)?;
        Self::new( config, api_key)
    }
}

#[async_trait]
impl QueryGateway for LiveGateway {
    async fn execute (&self, query: &str) -> Result<Value> {
        debug!("executing query: {}", query);
        let body = json!({ "query": query });

        match post_json_query::<Value,Value>( &self.client, &self.url, &self.headers, &body).await {
            Ok(v) => Ok(v),
            Err(NetError::StatusError(status,_)) => Err( DroneDeployError::Transport { status, query: query.to_string() }),
            Err(NetError::NotFoundError(_)) => Err( DroneDeployError::Transport { status: 404, query: query.to_string() }),
            Err(NetError::ParseError(msg)) => Err( shape_error!("response is not JSON: {}", msg)),
            Err(e) => Err( e.into())
        }
    }

    async fn fetch_artifact (&self, url: &str, path: &Path, progress: &mut (dyn DownloadProgress + Send)) -> Result<u64> {
        // download paths are pre-signed, no need for credentials
        Ok( download_url( &self.client, url, &None, path, progress).await? )
    }
}

/// get the value at a '.' separated path of object keys, failing with a Shape error if any key is missing
pub fn json_at<'a> (value: &'a Value, path: &str) -> Result<&'a Value> {
    let mut v = value;
    for key in path.split('.') {
        v = v.get(key).ok_or_else( || shape_error!("missing '{}' in response path '{}'", key, path))?;
    }
    Ok(v)
}

/// deserialize the value at `path` into T
pub fn extract<T: DeserializeOwned> (value: &Value, path: &str) -> Result<T> {
    let v = json_at( value, path)?;
    T::deserialize(v).map_err( |e| shape_error!("unexpected value at '{}': {}", path, e))
}
