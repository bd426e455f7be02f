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

///! common utility functions for network operations

use std::{fs::File, io::{self, Write}, path::Path};
use reqwest::{header::{HeaderMap,HeaderValue,AUTHORIZATION,CONTENT_TYPE}, Client, StatusCode, Response};
use serde::{de::DeserializeOwned,Serialize};
use tracing::{debug,info};

use crate::define_error;

/// streamed downloads are written and reported in blocks of this size, independent of network chunk sizes
pub const DOWNLOAD_BLOCK_SIZE: usize = 512 * 1024;

define_error!{ pub NetError = 
    IOError(#[from] std::io::Error) : "IO error: {0}",
    HttpError(#[from] reqwest::Error) : "http error: {0}",
    NotFoundError(String) : "not found {0}",
    StatusError(u16,String) : "response status {0} for {1}",
    SizeUnknown(String) : "no content-length for {0}",
    OpFailed(String) : "operation failed: {0}",
    ParseError(String) : "parse error: {0}"
}

pub type Result<T> = std::result::Result<T, NetError>;

/* #region progress reporting *******************************************************************/

/// sink for download progress, called after each written block with the cumulative number of bytes
/// read and the total (content-length) size
pub trait DownloadProgress {
    fn update (&mut self, bytes_read: u64, total: u64);
}

impl<F> DownloadProgress for F where F: FnMut(u64,u64) {
    fn update (&mut self, bytes_read: u64, total: u64) { self(bytes_read,total) }
}

/// the default progress sink, logs a fixed width progress bar at info level whenever it grows
pub struct ProgressBar {
    width: usize,
    last: Option<usize>
}

impl ProgressBar {
    pub fn new (width: usize)->Self { ProgressBar { width, last: None } }

    /// number of filled bar positions for given progress
    pub fn filled (&self, bytes_read: u64, total: u64)->usize {
        if total == 0 { 
            self.width 
        } else {
            ((bytes_read.min(total) as u128 * self.width as u128) / total as u128) as usize
        }
    }

    pub fn render (&self, filled: usize)->String {
        format!("Downloading [{}{}]", ".".repeat(filled), " ".repeat(self.width - filled.min(self.width)))
    }
}

impl Default for ProgressBar {
    fn default()->Self { ProgressBar::new(41) }
}

impl DownloadProgress for ProgressBar {
    fn update (&mut self, bytes_read: u64, total: u64) {
        let filled = self.filled( bytes_read, total);
        if self.last != Some(filled) {
            self.last = Some(filled);
            info!("{}", self.render(filled));
        }
    }
}

/// progress sink that ignores all updates
pub struct NoProgress;

impl DownloadProgress for NoProgress {
    fn update (&mut self, _bytes_read: u64, _total: u64) {}
}

/* #endregion progress reporting */

pub fn bearer_headers (token: &str) -> Result<HeaderMap> {
    let mut hm = HeaderMap::new();
    let v = HeaderValue::from_str( &format!("Bearer {token}")).map_err(|e| NetError::OpFailed(e.to_string()))?;
    hm.insert( AUTHORIZATION, v);
    Ok(hm)
}

fn status_error (url: &str, status: StatusCode)->NetError {
    if status == StatusCode::NOT_FOUND {
        NetError::NotFoundError(url.to_string())
    } else {
        NetError::StatusError( status.as_u16(), url.to_string())
    }
}

/// POST `data` as JSON and parse the JSON response body. Only 200 is accepted as success
pub async fn post_json_query<T,U> (client: &Client, url: &str, opt_headers: &Option<HeaderMap>, data: &T) -> Result<U> 
    where T: Serialize + ?Sized, U: DeserializeOwned 
{
    let mut headers = opt_headers.clone().unwrap_or_default();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    let req = client.post( url)
        .headers( headers)
        .json( data);

    let response = req.send().await?;

    match response.status() {
        StatusCode::OK => from_json(response).await,
        other => Err( status_error( url, other))
    }
}

/// stream the content of `url` into a file at `path`, reporting progress to `progress`.
/// This requires a content-length header, without one we fail before creating the file
pub async fn download_url (client: &Client, url: &str, opt_headers: &Option<HeaderMap>, path: impl AsRef<Path>, 
                           progress: &mut (dyn DownloadProgress + Send)) -> Result<u64> 
{
    let path = path.as_ref();
    let mut req = client.get(url);
    if let Some(headermap) = &opt_headers {
        req = req.headers(headermap.clone())
    }
    
    let mut response = req.send().await?;

    match response.status() {
        StatusCode::OK => {
            let total = response.content_length().ok_or_else( || NetError::SizeUnknown(url.to_string()))?;
            debug!("downloading {} bytes from {} to {:?}", total, url, path);

            let mut file = File::create(path)?;
            let mut block: Vec<u8> = Vec::with_capacity( DOWNLOAD_BLOCK_SIZE);
            let mut len: u64 = 0;

            while let Some(chunk) = response.chunk().await? {
                let mut data: &[u8] = &chunk;
                while !data.is_empty() {
                    let n = (DOWNLOAD_BLOCK_SIZE - block.len()).min( data.len());
                    block.extend_from_slice( &data[..n]);
                    data = &data[n..];

                    if block.len() == DOWNLOAD_BLOCK_SIZE {
                        len += write_block( &mut file, &mut block)?;
                        progress.update( len, total);
                    }
                }
            }

            if !block.is_empty() {
                len += write_block( &mut file, &mut block)?;
                progress.update( len, total);
            }

            file.flush()?;
            Ok(len)
        }
        other => Err( status_error( url, other))
    }
}

fn write_block (file: &mut File, block: &mut Vec<u8>) -> io::Result<u64> {
    file.write_all( block)?;
    let n = block.len() as u64;
    block.clear();
    Ok(n)
}

pub async fn from_json<T> (response: Response)->Result<T> where T: DeserializeOwned {
    let bytes = response.bytes().await?;
    serde_json::from_slice( &bytes).map_err(|e| NetError::ParseError(e.to_string()))
}
