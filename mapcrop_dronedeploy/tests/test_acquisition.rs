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

use std::{collections::VecDeque, io::{Cursor, Write}, path::Path, sync::{Arc, Mutex}, time::Duration};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use zip::{ZipWriter, write::SimpleFileOptions};

use mapcrop_common::net::{DownloadProgress, NoProgress};
use mapcrop_dronedeploy::{
    AcquisitionState, DroneDeployError, ExportAcquisition, ExportId, PlanId, PollPolicy, QueryGateway,
    errors::Result as DdResult
};

// run with "cargo test test_poll -- --nocapture"

const DOWNLOAD_URL: &str = "https://fake.dronedeploy.com/exports/export.zip";

#[derive(Default)]
struct FakeState {
    exports: Vec<Value>,
    statuses: VecDeque<&'static str>,
    fail_with: Option<u16>,
    archive: Vec<u8>,
    download_delay: Option<Duration>,

    queries: Vec<String>,
    created: u32,
    export_fetches: u32,
    downloads: Vec<String>,
}

/// a scripted in-memory DroneDeploy endpoint
#[derive(Clone,Default)]
struct FakeGateway {
    state: Arc<Mutex<FakeState>>
}

impl FakeGateway {
    fn with (f: impl FnOnce(&mut FakeState))->Self {
        let gw = FakeGateway::default();
        if let Ok(mut state) = gw.state.lock() { f(&mut state) }
        gw
    }

    fn created (&self)->u32 { self.state.lock().unwrap().created }
    fn export_fetches (&self)->u32 { self.state.lock().unwrap().export_fetches }
    fn downloads (&self)->Vec<String> { self.state.lock().unwrap().downloads.clone() }
}

fn export_node (id: &str, status: &str, resolution: u32, layer: &str, file_format: &str)->Value {
    json!({
        "id": id,
        "status": status,
        "parameters": { "resolution": resolution, "fileFormat": file_format, "layer": layer },
        "downloadPath": null
    })
}

#[async_trait]
impl QueryGateway for FakeGateway {
    async fn execute (&self, query: &str) -> DdResult<Value> {
        let mut state = self.state.lock().unwrap();
        state.queries.push( query.to_string());

        if let Some(status) = state.fail_with {
            return Err( DroneDeployError::Transport { status, query: query.to_string() })
        }

        if query.starts_with("mutation") {
            state.created += 1;
            Ok( json!({ "data": { "createExport": { "export": { "id": format!("Export:new{}", state.created) }}}}) )

        } else if query.contains("exports(first:") {
            let edges: Vec<Value> = state.exports.iter().map( |e| json!({ "node": e })).collect();
            Ok( json!({ "data": { "node": { "exports": { "edges": edges }}}}) )

        } else if query.contains("export(id:") {
            state.export_fetches += 1;
            let status = if state.statuses.len() > 1 { state.statuses.pop_front() } else { state.statuses.front().copied() };
            let status = status.unwrap_or("QUEUED");
            let download_path = if status == "COMPLETE" { Value::from(DOWNLOAD_URL) } else { Value::Null };
            Ok( json!({ "data": { "export": {
                "id": "Export:x",
                "status": status,
                "parameters": { "projection": 4326, "merge": false, "contourInterval": null, "layer": "ORTHOMOSAIC", "fileFormat": "GEO_TIFF", "resolution": 5 },
                "downloadPath": download_path
            }}}) )

        } else {
            Ok( json!({ "data": null, "errors": [ { "message": "unknown query" } ] }) )
        }
    }

    async fn fetch_artifact (&self, url: &str, path: &Path, progress: &mut (dyn DownloadProgress + Send)) -> DdResult<u64> {
        let (data, delay) = {
            let mut state = self.state.lock().unwrap();
            state.downloads.push( url.to_string());
            (state.archive.clone(), state.download_delay)
        };

        if let Some(delay) = delay { // a slow transfer that already wrote some data
            std::fs::write( path, &data[..data.len()/2])?;
            tokio::time::sleep( delay).await;
        }
        std::fs::write( path, &data)?;
        progress.update( data.len() as u64, data.len() as u64);
        Ok( data.len() as u64 )
    }
}

fn plan ()->PlanId { PlanId::new("5c8ea7821cf131376f7a8743").unwrap() }

fn policy (max_attempts: Option<u32>, deadline: Option<Duration>)->PollPolicy {
    PollPolicy { interval: Duration::from_secs(5), max_attempts, deadline }
}

fn acquisition (gw: &FakeGateway, policy: PollPolicy)->ExportAcquisition<FakeGateway> {
    ExportAcquisition::new( gw.clone(), policy, 100, CancellationToken::new())
}

fn zip_archive (members: &[(&str,&[u8])]) -> Result<Vec<u8>> {
    let mut zw = ZipWriter::new( Cursor::new( Vec::new()));
    for (name,data) in members {
        zw.start_file( *name, SimpleFileOptions::default())?;
        zw.write_all( data)?;
    }
    Ok( zw.finish()?.into_inner() )
}

//--- acquire

#[tokio::test]
async fn test_acquire_reuses_in_flight_export() -> Result<()> {
    let gw = FakeGateway::with( |s| {
        s.exports = vec![
            export_node( "Export:done", "COMPLETE", 5, "ORTHOMOSAIC", "GEO_TIFF"),
            export_node( "Export:otherres", "QUEUED", 10, "ORTHOMOSAIC", "GEO_TIFF"),
            export_node( "Export:dsm", "PROCESSING", 5, "DSM", "GEO_TIFF"),
            export_node( "Export:inflight", "PROCESSING", 5, "ORTHOMOSAIC", "GEO_TIFF"),
        ];
    });
    let mut acq = acquisition( &gw, PollPolicy::default());

    let id = acq.acquire( &plan(), 5).await?;
    println!("acquired {id}");

    assert_eq!( id, ExportId::new("inflight")?);
    assert_eq!( gw.created(), 0);
    assert_eq!( acq.state(), &AcquisitionState::FoundInFlight( id));
    Ok(())
}

#[tokio::test]
async fn test_acquire_creates_export() -> Result<()> {
    let gw = FakeGateway::with( |s| {
        s.exports = vec![ export_node( "Export:done", "COMPLETE", 5, "ORTHOMOSAIC", "GEO_TIFF") ];
    });
    let mut acq = acquisition( &gw, PollPolicy::default());

    let id = acq.acquire( &plan(), 5).await?;
    assert_eq!( id, ExportId::new("new1")?);
    assert_eq!( gw.created(), 1);
    assert_eq!( acq.state(), &AcquisitionState::Requested( id));

    let queries = gw.state.lock().unwrap().queries.clone();
    assert_eq!( queries.len(), 2);
    assert!( queries[1].contains(r#"planId: "MapPlan:5c8ea7821cf131376f7a8743""#));
    assert!( queries[1].contains("layer: ORTHOMOSAIC, resolution: 5, projection: 4326"));
    Ok(())
}

#[tokio::test]
async fn test_acquire_skips_foreign_exports() -> Result<()> {
    // exports created elsewhere can have fractional resolutions or no parameters at all
    let foreign = json!({ "id": "Export:foreign", "status": "PROCESSING",
        "parameters": { "resolution": 2.5, "fileFormat": "GEO_TIFF", "layer": "ORTHOMOSAIC" }, "downloadPath": null });
    let no_params = json!({ "id": "Export:noparams", "status": "QUEUED", "parameters": null });
    let garbled = json!({ "id": 42, "status": ["QUEUED"] });

    let gw = FakeGateway::with( |s| {
        s.exports = vec![ foreign.clone(), no_params.clone(), garbled.clone(),
                          export_node( "Export:inflight", "QUEUED", 5, "ORTHOMOSAIC", "GEO_TIFF") ];
    });
    let mut acq = acquisition( &gw, PollPolicy::default());
    assert_eq!( acq.acquire( &plan(), 5).await?, ExportId::new("inflight")?);
    assert_eq!( gw.created(), 0);

    let gw = FakeGateway::with( |s| s.exports = vec![ foreign, no_params, garbled ]);
    let mut acq = acquisition( &gw, PollPolicy::default());
    assert_eq!( acq.acquire( &plan(), 2).await?, ExportId::new("new1")?);
    assert_eq!( gw.created(), 1);

    // integral float resolutions do match
    let gw = FakeGateway::with( |s| {
        s.exports = vec![ json!({ "id": "Export:float", "status": "PROCESSING",
            "parameters": { "resolution": 5.0, "fileFormat": "GEO_TIFF", "layer": "ORTHOMOSAIC" }}) ];
    });
    let mut acq = acquisition( &gw, PollPolicy::default());
    assert_eq!( acq.acquire( &plan(), 5).await?, ExportId::new("float")?);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_acquisitions_race() -> Result<()> {
    // both see no in-flight export and both create one - documented, but state stays consistent
    let gw = FakeGateway::default();
    let mut acq1 = acquisition( &gw, PollPolicy::default());
    let mut acq2 = acquisition( &gw, PollPolicy::default());
    let p = plan();

    let (r1, r2) = tokio::join!( acq1.acquire( &p, 5), acq2.acquire( &p, 5));
    let (id1, id2) = (r1?, r2?);

    assert_ne!( id1, id2);
    assert_eq!( gw.created(), 2);
    assert_eq!( acq1.state(), &AcquisitionState::Requested( id1));
    assert_eq!( acq2.state(), &AcquisitionState::Requested( id2));
    Ok(())
}

#[tokio::test]
async fn test_transport_error() -> Result<()> {
    let gw = FakeGateway::with( |s| s.fail_with = Some(500));
    let mut acq = acquisition( &gw, PollPolicy::default());

    match acq.acquire( &plan(), 5).await {
        Err(DroneDeployError::Transport { status, query }) => {
            assert_eq!( status, 500);
            assert!( query.contains("GetExports"));
        }
        other => panic!("unexpected result: {:?}", other)
    }
    assert_eq!( acq.state(), &AcquisitionState::None);
    Ok(())
}

//--- poll

#[tokio::test(start_paused = true)]
async fn test_poll_until_complete() -> Result<()> {
    let gw = FakeGateway::with( |s| s.statuses = VecDeque::from( vec!["QUEUED", "PROCESSING", "PROCESSING", "COMPLETE"]));
    let mut acq = acquisition( &gw, PollPolicy::default());
    let id = ExportId::new("x")?;

    let start = Instant::now();
    let export = acq.poll( &id).await?;
    let elapsed = start.elapsed();
    println!("complete after {:?}", elapsed);

    assert_eq!( gw.export_fetches(), 4);
    assert!( elapsed >= Duration::from_secs(15) && elapsed < Duration::from_secs(16));
    assert_eq!( export.download_path.as_deref(), Some(DOWNLOAD_URL));
    assert!( matches!( acq.state(), AcquisitionState::Complete(_)));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_poll_failed_export() -> Result<()> {
    let gw = FakeGateway::with( |s| s.statuses = VecDeque::from( vec!["QUEUED", "FAILED"]));
    let mut acq = acquisition( &gw, PollPolicy::default());

    let res = acq.poll( &ExportId::new("x")?).await;
    assert!( matches!( res, Err(DroneDeployError::ExportFailed(_))));
    assert_eq!( gw.export_fetches(), 2);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_poll_attempt_limit() -> Result<()> {
    let gw = FakeGateway::with( |s| s.statuses = VecDeque::from( vec!["PROCESSING"]));
    let mut acq = acquisition( &gw, policy( Some(3), None));

    let res = acq.poll( &ExportId::new("x")?).await;
    assert!( matches!( res, Err(DroneDeployError::PollLimitExceeded { attempts: 3 })));
    assert_eq!( gw.export_fetches(), 3);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_poll_deadline() -> Result<()> {
    let gw = FakeGateway::with( |s| s.statuses = VecDeque::from( vec!["PROCESSING"]));
    let mut acq = acquisition( &gw, policy( None, Some( Duration::from_secs(12))));

    let start = Instant::now();
    let res = acq.poll( &ExportId::new("x")?).await;
    assert!( matches!( res, Err(DroneDeployError::PollDeadlineExceeded(_))));
    assert_eq!( gw.export_fetches(), 3); // at 0s, 5s and 10s
    assert!( start.elapsed() <= Duration::from_secs(12));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_poll_cancelled() -> Result<()> {
    let gw = FakeGateway::with( |s| s.statuses = VecDeque::from( vec!["PROCESSING"]));
    let cancel = CancellationToken::new();
    let mut acq = ExportAcquisition::new( gw.clone(), PollPolicy::default(), 100, cancel.clone());

    let canceller = cancel.clone();
    tokio::spawn( async move {
        tokio::time::sleep( Duration::from_secs(7)).await;
        canceller.cancel();
    });

    let start = Instant::now();
    let res = acq.poll( &ExportId::new("x")?).await;
    assert!( matches!( res, Err(DroneDeployError::Cancelled)));
    assert_eq!( gw.export_fetches(), 2);
    assert!( start.elapsed() < Duration::from_secs(10));

    // already cancelled, we don't fetch anymore
    let res = acq.poll( &ExportId::new("x")?).await;
    assert!( matches!( res, Err(DroneDeployError::Cancelled)));
    assert_eq!( gw.export_fetches(), 2);
    Ok(())
}

//--- retrieve

#[tokio::test]
async fn test_retrieve_requires_complete() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("dronedeploy.zip");

    for status in ["QUEUED", "PROCESSING", "FAILED"] {
        let gw = FakeGateway::with( |s| s.statuses = VecDeque::from( vec![status]));
        let mut acq = acquisition( &gw, PollPolicy::default());

        match acq.retrieve( &ExportId::new("x")?, &path, &mut NoProgress).await {
            Err(DroneDeployError::IncompleteExport { status: s, .. }) => assert_eq!( s, status),
            other => panic!("unexpected result: {:?}", other)
        }
        assert!( gw.downloads().is_empty());
        assert!( !path.exists());
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_retrieve_cancelled_during_download() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("dronedeploy.zip");

    let gw = FakeGateway::with( |s| {
        s.statuses = VecDeque::from( vec!["COMPLETE"]);
        s.archive = vec![7u8; 4096];
        s.download_delay = Some( Duration::from_secs(60));
    });
    let cancel = CancellationToken::new();
    let mut acq = ExportAcquisition::new( gw.clone(), PollPolicy::default(), 100, cancel.clone());

    let canceller = cancel.clone();
    tokio::spawn( async move {
        tokio::time::sleep( Duration::from_secs(10)).await;
        canceller.cancel();
    });

    let start = Instant::now();
    let res = acq.retrieve( &ExportId::new("x")?, &path, &mut NoProgress).await;
    println!("download ended after {:?} with {:?}", start.elapsed(), res);

    assert!( matches!( res, Err(DroneDeployError::Cancelled)));
    assert!( start.elapsed() < Duration::from_secs(11));
    assert_eq!( gw.downloads().len(), 1);
    assert!( !path.exists());
    assert_eq!( acq.state(), &AcquisitionState::None);

    // no new download once cancelled
    let res = acq.retrieve( &ExportId::new("x")?, &path, &mut NoProgress).await;
    assert!( matches!( res, Err(DroneDeployError::Cancelled)));
    assert_eq!( gw.downloads().len(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_get_geotiff() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let archive = zip_archive( &[ ("report.pdf", b"%PDF"), ("ortho/map.tif", b"II*\0tiffdata") ])?;
    let gw = FakeGateway::with( |s| {
        s.statuses = VecDeque::from( vec!["QUEUED", "COMPLETE"]);
        s.archive = archive;
    });
    let mut acq = acquisition( &gw, PollPolicy::default());

    let path = acq.get_geotiff( &plan(), 5, dir.path()).await?;
    println!("got {:?}", path);

    assert_eq!( path, dir.path().join("ortho/map.tif"));
    assert_eq!( std::fs::read(&path)?, b"II*\0tiffdata");
    assert!( dir.path().join("dronedeploy.zip").is_file());
    assert_eq!( gw.downloads(), vec![DOWNLOAD_URL.to_string()]);
    assert_eq!( acq.state(), &AcquisitionState::Retrieved( dir.path().join("dronedeploy.zip")));
    Ok(())
}

#[tokio::test]
async fn test_shape_error() -> Result<()> {
    let gw = FakeGateway::default();
    let client = mapcrop_dronedeploy::DroneDeployClient::new( gw);

    // our fake does not know this one and answers without data
    let res = client.gateway().execute("query { projects { edges { node { id } } } }").await?;
    let res: DdResult<Vec<Value>> = mapcrop_dronedeploy::gateway::extract( &res, "data.projects.edges");
    assert!( matches!( res, Err(DroneDeployError::Shape(_))));
    Ok(())
}
