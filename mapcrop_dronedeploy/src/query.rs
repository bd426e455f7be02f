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

//! a small GraphQL document builder. Argument values are rendered as escaped literals and all
//! names are validated, so that identifiers coming from users cannot change the query structure

use std::fmt::Write;
use lazy_static::lazy_static;
use regex::Regex;

use crate::{PlanId, ExportId, ORTHOMOSAIC, EPSG_4326, errors::{Result, invalid_query}};

lazy_static! {
    static ref NAME_RE: Regex = Regex::new( r"^[_A-Za-z][_0-9A-Za-z]*$").unwrap();
}

fn check_name (name: &str) -> Result<()> {
    if NAME_RE.is_match(name) { Ok(()) } else { Err( invalid_query!("invalid name {:?}", name)) }
}

/// GraphQL string literal with escaped quotes, backslashes and control chars
pub fn escape_string (s: &str) -> String {
    let mut out = String::with_capacity( s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => { let _ = write!( out, "\\u{:04x}", c as u32); }
            c => out.push(c)
        }
    }
    out.push('"');
    out
}

#[derive(Debug,Clone,PartialEq)]
pub enum Arg {
    Str(String),
    Int(i64),
    Enum(String),
    Object(Vec<(String,Arg)>)
}

impl Arg {
    pub fn str (s: impl Into<String>)->Self { Arg::Str(s.into()) }

    fn render (&self, out: &mut String) -> Result<()> {
        match self {
            Arg::Str(s) => out.push_str( &escape_string(s)),
            Arg::Int(i) => { let _ = write!( out, "{i}"); }
            Arg::Enum(e) => { check_name(e)?; out.push_str(e) }
            Arg::Object(fields) => {
                out.push('{');
                for (i,(k,v)) in fields.iter().enumerate() {
                    check_name(k)?;
                    if i > 0 { out.push_str(", ") }
                    out.push_str(k);
                    out.push_str(": ");
                    v.render(out)?;
                }
                out.push('}');
            }
        }
        Ok(())
    }
}

/// a field selection with optional arguments, type condition (inline fragment) and sub-selections
#[derive(Debug,Clone,PartialEq)]
pub struct Field {
    name: String,
    args: Vec<(String,Arg)>,
    on_type: Option<String>,
    fields: Vec<Field>
}

impl Field {
    pub fn new (name: &str)->Self {
        Field { name: name.to_string(), args: Vec::new(), on_type: None, fields: Vec::new() }
    }

    pub fn arg (mut self, name: &str, value: Arg)->Self {
        self.args.push( (name.to_string(), value));
        self
    }

    /// wrap our sub-selections into `... on <type_name> { }`
    pub fn on (mut self, type_name: &str)->Self {
        self.on_type = Some(type_name.to_string());
        self
    }

    pub fn field (mut self, field: Field)->Self {
        self.fields.push(field);
        self
    }

    pub fn fields (mut self, names: &[&str])->Self {
        for name in names { self.fields.push( Field::new(name)) }
        self
    }

    fn render (&self, out: &mut String, level: usize) -> Result<()> {
        check_name( &self.name)?;
        indent( out, level);
        out.push_str( &self.name);

        if !self.args.is_empty() {
            out.push('(');
            for (i,(k,v)) in self.args.iter().enumerate() {
                check_name(k)?;
                if i > 0 { out.push_str(", ") }
                out.push_str(k);
                out.push_str(": ");
                v.render(out)?;
            }
            out.push(')');
        }

        if !self.fields.is_empty() {
            out.push_str(" {\n");
            let mut sub_level = level + 1;
            if let Some(t) = &self.on_type {
                check_name(t)?;
                indent( out, sub_level);
                out.push_str("... on ");
                out.push_str(t);
                out.push_str(" {\n");
                sub_level += 1;
            }
            for f in &self.fields {
                f.render( out, sub_level)?;
            }
            if self.on_type.is_some() {
                indent( out, level + 1);
                out.push_str("}\n");
            }
            indent( out, level);
            out.push('}');
        }
        out.push('\n');
        Ok(())
    }
}

fn indent (out: &mut String, level: usize) {
    for _ in 0..level { out.push_str("  ") }
}

#[derive(Debug,Clone,Copy,PartialEq)]
pub enum OperationKind { Query, Mutation }

#[derive(Debug,Clone,PartialEq)]
pub struct Operation {
    kind: OperationKind,
    name: Option<String>,
    fields: Vec<Field>
}

impl Operation {
    pub fn query (name: Option<&str>)->Self { Operation { kind: OperationKind::Query, name: name.map(|s| s.to_string()), fields: Vec::new() } }

    pub fn mutation (name: Option<&str>)->Self { Operation { kind: OperationKind::Mutation, name: name.map(|s| s.to_string()), fields: Vec::new() } }

    pub fn field (mut self, field: Field)->Self {
        self.fields.push(field);
        self
    }

    pub fn render (&self) -> Result<String> {
        let mut out = String::with_capacity(512);
        out.push_str( match self.kind { OperationKind::Query => "query", OperationKind::Mutation => "mutation" });
        if let Some(name) = &self.name {
            check_name(name)?;
            out.push(' ');
            out.push_str(name);
        }
        out.push_str(" {\n");
        for f in &self.fields {
            f.render( &mut out, 1)?;
        }
        out.push('}');
        Ok(out)
    }
}

/* #region DroneDeploy operations ***************************************************************/

/// the first `limit` exports of a plan
pub fn get_exports_query (plan: &PlanId, limit: u32) -> Result<String> {
    Operation::query( Some("GetExports"))
        .field( Field::new("node").arg("id", Arg::str( plan.node_id())).on("MapPlan")
            .field( Field::new("exports").arg("first", Arg::Int( limit as i64))
                .field( Field::new("edges")
                    .field( Field::new("node")
                        .fields( &["id", "status"])
                        .field( Field::new("parameters").fields( &["resolution", "fileFormat", "layer"]))
                        .fields( &["downloadPath"])))))
        .render()
}

/// a new orthomosaic export in EPSG:4326 for given plan and resolution (cm/pixel)
pub fn create_export_mutation (plan: &PlanId, resolution: u32) -> Result<String> {
    let parameters = Arg::Object( vec![
        ("layer".into(), Arg::Enum( ORTHOMOSAIC.into())),
        ("resolution".into(), Arg::Int( resolution as i64)),
        ("projection".into(), Arg::Int( EPSG_4326 as i64)),
    ]);
    let input = Arg::Object( vec![
        ("planId".into(), Arg::str( plan.node_id())),
        ("parameters".into(), parameters)
    ]);

    Operation::mutation( None)
        .field( Field::new("createExport").arg("input", input)
            .field( Field::new("export").fields( &["id"])))
        .render()
}

/// status, parameters and download path of a single export
pub fn get_export_query (export: &ExportId) -> Result<String> {
    Operation::query( None)
        .field( Field::new("export").arg("id", Arg::str( export.node_id()))
            .fields( &["id", "status"])
            .field( Field::new("parameters").fields( &["projection", "merge", "contourInterval", "layer", "fileFormat", "resolution"]))
            .fields( &["downloadPath"]))
        .render()
}

/* #endregion DroneDeploy operations */
