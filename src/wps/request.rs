//! Request construction: query parameters and process-specific data inputs.

use crate::config::Config;
use crate::error::ProtocolError;
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};
use url::Url;

// main http parameters
const PARAM_SERVICE: &str = "SERVICE";
const PARAM_VERSION: &str = "VERSION";
const PARAM_IDENTIFIER: &str = "IDENTIFIER";
const PARAM_REQUEST: &str = "REQUEST";
const PARAM_DATA_INPUTS: &str = "DATAINPUTS";

// asynchronous, lineage-preserving execution
const PARAM_STORE_EXEC_RESPONSE: &str = "storeExecuteResponse";
const PARAM_STATUS: &str = "status";
const PARAM_LINEAGE: &str = "lineage";

const SERVICE_WPS: &str = "WPS";
const REQ_CAPABILITIES: &str = "GetCapabilities";
const REQ_EXECUTE: &str = "Execute";

/// Priority requested for every reprocessing order
const USER_PRIORITY: u32 = 1;

/// Datatake options of the input product reference, already percent-encoded
const DATATAKE_OPTIONS: &str = "%7BfullDatatake:NO,fullSwath:NO%7D";

/// Processes this client knows how to parameterize
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Process {
    /// Level-1C to Level-2A reprocessing of a single tile
    L2a,
}

impl Process {
    /// Identifier of the process on the service
    pub fn identifier(&self) -> &'static str {
        match self {
            Process::L2a => "l2a",
        }
    }
}

impl FromStr for Process {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "l2a" => Ok(Process::L2a),
            other => Err(ProtocolError::UnsupportedProcess(other.to_string())),
        }
    }
}

impl std::fmt::Display for Process {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.identifier())
    }
}

/// Strictly increasing millisecond stamps
///
/// Two orders for the same tile must never carry the same `DW_ID`, even when
/// they are submitted within the same millisecond.
#[derive(Debug, Default)]
pub(crate) struct Disambiguator {
    last: AtomicI64,
}

impl Disambiguator {
    pub(crate) fn next(&self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        now.max(previous + 1)
    }
}

/// `GetCapabilities` request URL
pub(crate) fn capabilities_url(endpoint: &Url) -> Url {
    let mut url = endpoint.clone();
    url.query_pairs_mut()
        .append_pair(PARAM_SERVICE, SERVICE_WPS)
        .append_pair(PARAM_REQUEST, REQ_CAPABILITIES);
    url
}

/// `Execute` request URL, asking for asynchronous execution with lineage
pub(crate) fn execute_url(endpoint: &Url, version: &str, process: Process, data_inputs: &str) -> Url {
    let mut url = endpoint.clone();
    url.query_pairs_mut()
        .append_pair(PARAM_SERVICE, SERVICE_WPS)
        .append_pair(PARAM_REQUEST, REQ_EXECUTE)
        .append_pair(PARAM_VERSION, version)
        .append_pair(PARAM_IDENTIFIER, process.identifier())
        .append_pair(PARAM_STORE_EXEC_RESPONSE, "true")
        .append_pair(PARAM_STATUS, "true")
        .append_pair(PARAM_LINEAGE, "true")
        .append_pair(PARAM_DATA_INPUTS, data_inputs);
    url
}

/// Encode the `DATAINPUTS` value of `process` for one input tile
pub(crate) fn data_inputs(process: Process, config: &Config, tile_id: &str, stamp: i64) -> String {
    match process {
        Process::L2a => format!(
            "versionNumber={};userId={};userPriority={};resolution={};\
             InputProducts=s2pdi://PDI={}|DW_ID={}|DW_OPT={}",
            config.processor_version,
            config.user_id,
            USER_PRIORITY,
            config.resolution,
            tile_id,
            stamp,
            DATATAKE_OPTIONS
        ),
    }
}
