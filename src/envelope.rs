//! Response envelopes carried inside SPMP packet payloads.
//!
//! A completed protocol exchange always decodes to a [`Response`]; whether
//! the requested operation succeeded is carried in `request_status`, not at
//! the protocol level. This is what lets the wire distinguish "the channel
//! broke" (no envelope at all) from "the operation was refused" (an
//! envelope with a failure status).

use serde::{Deserialize, Serialize};

/// Operation completed successfully.
pub const STATUS_OK: u8 = 1;

/// Operation was refused or failed; `msg` says why.
pub const STATUS_FAILED: u8 = 0;

/// Status code + human message + typed data payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response<T> {
    /// [`STATUS_OK`] or [`STATUS_FAILED`].
    #[serde(rename = "requestStatus")]
    pub request_status: u8,
    /// Human-readable outcome message.
    pub msg: String,
    /// Typed payload; `()`-like commands carry an empty string.
    pub data: T,
}

impl<T> Response<T> {
    /// Builds a success envelope.
    pub fn ok(msg: impl Into<String>, data: T) -> Self {
        Self {
            request_status: STATUS_OK,
            msg: msg.into(),
            data,
        }
    }

    /// Builds a failure envelope.
    pub fn failed(msg: impl Into<String>, data: T) -> Self {
        Self {
            request_status: STATUS_FAILED,
            msg: msg.into(),
            data,
        }
    }

    /// True if the envelope carries a success status.
    pub fn is_ok(&self) -> bool {
        self.request_status == STATUS_OK
    }
}

/// One row of `sagectl list`/`status` output - every configured service
/// gets exactly one, running or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListEntry {
    /// OS process id; 0 when the service is offline.
    pub pid: u32,
    /// Observed process name (comm), or the service name when offline.
    pub pname: String,
    /// Logical service name from configuration.
    pub name: String,
    /// Command line the service runs.
    pub cmd: String,
    /// `"online"` iff a registry record exists for the service.
    pub status: String,
    /// Human-readable uptime, `"0s"` when offline.
    pub uptime: String,
    /// CPU percentage from the last sample.
    #[serde(rename = "cpuPercent")]
    pub cpu_percent: f64,
    /// Memory percentage from the last sample.
    #[serde(rename = "memPercent")]
    pub mem_percent: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_wire_field_names() {
        let resp = Response::ok("done", "PID: 42".to_string());
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["requestStatus"], 1);
        assert_eq!(json["msg"], "done");
        assert_eq!(json["data"], "PID: 42");
    }

    #[test]
    fn test_list_entry_round_trip() {
        let entry = ListEntry {
            pid: 1234,
            pname: "sleep".to_string(),
            name: "web".to_string(),
            cmd: "sleep 100".to_string(),
            status: "online".to_string(),
            uptime: "1m5s".to_string(),
            cpu_percent: 0.5,
            mem_percent: 0.1,
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"cpuPercent\""));
        assert!(json.contains("\"memPercent\""));
        let back: ListEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_failed_envelope() {
        let resp: Response<String> = Response::failed("no such service", String::new());
        assert!(!resp.is_ok());
        assert_eq!(resp.request_status, STATUS_FAILED);
    }
}
