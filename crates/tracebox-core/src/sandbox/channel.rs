//! The host/worker wire protocol: one JSON line each way.

use std::io::{BufRead, Write};

use serde::{Deserialize, Serialize};

use super::error::{SandboxError, SandboxResult};
use super::governor::ResourceLimits;
use crate::domain::ExecutionResult;
use crate::trace::TraceLimits;

/// The single message a host sends to a fresh worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerRequest {
    /// Tags the worker's log events; empty when the caller has none.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub execution_id: String,
    pub source: String,
    #[serde(default)]
    pub limits: ResourceLimits,
    #[serde(default)]
    pub trace: TraceLimits,
}

impl WorkerRequest {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            execution_id: String::new(),
            source: source.into(),
            limits: ResourceLimits::default(),
            trace: TraceLimits::default(),
        }
    }
}

/// Serialize `request` as one newline-terminated JSON line.
pub fn encode_request(request: &WorkerRequest) -> SandboxResult<Vec<u8>> {
    let mut line = serde_json::to_vec(request)?;
    line.push(b'\n');
    Ok(line)
}

/// Read the request line a worker receives on stdin.
pub fn read_request<R: BufRead>(mut reader: R) -> SandboxResult<WorkerRequest> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Err(SandboxError::Channel(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "no request received",
        )));
    }
    Ok(serde_json::from_str(&line)?)
}

/// Write side of the result channel.
///
/// `send` consumes the channel, so a worker can deliver at most one result.
pub struct ResultChannel<W: Write> {
    writer: W,
}

impl<W: Write> ResultChannel<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn send(mut self, result: &ExecutionResult) -> SandboxResult<()> {
        serde_json::to_writer(&mut self.writer, result)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Parse the line a worker wrote to stdout.
pub fn decode_result(line: &str) -> SandboxResult<ExecutionResult> {
    Ok(serde_json::from_str(line.trim_end())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::domain::ExecutionStep;

    #[test]
    fn test_request_is_one_line() {
        let request = WorkerRequest::new("print('a')\nprint('b')\n");
        let bytes = encode_request(&request).unwrap();
        assert_eq!(bytes.iter().filter(|b| **b == b'\n').count(), 1);
        assert_eq!(bytes.last(), Some(&b'\n'));

        let decoded = read_request(&bytes[..]).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_read_request_defaults() {
        let decoded = read_request(&br#"{"source":"x = 1"}"#[..]).unwrap();
        assert_eq!(decoded.trace, TraceLimits::default());
        assert_eq!(decoded.limits, ResourceLimits::default());
    }

    #[test]
    fn test_execution_id_is_omitted_when_empty() {
        let bytes = encode_request(&WorkerRequest::new("x = 1")).unwrap();
        assert!(!String::from_utf8(bytes).unwrap().contains("execution_id"));

        let mut request = WorkerRequest::new("x = 1");
        request.execution_id = "run-7".to_string();
        let decoded = read_request(&encode_request(&request).unwrap()[..]).unwrap();
        assert_eq!(decoded.execution_id, "run-7");
    }

    #[test]
    fn test_read_request_on_closed_stdin() {
        let err = read_request(&b""[..]).unwrap_err();
        assert!(matches!(err, SandboxError::Channel(_)));
    }

    #[test]
    fn test_result_channel_writes_one_line() {
        let mut variables = BTreeMap::new();
        variables.insert("x".to_string(), "1".to_string());
        let result = ExecutionResult::new(
            vec![ExecutionStep {
                line: 1,
                code: "x = 1".into(),
                variables,
                output: Some("hi\n".into()),
            }],
            None,
        );

        let mut buffer = Vec::new();
        ResultChannel::new(&mut buffer).send(&result).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.ends_with('\n'));
        assert_eq!(text.matches('\n').count(), 1);
        assert_eq!(decode_result(&text).unwrap(), result);
    }

    #[test]
    fn test_decode_garbage_is_protocol_error() {
        assert!(matches!(
            decode_result("not json"),
            Err(SandboxError::Protocol(_))
        ));
    }
}
