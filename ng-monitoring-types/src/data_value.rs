use opcua::types::{DataValue, DateTime, StatusCode, TimestampsToReturn};

/// Accessors the sampling and queueing paths use on `DataValue`.
pub trait DataValueExt: Sized {
    /// Status of the value; an absent status means Good.
    fn status_code(&self) -> StatusCode;

    fn with_status_code(self, status: StatusCode) -> Self;

    fn with_source_time(self, ts: DateTime) -> Self;

    /// Copy keeping only the timestamps the client asked for.
    fn keep_timestamps(&self, which: TimestampsToReturn) -> Self;
}

impl DataValueExt for DataValue {
    fn status_code(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::Good)
    }

    fn with_status_code(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    fn with_source_time(mut self, ts: DateTime) -> Self {
        self.source_timestamp = Some(ts);
        self
    }

    fn keep_timestamps(&self, which: TimestampsToReturn) -> Self {
        let mut out = self.clone();
        let (source, server) = match which {
            TimestampsToReturn::Source => (true, false),
            TimestampsToReturn::Server => (false, true),
            TimestampsToReturn::Neither => (false, false),
            _ => (true, true),
        };
        if !source {
            out.source_timestamp = None;
            out.source_picoseconds = None;
        }
        if !server {
            out.server_timestamp = None;
            out.server_picoseconds = None;
        }
        out
    }
}
