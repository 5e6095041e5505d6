//! Wall clock corrected by SNTP.
//!
//! The host clock is never set. A successful sync stores the offset sntpc
//! measures between the server and the host, and `now()` applies it.

use std::net::SocketAddr;
use std::time::Duration;

use afval_core::{Clock, PortError};
use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDateTime, TimeDelta, Utc};
use sntpc::{NtpContext, NtpResult, NtpTimestampGenerator, NtpUdpSocket, get_time};
use tokio::net::{UdpSocket, lookup_host};
use tokio::time::timeout;

const NTP_PORT: u16 = 123;
const SYNC_TIMEOUT: Duration = Duration::from_secs(2);

pub(crate) struct SntpClock {
    offset: TimeDelta,
}

impl SntpClock {
    pub(crate) fn new() -> Self {
        Self {
            offset: TimeDelta::zero(),
        }
    }

    /// Query `server` and keep its offset to the host clock.
    async fn sync_with(&mut self, server: SocketAddr) -> Result<(), PortError> {
        let result = timeout(SYNC_TIMEOUT, request_time(server))
            .await
            .map_err(|_elapsed| PortError::Timeout)??;

        self.offset = TimeDelta::microseconds(result.offset());
        log::debug!(
            "NTP offset {} ms, roundtrip {} us",
            self.offset.num_milliseconds(),
            result.roundtrip()
        );
        Ok(())
    }
}

#[async_trait]
impl Clock for SntpClock {
    fn now(&self) -> NaiveDateTime {
        (Utc::now() + self.offset)
            .with_timezone(&Local)
            .naive_local()
    }

    async fn sync_from_network(&mut self, host: &str) -> Result<(), PortError> {
        let server = lookup_host((host, NTP_PORT))
            .await?
            .find(SocketAddr::is_ipv4)
            .ok_or_else(|| PortError::TimeSync(format!("{host} has no IPv4 address")))?;
        self.sync_with(server).await
    }
}

/// Host UTC time, captured on every `init`.
#[derive(Clone, Copy, Default)]
struct HostTimestampGen {
    now: DateTime<Utc>,
}

impl NtpTimestampGenerator for HostTimestampGen {
    fn init(&mut self) {
        self.now = Utc::now();
    }

    fn timestamp_sec(&self) -> u64 {
        u64::try_from(self.now.timestamp()).unwrap_or_default()
    }

    fn timestamp_subsec_micros(&self) -> u32 {
        self.now.timestamp_subsec_micros()
    }
}

struct TokioSocket(UdpSocket);

impl NtpUdpSocket for TokioSocket {
    async fn send_to(&self, buf: &[u8], addr: SocketAddr) -> Result<usize, sntpc::Error> {
        self.0
            .send_to(buf, addr)
            .await
            .map_err(|_err| sntpc::Error::Network)
    }

    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), sntpc::Error> {
        self.0
            .recv_from(buf)
            .await
            .map_err(|_err| sntpc::Error::Network)
    }
}

async fn request_time(server: SocketAddr) -> Result<NtpResult, PortError> {
    let socket = TokioSocket(UdpSocket::bind(("0.0.0.0", 0)).await?);
    let context = NtpContext::new(HostTimestampGen::default());

    get_time(server, &socket, context)
        .await
        .map_err(|err| PortError::TimeSync(format!("{err:?}")))
}
