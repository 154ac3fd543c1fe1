use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use futures::{Stream, TryStreamExt, ready};
use reqwest::{
    Client, Request, Response, StatusCode,
    header::{CONNECTION, HOST, HeaderMap, HeaderValue, USER_AGENT},
};
use tracing::trace;
use url::Url;

use crate::{counter::TrafficCounters, error::TransferError};

/// Bytes attributed to a single GET exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferStats {
    pub sent: u64,
    pub received: u64,
    pub status: StatusCode,
}

/// Passes a body stream through unchanged, handing the length of every chunk
/// to `count` as it is yielded.
pub struct CountingStream<S, F> {
    inner: S,
    count: F,
}

impl<S, F> CountingStream<S, F> {
    pub fn new(inner: S, count: F) -> Self {
        Self { inner, count }
    }
}

impl<S, F, B, E> Stream for CountingStream<S, F>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    F: FnMut(u64) + Unpin,
    B: AsRef<[u8]>,
{
    type Item = Result<B, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let item = ready!(Pin::new(&mut this.inner).poll_next(cx));
        if let Some(Ok(chunk)) = &item {
            (this.count)(chunk.as_ref().len() as u64);
        }
        Poll::Ready(item)
    }
}

/// One repeatable GET against the target, feeding the shared counters.
#[derive(Clone)]
pub struct Transfer {
    client: Client,
    url: Url,
    user_agent: HeaderValue,
    counters: Arc<TrafficCounters>,
}

impl Transfer {
    /// A client that never keeps idle connections, so every exchange dials a
    /// fresh one and pays the full handshake.
    pub fn build_client() -> Result<Client, TransferError> {
        Client::builder()
            .pool_max_idle_per_host(0)
            .http1_only()
            .build()
            .map_err(TransferError::Client)
    }

    pub fn new(
        client: Client,
        url: Url,
        user_agent: HeaderValue,
        counters: Arc<TrafficCounters>,
    ) -> Self {
        Self {
            client,
            url,
            user_agent,
            counters,
        }
    }

    /// Performs the exchange and drains the response body.
    ///
    /// Bytes are counted as they move, so a failure part way through leaves the
    /// already counted bytes in place. A non-2xx status is not an error.
    pub async fn execute(&self) -> Result<TransferStats, TransferError> {
        let request = self
            .client
            .get(self.url.clone())
            .header(USER_AGENT, self.user_agent.clone())
            .header(CONNECTION, HeaderValue::from_static("close"))
            .build()
            .map_err(TransferError::Request)?;

        let mut sent = request_head_len(&request);
        if let Some(body) = request.body().and_then(|body| body.as_bytes()) {
            sent += body.len() as u64;
        }

        let response = self
            .client
            .execute(request)
            .await
            .map_err(TransferError::Send)?;
        self.counters.add_sent(sent);
        let status = response.status();
        let head = response_head_len(&response);
        self.counters.add_received(head);

        let counters = &self.counters;
        let mut body = CountingStream::new(Box::pin(response.bytes_stream()), |n| {
            counters.add_received(n)
        });
        let mut body_len = 0u64;
        while let Some(chunk) = body.try_next().await.map_err(TransferError::Body)? {
            body_len += chunk.len() as u64;
        }

        trace!(%status, sent, received = head + body_len, "transfer finished");
        Ok(TransferStats {
            sent,
            received: head + body_len,
            status,
        })
    }
}

/// Size of the request line, headers and blank line as written on the wire.
fn request_head_len(request: &Request) -> u64 {
    let url = request.url();
    let target = url.path().len() + url.query().map_or(0, |query| query.len() + 1);
    let mut len = request.method().as_str().len()
        + 1
        + target
        + 1
        + format!("{:?}", request.version()).len()
        + 2;

    if !request.headers().contains_key(HOST) {
        let host = url.host_str().unwrap_or_default().len();
        let port = url.port().map_or(0, |port| port.to_string().len() + 1);
        len += header_line_len(HOST.as_str().len(), host + port);
    }

    (len + headers_len(request.headers()) + 2) as u64
}

/// Size of the status line, headers and blank line as received.
fn response_head_len(response: &Response) -> u64 {
    let status_line = format!("{:?} {}\r\n", response.version(), response.status()).len();
    (status_line + headers_len(response.headers()) + 2) as u64
}

fn headers_len(headers: &HeaderMap) -> usize {
    headers
        .iter()
        .map(|(name, value)| header_line_len(name.as_str().len(), value.len()))
        .sum()
}

fn header_line_len(name: usize, value: usize) -> usize {
    name + ": ".len() + value + "\r\n".len()
}
