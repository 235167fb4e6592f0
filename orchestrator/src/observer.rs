//! observer.rs — Observer Sessions (§4.H, §5, §9 design notes)
//!
//! Each observer is an external protocol client the orchestrator connects to over
//! TCP, line-delimited JSON. A session is a single Tokio task: connect, read hints,
//! forward them into the merged channel the Gate consumes from. On any I/O error the
//! session reconnects with exponential backoff rather than tearing down the pipeline
//! — `uwb_hub`'s "never crash, log and continue" discipline applied to a persistent
//! connection instead of a single UDP recv.

use std::time::Duration;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use witness_types::{Hint, Observation, Point2};

const INITIAL_BACKOFF: Duration = Duration::from_millis(250);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Tagged protocol message. Only `WitherHint` matters to the Gate; a richer
/// protocol layer would add variants here and the Gate would simply ignore the
/// ones it doesn't match on, per §9's "no runtime reflection" note.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Message {
    WitherHint {
        observer_id: String,
        observer_pos: (f64, f64, f64),
        hint: (i32, i32, i32),
        t: i64,
    },
}

impl From<Message> for Observation {
    fn from(msg: Message) -> Self {
        match msg {
            Message::WitherHint { observer_id, observer_pos, hint, t } => Observation {
                observer_id,
                observer_pos: Point2::new(observer_pos.0, observer_pos.2),
                observer_y: observer_pos.1,
                hint: Hint::new(hint.0, hint.2),
                hint_y: hint.1,
                observed_at_ms: t,
            },
        }
    }
}

/// Run one observer session until the owning orchestrator drops `tx` or the
/// process shuts down. Reconnects to `addr` with exponential backoff (capped at
/// `MAX_BACKOFF`) whenever the connection drops or fails to establish.
pub async fn run_observer_session(observer_id: String, addr: String, tx: mpsc::UnboundedSender<Observation>) {
    let mut backoff = INITIAL_BACKOFF;

    loop {
        match TcpStream::connect(&addr).await {
            Ok(stream) => {
                info!("observer {observer_id}: connected to {addr}");
                backoff = INITIAL_BACKOFF;
                if !read_hints(&observer_id, stream, &tx).await {
                    return; // channel closed: orchestrator is shutting down
                }
            }
            Err(e) => {
                warn!("observer {observer_id}: failed to connect to {addr}: {e}, retrying in {backoff:?}");
            }
        }

        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}

/// Read line-delimited JSON messages until the stream closes or errors.
/// Returns `false` if the caller's channel is closed and the session should stop
/// reconnecting entirely.
async fn read_hints(observer_id: &str, stream: TcpStream, tx: &mpsc::UnboundedSender<Observation>) -> bool {
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match serde_json::from_str::<Message>(&line) {
                Ok(msg) => {
                    debug!("observer {observer_id}: hint received");
                    if tx.send(msg.into()).is_err() {
                        return false;
                    }
                }
                Err(e) => warn!("observer {observer_id}: malformed message: {e}"),
            },
            Ok(None) => {
                warn!("observer {observer_id}: connection closed by peer");
                return true;
            }
            Err(e) => {
                warn!("observer {observer_id}: read error: {e}");
                return true;
            }
        }
    }
}
