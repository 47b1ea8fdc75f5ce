//! TCP delivery of a channel transport's outbound queue.

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};

use shard_network::{write_frame, NetworkError, Outbound};
use shard_types::Peer;

use crate::shutdown::ShutdownController;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on writing one frame and closing the stream.
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Spawn a task that drains the outbound queue. Each item is delivered on
/// its own task: a fresh stream per unicast, framed content, then close.
/// In-flight deliveries are aborted at shutdown.
pub fn spawn_outbound_drain(mut rx: mpsc::Receiver<Outbound>, shutdown: &ShutdownController) -> JoinHandle<()> {
    let mut shutdown_rx = shutdown.subscribe();
    let already_stopped = shutdown.is_triggered();
    tokio::spawn(async move {
        if already_stopped {
            return;
        }
        let mut in_flight = JoinSet::new();
        loop {
            let item = tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                Some(_) = in_flight.join_next(), if !in_flight.is_empty() => continue,
                item = rx.recv() => item,
            };
            match item {
                Some(Outbound::Unicast { peer, content }) => {
                    in_flight.spawn(async move {
                        if let Err(e) = deliver(&peer, &content, WRITE_TIMEOUT).await {
                            tracing::warn!(peer = %peer, error = %e, "outbound delivery failed");
                        }
                    });
                }
                // Liveness check only: the stream is not kept for later unicasts.
                Some(Outbound::Connect(peer)) => {
                    in_flight.spawn(async move {
                        match dial(&peer).await {
                            Ok(_) => tracing::debug!(peer = %peer, "peer reachable"),
                            Err(e) => tracing::warn!(peer = %peer, error = %e, "dial failed"),
                        }
                    });
                }
                None => break,
            }
        }
        in_flight.abort_all();
        tracing::debug!(in_flight = in_flight.len(), "outbound drain stopped");
    })
}

async fn dial(peer: &Peer) -> Result<TcpStream, NetworkError> {
    match tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect((peer.ip.as_str(), peer.port))).await {
        Ok(stream) => Ok(stream?),
        Err(_) => Err(NetworkError::SendFailed {
            peer: peer.to_string(),
            reason: "connect timed out".into(),
        }),
    }
}

async fn deliver(peer: &Peer, content: &[u8], write_timeout: Duration) -> Result<(), NetworkError> {
    let mut stream = dial(peer).await?;
    let write = async {
        write_frame(&mut stream, content).await?;
        stream.shutdown().await?;
        Ok::<(), NetworkError>(())
    };
    match tokio::time::timeout(write_timeout, write).await {
        Ok(result) => result,
        Err(_) => Err(NetworkError::SendFailed {
            peer: peer.to_string(),
            reason: "write timed out".into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shard_network::read_frame;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn unicast_is_written_as_one_frame() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let shutdown = ShutdownController::new();
        let (tx, rx) = mpsc::channel(4);
        let handle = spawn_outbound_drain(rx, &shutdown);

        tx.send(Outbound::Unicast {
            peer: Peer::new("127.0.0.1", port),
            content: vec![1, 3, 0],
        })
        .await
        .unwrap();

        let (mut stream, _) = listener.accept().await.unwrap();
        assert_eq!(read_frame(&mut stream).await.unwrap(), Some(vec![1, 3, 0]));
        assert_eq!(read_frame(&mut stream).await.unwrap(), None);

        shutdown.shutdown();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn unreachable_peer_does_not_stop_the_drain() {
        let closed = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead_port = closed.local_addr().unwrap().port();
        drop(closed);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let shutdown = ShutdownController::new();
        let (tx, rx) = mpsc::channel(4);
        let handle = spawn_outbound_drain(rx, &shutdown);
        tx.send(Outbound::Unicast {
            peer: Peer::new("127.0.0.1", dead_port),
            content: vec![9],
        })
        .await
        .unwrap();
        tx.send(Outbound::Unicast {
            peer: Peer::new("127.0.0.1", port),
            content: vec![7],
        })
        .await
        .unwrap();

        let (mut stream, _) = listener.accept().await.unwrap();
        assert_eq!(read_frame(&mut stream).await.unwrap(), Some(vec![7]));
        drop(tx);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn connect_dials_then_drops_the_stream() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let shutdown = ShutdownController::new();
        let (tx, rx) = mpsc::channel(4);
        let handle = spawn_outbound_drain(rx, &shutdown);

        tx.send(Outbound::Connect(Peer::new("127.0.0.1", port))).await.unwrap();
        let (mut dialed, _) = listener.accept().await.unwrap();
        assert_eq!(read_frame(&mut dialed).await.unwrap(), None);

        tx.send(Outbound::Unicast {
            peer: Peer::new("127.0.0.1", port),
            content: vec![9],
        })
        .await
        .unwrap();
        let (mut stream, _) = listener.accept().await.unwrap();
        assert_eq!(read_frame(&mut stream).await.unwrap(), Some(vec![9]));

        shutdown.shutdown();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn stalled_peer_does_not_hold_up_others() {
        // Accepts and keeps its streams but never reads.
        let stalled = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let stalled_port = stalled.local_addr().unwrap().port();
        let holder = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = stalled.accept().await {
                held.push(stream);
            }
        });
        let live = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let live_port = live.local_addr().unwrap().port();

        let shutdown = ShutdownController::new();
        let (tx, rx) = mpsc::channel(4);
        let handle = spawn_outbound_drain(rx, &shutdown);
        tx.send(Outbound::Unicast {
            peer: Peer::new("127.0.0.1", stalled_port),
            content: vec![0xAB; 8 * 1024 * 1024],
        })
        .await
        .unwrap();
        tx.send(Outbound::Unicast {
            peer: Peer::new("127.0.0.1", live_port),
            content: vec![7],
        })
        .await
        .unwrap();

        let received = tokio::time::timeout(Duration::from_secs(5), async {
            let (mut stream, _) = live.accept().await.unwrap();
            read_frame(&mut stream).await.unwrap()
        })
        .await
        .expect("live peer served while another peer stalls");
        assert_eq!(received, Some(vec![7]));

        shutdown.shutdown();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("drain stops with a delivery still in flight")
            .unwrap();
        holder.abort();
    }

    #[tokio::test]
    async fn write_to_non_reading_peer_times_out() {
        let stalled = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = stalled.local_addr().unwrap().port();
        let holder = tokio::spawn(async move {
            let (stream, _) = stalled.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(stream);
        });

        let err = deliver(
            &Peer::new("127.0.0.1", port),
            &vec![0u8; 16 * 1024 * 1024],
            Duration::from_millis(200),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, NetworkError::SendFailed { ref reason, .. } if reason == "write timed out"));
        holder.abort();
    }
}
