//! Basic example: queue a few messages on a server connection, drain them
//! through a digest-observing writer and dump the wire bytes.
//!
//! Run with: `RUST_LOG=debug cargo run --example basic`

use std::sync::Arc;
use tokio::sync::mpsc;
use ws_sendpath::{
    socket::WireTransport, Connection, ConnectionState, DigestConfig, DigestObserver,
    ExternalDigest, FrameWriter, Opcode,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();

    let (tx, mut reports) = mpsc::channel(16);
    let observer = DigestObserver::new(ExternalDigest::new(DigestConfig::default()))
        .compare_sha256(true)
        .with_reports(tx);
    let writer = FrameWriter::new().with_observer(Arc::new(observer));

    let conn = Connection::new(WireTransport::server(Vec::<u8>::new()));
    conn.set_state(ConnectionState::Open);

    let mut pending = vec![
        conn.send(&b"first half "[..], Opcode::Binary, false)?,
        conn.send(&b"second half"[..], Opcode::Continuation, true)?,
        conn.send("hello", Opcode::Text, true)?,
        conn.send(&b""[..], Opcode::Ping, true)?,
    ];

    while conn.pending() > 0 {
        let outcome = conn.on_writable(&writer).await;
        println!("[Writable] {:?}", outcome);
    }
    for done in pending.drain(..) {
        done.await??;
    }

    // Two binary frames are observed; text is skipped by default.
    for _ in 0..2 {
        if let Some(report) = reports.recv().await {
            match report.result {
                Ok(out) => println!(
                    "[Digest] {} bytes -> {} (matches sha256: {:?})",
                    report.len,
                    out.text.trim(),
                    report.matches_sha256
                ),
                Err(e) => println!("[Digest] {} bytes failed: {}", report.len, e),
            }
        }
    }

    conn.close();
    let wire = conn.into_transport().into_inner();
    println!("[Wire] {} bytes: {}", wire.len(), hex::encode(&wire));
    Ok(())
}
