use std::{net::SocketAddr, sync::Arc};

use tokio::{
    io::AsyncWriteExt,
    net::{TcpListener, TcpStream},
    sync::broadcast::{self, error::RecvError},
};

/// Serves every encoded frame to all connected readers.
pub async fn serve(listener: TcpListener, frames: broadcast::Sender<Arc<[u8]>>) {
    loop {
        match listener.accept().await {
            Ok((stream, address)) => {
                log::info!("Reader connected from {address}");
                tokio::spawn(forward(stream, address, frames.subscribe()));
            }
            Err(e) => log::error!("Could not accept a reader: {e}"),
        }
    }
}

async fn forward(
    mut stream: TcpStream,
    address: SocketAddr,
    mut frames: broadcast::Receiver<Arc<[u8]>>,
) {
    loop {
        let frame = match frames.recv().await {
            Ok(frame) => frame,
            Err(RecvError::Lagged(skipped)) => {
                log::warn!("Reader {address} is behind, skipped {skipped} frames");
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        if let Err(e) = stream.write_all(&frame).await {
            log::info!("Reader {address} disconnected: {e}");
            break;
        }
    }
}
