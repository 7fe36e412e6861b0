use anyhow::Result;
use seedrpc::CodecError;
use seedrpc::codec::{FramedReader, FramedWriter, ResponseHeader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

const REPEAT_METHOD: &str = "Echo.Repeat";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let addr = std::env::var("ECHO_ADDR").unwrap_or_else(|_| "127.0.0.1:9000".to_string());

    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Echo peer listening");

    loop {
        let (stream, remote) = listener.accept().await?;
        info!(remote = %remote, "Client connected");

        tokio::spawn(async move {
            match serve(stream).await {
                Ok(()) | Err(CodecError::Closed) => info!(remote = %remote, "Client disconnected"),
                Err(e) => warn!(remote = %remote, error = %e, "Connection failed"),
            }
        });
    }
}

async fn serve(stream: TcpStream) -> Result<(), CodecError> {
    let (read_half, write_half) = stream.into_split();
    let mut reader = FramedReader::new(read_half);
    let mut writer = FramedWriter::new(write_half);

    loop {
        let (request, body) = reader.read_request().await?;
        debug!(seq = request.seq, method = %request.method, "Received request");

        if request.method == REPEAT_METHOD {
            let header = ResponseHeader {
                seq: request.seq,
                error: String::new(),
            };
            writer.write_response(header, &body).await?;
        } else {
            let header = ResponseHeader {
                seq: request.seq,
                error: format!("unknown method '{}'", request.method),
            };
            writer.write_response(header, &[]).await?;
        }
    }
}
