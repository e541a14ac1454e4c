// WebSocket request surface.
//
// Every text frame is handed to the application task together with a reply
// channel; the reply is written back on the same connection before the next
// frame is read, so each client sees its responses in request order.

use std::fmt::Display;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, info, warn};

/// Events emitted by the WebSocket server to the application layer.
#[derive(Debug)]
pub enum WsEvent {
    Connected {
        addr: String,
    },
    Disconnected {
        addr: String,
    },
    /// A text frame (raw JSON). The response frame goes back through `reply`.
    Request {
        addr: String,
        text: String,
        reply: oneshot::Sender<String>,
    },
}

/// Bind `127.0.0.1:{port}` and serve until the application task goes away.
pub async fn run(port: u16, tx: mpsc::Sender<WsEvent>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(format!("127.0.0.1:{port}")).await?;
    serve(listener, tx).await
}

/// Accept connections on an already-bound listener. Each connection gets its
/// own task; requests from all of them funnel into `tx`.
pub async fn serve(listener: TcpListener, tx: mpsc::Sender<WsEvent>) -> anyhow::Result<()> {
    let local_addr = listener.local_addr()?;
    info!("WebSocket server listening on {local_addr}");

    loop {
        let (stream, addr) = listener.accept().await?;
        if tx.is_closed() {
            break;
        }
        let tx = tx.clone();
        tokio::spawn(async move {
            let addr = addr.to_string();
            let ws_stream = match tokio_tungstenite::accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    warn!("WebSocket handshake failed for {addr}: {e}");
                    return;
                }
            };

            if tx
                .send(WsEvent::Connected { addr: addr.clone() })
                .await
                .is_err()
            {
                return;
            }

            let (mut write, read) = ws_stream.split();
            if process_message_stream(read, &mut write, &tx, &addr)
                .await
                .is_err()
            {
                return;
            }
            let _ = tx.send(WsEvent::Disconnected { addr }).await;
        });
    }

    Ok(())
}

/// Read frames from `stream`, forward text frames as [`WsEvent::Request`]
/// and write each reply to `sink`. Returns `Err(())` once the application
/// side has gone away.
///
/// Generic over both halves so it can be driven by in-memory streams.
pub async fn process_message_stream<St, Si>(
    mut stream: St,
    sink: &mut Si,
    tx: &mpsc::Sender<WsEvent>,
    addr: &str,
) -> Result<(), ()>
where
    St: Stream<Item = Result<Message, WsError>> + Unpin,
    Si: Sink<Message> + Unpin,
    Si::Error: Display,
{
    while let Some(msg_result) = stream.next().await {
        match msg_result {
            Ok(Message::Text(text)) => {
                let (reply_tx, reply_rx) = oneshot::channel();
                let event = WsEvent::Request {
                    addr: addr.to_string(),
                    text: text.to_string(),
                    reply: reply_tx,
                };
                if tx.send(event).await.is_err() {
                    return Err(());
                }
                let Ok(response) = reply_rx.await else {
                    return Err(());
                };
                if let Err(e) = sink.send(Message::text(response)).await {
                    warn!("Failed to reply to {addr}: {e}");
                    break;
                }
            }
            Ok(Message::Close(_)) => {
                info!("Client {addr} sent close frame");
                break;
            }
            Err(e) => {
                warn!("WebSocket error from {addr}: {e}");
                break;
            }
            Ok(other) => {
                debug!("Ignoring non-text frame from {addr}: {other:?}");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use futures_util::stream;

    /// Collects every frame written to it.
    #[derive(Default)]
    struct CollectSink(Vec<Message>);

    impl Sink<Message> for CollectSink {
        type Error = Infallible;

        fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Infallible>> {
            Poll::Ready(Ok(()))
        }

        fn start_send(mut self: Pin<&mut Self>, item: Message) -> Result<(), Infallible> {
            self.0.push(item);
            Ok(())
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Infallible>> {
            Poll::Ready(Ok(()))
        }

        fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Infallible>> {
            Poll::Ready(Ok(()))
        }
    }

    fn mock_stream(
        messages: Vec<Result<Message, WsError>>,
    ) -> impl Stream<Item = Result<Message, WsError>> + Unpin {
        stream::iter(messages)
    }

    /// Stand-in application task: answers every request with `echo:<text>`
    /// and reports the texts it saw.
    fn spawn_echo(mut rx: mpsc::Receiver<WsEvent>) -> tokio::task::JoinHandle<Vec<String>> {
        tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(event) = rx.recv().await {
                if let WsEvent::Request { text, reply, .. } = event {
                    let _ = reply.send(format!("echo:{text}"));
                    seen.push(text);
                }
            }
            seen
        })
    }

    fn texts(sent: &[Message]) -> Vec<String> {
        sent.iter()
            .map(|m| m.to_text().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn each_text_frame_gets_one_reply_in_order() {
        let (tx, rx) = mpsc::channel(64);
        let app = spawn_echo(rx);
        let mut sink = CollectSink::default();

        let messages = vec![
            Ok(Message::Text("first".into())),
            Ok(Message::Text("second".into())),
        ];
        process_message_stream(mock_stream(messages), &mut sink, &tx, "test")
            .await
            .unwrap();
        drop(tx);

        assert_eq!(texts(&sink.0), vec!["echo:first", "echo:second"]);
        assert_eq!(app.await.unwrap(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn close_frame_stops_processing() {
        let (tx, rx) = mpsc::channel(64);
        let app = spawn_echo(rx);
        let mut sink = CollectSink::default();

        let messages = vec![
            Ok(Message::Text("before_close".into())),
            Ok(Message::Close(None)),
            Ok(Message::Text("after_close".into())),
        ];
        process_message_stream(mock_stream(messages), &mut sink, &tx, "test")
            .await
            .unwrap();
        drop(tx);

        assert_eq!(texts(&sink.0), vec!["echo:before_close"]);
        assert_eq!(app.await.unwrap(), vec!["before_close"]);
    }

    #[tokio::test]
    async fn error_stops_processing() {
        let (tx, rx) = mpsc::channel(64);
        let app = spawn_echo(rx);
        let mut sink = CollectSink::default();

        let messages = vec![
            Err(WsError::ConnectionClosed),
            Ok(Message::Text("after_error".into())),
        ];
        process_message_stream(mock_stream(messages), &mut sink, &tx, "test")
            .await
            .unwrap();
        drop(tx);

        assert!(sink.0.is_empty());
        assert!(app.await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_text_frames_are_ignored() {
        let (tx, rx) = mpsc::channel(64);
        let app = spawn_echo(rx);
        let mut sink = CollectSink::default();

        let messages = vec![
            Ok(Message::Binary(vec![1, 2, 3].into())),
            Ok(Message::Ping(vec![].into())),
            Ok(Message::Text("after_ignored".into())),
        ];
        process_message_stream(mock_stream(messages), &mut sink, &tx, "test")
            .await
            .unwrap();
        drop(tx);

        assert_eq!(texts(&sink.0), vec!["echo:after_ignored"]);
        assert_eq!(app.await.unwrap(), vec!["after_ignored"]);
    }

    #[tokio::test]
    async fn returns_err_when_app_is_gone() {
        let (tx, rx) = mpsc::channel(64);
        drop(rx);
        let mut sink = CollectSink::default();

        let messages = vec![Ok(Message::Text("orphan".into()))];
        let result =
            process_message_stream(mock_stream(messages), &mut sink, &tx, "test").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn returns_err_when_reply_is_dropped() {
        let (tx, mut rx) = mpsc::channel(64);
        let app = tokio::spawn(async move {
            // Receive and drop the reply sender without answering.
            while let Some(event) = rx.recv().await {
                drop(event);
            }
        });
        let mut sink = CollectSink::default();

        let messages = vec![Ok(Message::Text("unanswered".into()))];
        let result =
            process_message_stream(mock_stream(messages), &mut sink, &tx, "test").await;
        assert!(result.is_err());
        assert!(sink.0.is_empty());
        drop(tx);
        app.await.unwrap();
    }
}
