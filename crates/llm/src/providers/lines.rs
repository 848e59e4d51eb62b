//! Line framing for streamed HTTP bodies.
//!
//! Both NDJSON (Ollama) and server-sent events (OpenAI) are line oriented, but
//! network chunks do not respect line boundaries. This buffers bytes until a
//! full line is available.

use futures::{Stream, StreamExt};
use docsage_core::{AppError, AppResult};
use std::fmt::Display;

/// Turn a byte stream into a stream of trimmed, non-empty lines.
///
/// A trailing line without a newline is emitted when the body ends. After a
/// transport error the stream yields that error once and then ends.
pub(crate) fn line_stream<S, B, E>(bytes: S) -> impl Stream<Item = AppResult<String>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: Display + Send,
{
    let state = (Box::pin(bytes), Vec::<u8>::new(), false);

    futures::stream::unfold(state, |(mut bytes, mut buf, mut finished)| async move {
        loop {
            if let Some(pos) = buf.iter().position(|b| *b == b'\n') {
                let raw: Vec<u8> = buf.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&raw).trim().to_string();
                if line.is_empty() {
                    continue;
                }
                return Some((Ok(line), (bytes, buf, finished)));
            }

            if finished {
                if buf.is_empty() {
                    return None;
                }
                let line = String::from_utf8_lossy(&buf).trim().to_string();
                buf.clear();
                if line.is_empty() {
                    return None;
                }
                return Some((Ok(line), (bytes, buf, finished)));
            }

            match bytes.next().await {
                Some(Ok(chunk)) => buf.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => {
                    buf.clear();
                    finished = true;
                    let err = AppError::Llm(format!("Stream error: {}", e));
                    return Some((Err(err), (bytes, buf, finished)));
                }
                None => finished = true,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lines_split_across_chunks() {
        let body = futures::stream::iter(vec![
            Ok::<_, String>(b"{\"a\":".to_vec()),
            Ok(b"1}\n\n{\"b\"".to_vec()),
            Ok(b":2}".to_vec()),
        ]);
        let lines: Vec<String> = line_stream(body)
            .map(|l| l.unwrap())
            .collect()
            .await;
        assert_eq!(lines, vec!["{\"a\":1}", "{\"b\":2}"]);
    }

    #[tokio::test]
    async fn test_error_ends_stream() {
        let body = futures::stream::iter(vec![
            Ok::<_, String>(b"first\nsec".to_vec()),
            Err("connection reset".to_string()),
            Ok(b"ond\n".to_vec()),
        ]);
        let items: Vec<AppResult<String>> = line_stream(body).collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "first");
        assert!(items[1].is_err());
    }
}
