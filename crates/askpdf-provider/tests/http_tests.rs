//! Provider adapters against a throwaway local HTTP server.

use std::sync::Arc;
use std::time::Duration;

use askpdf_core::config::{CompletionSettings, EmbeddingSettings, BYTE_LEVEL_TOKENIZER};
use askpdf_core::traits::{Completer, Embedder};
use askpdf_core::Error;
use askpdf_provider::{OpenAiCompleter, OpenAiEmbedder};
use askpdf_text::TextTokenizer;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.expect("read");
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buf).to_string();
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|l| {
                    let (name, value) = l.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length").then(|| value.trim().parse::<usize>().ok())?
                })
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).to_string()
}

/// Serve exactly one request with the given status line and JSON body.
/// The handle resolves to the raw request text.
async fn serve_once(status: &'static str, body: &str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let body = body.to_string();
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let request = read_request(&mut socket).await;
        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.expect("write");
        let _ = socket.shutdown().await;
        request
    });
    (format!("http://{addr}/v1"), handle)
}

fn tokenizer() -> Arc<TextTokenizer> {
    Arc::new(TextTokenizer::from_id(BYTE_LEVEL_TOKENIZER).expect("tokenizer"))
}

fn embedding_settings(base_url: String, dim: usize) -> EmbeddingSettings {
    EmbeddingSettings {
        base_url,
        api_key: Some("sk-test".to_string()),
        dim,
        timeout_secs: 5,
        ..EmbeddingSettings::default()
    }
}

#[tokio::test]
async fn embeddings_are_aligned_with_inputs() {
    let (url, server) = serve_once(
        "200 OK",
        r#"{"data":[{"index":1,"embedding":[0.0,1.0,0.0]},{"index":0,"embedding":[1.0,0.0,0.0]}]}"#,
    )
    .await;
    let embedder = OpenAiEmbedder::new(&embedding_settings(url, 3), tokenizer()).expect("embedder");
    let texts = vec!["first chunk".to_string(), "second chunk".to_string()];
    let vectors = embedder.embed_batch(&texts).await.expect("embed");
    assert_eq!(vectors, vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]]);

    let request = server.await.expect("server");
    assert!(request.starts_with("POST /v1/embeddings "));
    assert!(request.to_lowercase().contains("authorization: bearer sk-test"));
    assert!(request.contains("\"model\":\"text-embedding-ada-002\""));
    assert!(request.contains("\"input\":[\"first chunk\",\"second chunk\"]"));
}

#[tokio::test]
async fn rate_limit_surfaces_as_provider_error() {
    let (url, server) = serve_once("429 Too Many Requests", r#"{"error":{"message":"Rate limit reached"}}"#).await;
    let embedder = OpenAiEmbedder::new(&embedding_settings(url, 3), tokenizer()).expect("embedder");
    let err = embedder.embed("question").await.unwrap_err();
    server.await.expect("server");
    match &err {
        Error::Provider { provider, message } => {
            assert_eq!(provider, "openai-embeddings");
            assert!(message.contains("429") && message.contains("Rate limit reached"), "{message}");
        }
        other => panic!("expected provider error, got {other:?}"),
    }
    assert!(err.is_retryable());
}

#[tokio::test]
async fn wrong_width_vector_is_a_dimension_mismatch() {
    let (url, server) = serve_once("200 OK", r#"{"data":[{"index":0,"embedding":[1.0,0.0]}]}"#).await;
    let embedder = OpenAiEmbedder::new(&embedding_settings(url, 3), tokenizer()).expect("embedder");
    let err = embedder.embed("question").await.unwrap_err();
    server.await.expect("server");
    assert!(matches!(err, Error::DimensionMismatch { expected: 3, actual: 2 }));
}

#[tokio::test]
async fn stalled_provider_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.expect("accept");
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(socket);
    });
    let settings = EmbeddingSettings { timeout_secs: 1, ..embedding_settings(format!("http://{addr}/v1"), 3) };
    let embedder = OpenAiEmbedder::new(&settings, tokenizer()).expect("embedder");
    let err = embedder.embed("question").await.unwrap_err();
    server.abort();
    match err {
        Error::Provider { message, .. } => assert!(message.contains("timed out"), "{message}"),
        other => panic!("expected provider error, got {other:?}"),
    }
}

#[tokio::test]
async fn chat_completion_returns_message_content() {
    let (url, server) = serve_once(
        "200 OK",
        r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"  Under the old oak tree.  "}}]}"#,
    )
    .await;
    let settings = CompletionSettings {
        base_url: url,
        api_key: Some("sk-test".to_string()),
        timeout_secs: 5,
        ..CompletionSettings::default()
    };
    let completer = OpenAiCompleter::new(&settings).expect("completer");
    let answer = completer
        .complete("The treasure is buried under the old oak tree.", "Where is the treasure?")
        .await
        .expect("complete");
    assert_eq!(answer, "Under the old oak tree.");

    let request = server.await.expect("server");
    assert!(request.starts_with("POST /v1/chat/completions "));
    assert!(request.contains("\"model\":\"gpt-3.5-turbo\""));
    assert!(request.contains("\"role\":\"system\""));
    assert!(request.contains("Question: Where is the treasure?"));
}

#[tokio::test]
async fn empty_completion_is_a_provider_error() {
    let (url, server) = serve_once("200 OK", r#"{"choices":[]}"#).await;
    let settings = CompletionSettings {
        base_url: url,
        api_key: Some("sk-test".to_string()),
        timeout_secs: 5,
        ..CompletionSettings::default()
    };
    let completer = OpenAiCompleter::new(&settings).expect("completer");
    let err = completer.complete("ctx", "q").await.unwrap_err();
    server.await.expect("server");
    assert!(matches!(err, Error::Provider { .. }));
}

#[test]
fn missing_api_key_for_openai_is_a_config_error() {
    let settings = EmbeddingSettings {
        api_key: None,
        api_key_env: "ASKPDF_TEST_DEFINITELY_UNSET".to_string(),
        ..EmbeddingSettings::default()
    };
    let err = OpenAiEmbedder::new(&settings, tokenizer()).err().expect("config error");
    assert!(matches!(err, Error::InvalidConfig(_)));
}
