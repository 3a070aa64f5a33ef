//! HTTP client for the posts collection

use async_trait::async_trait;
use postdesk_api::{Post, PostInput};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

use crate::{PostsRemote, RemoteError, RemoteResult};

/// Body of `PUT /posts/{id}`: the id followed by the post fields
#[derive(Serialize)]
struct UpdateBody<'a> {
    id: i64,
    #[serde(flatten)]
    input: &'a PostInput,
}

/// [`PostsRemote`] over HTTP JSON
#[derive(Debug, Clone)]
pub struct HttpPostsClient {
    client: Client,
    base_url: String,
}

impl HttpPostsClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> RemoteResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.url(path))
    }

    async fn send(&self, request: RequestBuilder) -> RemoteResult<Response> {
        let response = request.send().await.map_err(|e| {
            warn!(error = %e, "Request failed");
            RemoteError::Transport(e.to_string())
        })?;

        let status = response.status();
        debug!(status = status.as_u16(), url = %response.url(), "Response received");

        if !status.is_success() {
            return Err(RemoteError::http(
                status.as_u16(),
                status.canonical_reason().unwrap_or_default(),
            ));
        }

        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> RemoteResult<T> {
        let response = self.send(request).await?;
        response
            .json()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }
}

#[async_trait]
impl PostsRemote for HttpPostsClient {
    async fn get_all(&self) -> RemoteResult<Vec<Post>> {
        self.send_json(self.request(Method::GET, "/posts")).await
    }

    async fn get(&self, id: i64) -> RemoteResult<Post> {
        self.send_json(self.request(Method::GET, &format!("/posts/{}", id)))
            .await
    }

    async fn create(&self, input: &PostInput) -> RemoteResult<Post> {
        self.send_json(self.request(Method::POST, "/posts").json(input))
            .await
    }

    async fn update(&self, id: i64, input: &PostInput) -> RemoteResult<Post> {
        let body = UpdateBody { id, input };
        self.send_json(
            self.request(Method::PUT, &format!("/posts/{}", id))
                .json(&body),
        )
        .await
    }

    async fn delete(&self, id: i64) -> RemoteResult<()> {
        self.send(self.request(Method::DELETE, &format!("/posts/{}", id)))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serve one canned response and hand back the raw request
    async fn serve_once(response: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];

            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf).to_string();
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if buf.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }

            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&buf).to_string()
        });

        (base_url, handle)
    }

    fn client(base_url: &str) -> HttpPostsClient {
        HttpPostsClient::new(base_url, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = client("https://jsonplaceholder.typicode.com/");
        assert_eq!(client.base_url(), "https://jsonplaceholder.typicode.com");
        assert_eq!(
            client.url("/posts/1"),
            "https://jsonplaceholder.typicode.com/posts/1"
        );
    }

    #[test]
    fn update_body_carries_id_first() {
        let input = PostInput::new(1, "T", "B");
        let body = serde_json::to_value(UpdateBody { id: 7, input: &input }).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"id": 7, "userId": 1, "title": "T", "body": "B"})
        );
    }

    #[tokio::test]
    async fn non_success_status_maps_to_http_error() {
        let (base_url, server) = serve_once(
            "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;

        let err = client(&base_url).get(9999).await.unwrap_err();
        assert_eq!(err, RemoteError::http(404, "Not Found"));
        assert_eq!(err.to_string(), "HTTP 404: Not Found");

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /posts/9999 "));
    }

    #[tokio::test]
    async fn create_sends_json_and_decodes_echo() {
        let (base_url, server) = serve_once(
            "HTTP/1.1 201 Created\r\nContent-Type: application/json\r\nContent-Length: 44\r\nConnection: close\r\n\r\n{\"id\":101,\"userId\":1,\"title\":\"T\",\"body\":\"B\"}",
        )
        .await;

        let post = client(&base_url)
            .create(&PostInput::new(1, "T", "B"))
            .await
            .unwrap();
        assert_eq!(post.id, 101);
        assert_eq!(post.title, "T");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /posts "));
        assert!(request.to_ascii_lowercase().contains("content-type: application/json"));
        assert!(request.contains(r#""userId":1"#));
    }

    #[tokio::test]
    async fn bad_json_is_decode_error() {
        let (base_url, _server) = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 8\r\nConnection: close\r\n\r\nnot json",
        )
        .await;

        let err = client(&base_url).get_all().await.unwrap_err();
        assert!(matches!(err, RemoteError::Decode(_)));
    }

    #[tokio::test]
    async fn unreachable_host_is_transport_error() {
        // Bind then drop to get a port with nothing listening
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(&format!("http://{}", addr)).get_all().await.unwrap_err();
        assert!(matches!(err, RemoteError::Transport(_)));
        assert!(err.is_retryable());
    }
}
